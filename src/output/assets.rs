//! Directory of downloaded image files

use crate::fetch::{AssetFetchPool, Fetcher};
use crate::output::traits::{OutputError, OutputResult, PersistOutcome, RecordBatch, Writer};
use async_trait::async_trait;
use std::path::Path;

/// Downloads every image in the batch into a directory, one file per distinct content
pub struct AssetDirectoryWriter<F> {
    pool: AssetFetchPool<F>,
}

impl<F: Fetcher + 'static> AssetDirectoryWriter<F> {
    pub fn new(pool: AssetFetchPool<F>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl<F: Fetcher + 'static> Writer for AssetDirectoryWriter<F> {
    async fn persist(
        &self,
        batch: &RecordBatch,
        destination: &Path,
    ) -> OutputResult<PersistOutcome> {
        let urls = batch
            .records
            .iter()
            .map(|record| {
                record
                    .as_image_asset()
                    .map(|asset| asset.source_url().to_string())
                    .ok_or_else(|| {
                        OutputError::Format(format!("expected an image, got a {}", record.kind()))
                    })
            })
            .collect::<OutputResult<Vec<_>>>()?;

        tracing::info!("Downloading {} images to {}", urls.len(), destination.display());
        let summary = self.pool.fetch_all(&urls, destination).await?;
        tracing::info!(
            "Downloaded {} unique images out of {} URLs ({} duplicates, {} failed)",
            summary.saved,
            summary.submitted,
            summary.duplicates,
            summary.failed
        );

        Ok(PersistOutcome {
            destination: destination.to_path_buf(),
            saved: summary.saved,
        })
    }
}
