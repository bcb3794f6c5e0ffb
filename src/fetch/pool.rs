//! Bounded-concurrency asset downloads

use crate::fetch::fetcher::{FetchError, Fetcher};
use crate::record::{fingerprint_bytes, DedupStore, Fingerprint};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Extension used when the URL path has none
const DEFAULT_EXTENSION: &str = ".jpg";

/// Totals for one `fetch_all` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub submitted: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub failed: usize,

    /// Files written, in completion order
    pub files: Vec<PathBuf>,
}

enum AssetOutcome {
    Saved(PathBuf, Fingerprint),
    Duplicate(Fingerprint),
    Failed(FetchError),
    /// Downloaded but not written; the fingerprint was released again
    Unwritten(Fingerprint, FetchError),
}

/// Downloads assets in parallel, keeping one file per distinct content
pub struct AssetFetchPool<F> {
    fetcher: Arc<F>,
    dedup: Arc<DedupStore>,
    concurrency_limit: usize,
    timeout: Duration,
}

impl<F: Fetcher + 'static> AssetFetchPool<F> {
    pub fn new(
        fetcher: Arc<F>,
        dedup: Arc<DedupStore>,
        concurrency_limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            dedup,
            concurrency_limit: concurrency_limit.max(1),
            timeout,
        }
    }

    /// Fetches every URL and writes unique contents to `destination`
    ///
    /// Returns once every fetch has finished or timed out. Failures are
    /// counted and logged, never propagated.
    ///
    /// # Arguments
    ///
    /// * `urls` - Asset URLs, in collection order
    /// * `destination` - Directory for the files; created if missing
    ///
    /// # Returns
    ///
    /// * `Ok(FetchSummary)` - Per-outcome totals and the files written
    /// * `Err(io::Error)` - The destination directory could not be created
    pub async fn fetch_all(
        &self,
        urls: &[String],
        destination: &Path,
    ) -> std::io::Result<FetchSummary> {
        tokio::fs::create_dir_all(destination).await?;

        // Step 1: one task per URL, gated by the semaphore
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let sequence = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for url in urls {
            let url = url.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let dedup = Arc::clone(&self.dedup);
            let semaphore = Arc::clone(&semaphore);
            let sequence = Arc::clone(&sequence);
            let destination = destination.to_path_buf();
            let timeout = self.timeout;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return AssetOutcome::Failed(FetchError::Network {
                        url,
                        message: "fetch pool closed".to_string(),
                    });
                };
                fetch_one(
                    fetcher.as_ref(),
                    &dedup,
                    &sequence,
                    &url,
                    &destination,
                    timeout,
                )
                .await
            });
        }

        // Step 2: wait for all of them
        let mut outcomes = Vec::with_capacity(urls.len());
        let mut aborted = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!("Download task aborted: {}", e);
                    aborted += 1;
                }
            }
        }

        // Step 3: totals
        let mut summary = tally(outcomes);
        summary.submitted = urls.len();
        summary.failed += aborted;
        Ok(summary)
    }
}

/// Folds task outcomes into totals
///
/// A duplicate only counts as one if its content ended up on disk. When the
/// write of the first copy failed, siblings that saw the fingerprint before
/// it was released were never saved and count as failures.
fn tally(outcomes: Vec<AssetOutcome>) -> FetchSummary {
    let written: HashSet<Fingerprint> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            AssetOutcome::Saved(_, key) => Some(key.clone()),
            _ => None,
        })
        .collect();

    let mut summary = FetchSummary {
        submitted: outcomes.len(),
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            AssetOutcome::Saved(path, _) => {
                summary.saved += 1;
                summary.files.push(path);
            }
            AssetOutcome::Duplicate(key) if written.contains(&key) => summary.duplicates += 1,
            AssetOutcome::Duplicate(_) => {
                tracing::warn!("Duplicate of an asset that was never written");
                summary.failed += 1;
            }
            AssetOutcome::Failed(e) | AssetOutcome::Unwritten(_, e) => {
                tracing::warn!("Failed to download asset: {}", e);
                summary.failed += 1;
            }
        }
    }
    summary
}

async fn fetch_one<F: Fetcher + ?Sized>(
    fetcher: &F,
    dedup: &DedupStore,
    sequence: &AtomicUsize,
    url: &str,
    destination: &Path,
    timeout: Duration,
) -> AssetOutcome {
    let asset = match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
        Err(_) => return AssetOutcome::Failed(FetchError::Timeout(url.to_string())),
        Ok(Err(e)) => return AssetOutcome::Failed(e),
        Ok(Ok(asset)) => asset,
    };

    if !asset.is_success() {
        return AssetOutcome::Failed(FetchError::Status {
            url: url.to_string(),
            status: asset.status,
        });
    }

    let key = fingerprint_bytes(&asset.bytes);
    if dedup.contains_or_insert(key.clone()) {
        tracing::debug!("Duplicate content at {}", url);
        return AssetOutcome::Duplicate(key);
    }

    let index = sequence.fetch_add(1, Ordering::SeqCst) + 1;
    let name = format!(
        "image_{}_{}{}",
        index,
        key.as_hex().unwrap_or_default(),
        extension_for(url)
    );
    let path = destination.join(name);

    match tokio::fs::write(&path, &asset.bytes).await {
        Ok(()) => {
            tracing::debug!("Saved {} as {}", url, path.display());
            AssetOutcome::Saved(path, key)
        }
        Err(e) => {
            // Let another URL with the same bytes claim it
            dedup.remove(&key);
            AssetOutcome::Unwritten(
                key,
                FetchError::Write {
                    path: path.display().to_string(),
                    message: e.to_string(),
                },
            )
        }
    }
}

/// File extension (with dot) taken from the URL path
pub fn extension_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            Path::new(parsed.path())
                .extension()
                .and_then(|ext| ext.to_str())
                .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .map(|ext| format!(".{}", ext))
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
