//! CSV export for metrics rows

use crate::output::traits::{OutputError, OutputResult, PersistOutcome, RecordBatch, Writer};
use async_trait::async_trait;
use std::io::{self, Write};
use std::path::Path;

const SEPARATOR: char = ',';

/// Writes a header row followed by one line per metrics row
#[derive(Debug, Clone, Default)]
pub struct TableWriter;

impl TableWriter {
    pub fn new() -> Self {
        Self
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(SEPARATOR) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Writes one CSV row, quoting fields that need it
pub fn write_row<W: Write>(mut w: W, row: &[String]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{}", SEPARATOR)?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Renders a batch as CSV text; the header line is omitted when no headers were found
pub fn format_table(batch: &RecordBatch) -> OutputResult<Vec<u8>> {
    let mut out = Vec::new();
    if !batch.column_headers.is_empty() {
        write_row(&mut out, &batch.column_headers)?;
    }
    for record in &batch.records {
        let row = record.as_metrics_row().ok_or_else(|| {
            OutputError::Format(format!("expected a metrics row, got a {}", record.kind()))
        })?;
        write_row(&mut out, row.cells())?;
    }
    Ok(out)
}

#[async_trait]
impl Writer for TableWriter {
    async fn persist(
        &self,
        batch: &RecordBatch,
        destination: &Path,
    ) -> OutputResult<PersistOutcome> {
        let content = format_table(batch)?;
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, content).await?;

        tracing::info!("Data saved to {}", destination.display());
        Ok(PersistOutcome {
            destination: destination.to_path_buf(),
            saved: batch.len(),
        })
    }
}
