//! Writer trait and the data handed to writers
//!
//! This module defines the interface every output format implements and
//! the batch of records a collection run produces.

use crate::record::{Record, RecordKind, UNKNOWN_NAME};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything a writer needs from a collection run
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub kind: RecordKind,

    /// Records in their final order
    pub records: Vec<Record>,

    /// Page the records were collected from
    pub source_url: String,

    /// Display name of the other party (the bot), if found
    pub counterpart: Option<String>,

    /// Column names for tabular records
    pub column_headers: Vec<String>,
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counterpart_or_unknown(&self) -> &str {
        self.counterpart.as_deref().unwrap_or(UNKNOWN_NAME)
    }
}

/// Where a batch ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    /// File or directory written
    pub destination: PathBuf,

    /// Number of records (or unique files) saved
    pub saved: usize,
}

/// Trait for output writers
///
/// `destination` is a directory for writers that choose their own file
/// names, and a file path otherwise.
#[async_trait]
pub trait Writer: Send + Sync {
    async fn persist(&self, batch: &RecordBatch, destination: &Path)
        -> OutputResult<PersistOutcome>;
}
