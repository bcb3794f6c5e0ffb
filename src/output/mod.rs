//! Output module for persisting collected records
//!
//! This module handles:
//! - Plain-text chat transcripts
//! - CSV tables of metrics rows
//! - Directories of downloaded images
//! - The end-of-run report

mod assets;
pub mod stats;
mod table;
mod traits;
mod transcript;

pub use assets::AssetDirectoryWriter;
pub use stats::{print_report, HarvestReport};
pub use table::{format_table, write_row, TableWriter};
pub use traits::{OutputError, OutputResult, PersistOutcome, RecordBatch, Writer};
pub use transcript::{format_transcript, transcript_file_name, TranscriptWriter};
