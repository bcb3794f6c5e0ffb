//! Records recovered from a rendered page
//!
//! This module defines the three record kinds a collection run produces and
//! how their identity is derived:
//!
//! - `MessagePair`: one human prompt and the bot reply rendered under it
//! - `ImageAsset`: an image URL found in the conversation
//! - `MetricsRow`: one row of a metrics table
//!
//! Identity comes from content, never from position on the page. See
//! [`fingerprint`] and [`DedupStore`].

mod dedup;
mod hash;

pub use dedup::DedupStore;
pub use hash::{fingerprint, fingerprint_bytes, Fingerprint};

use std::fmt;

/// Marker stored in a field whose sub-element was missing from the page
pub const MISSING_FIELD: &str = "";

/// Sentinel used when an identifying name could not be found
pub const UNKNOWN_NAME: &str = "Unknown";

/// The kind of record a collection run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    MessagePair,
    ImageAsset,
    MetricsRow,
}

/// How the final record sequence is arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Keep the order in which records were first seen
    Discovery,

    /// Restore the page's chronological order for content revealed newest-first
    Chronological,
}

impl RecordKind {
    /// Returns the ordering policy for this kind of record
    ///
    /// Chat transcripts are revealed from the newest message upwards, so they
    /// need re-arranging. Assets and table rows keep discovery order.
    pub fn order_policy(&self) -> OrderPolicy {
        match self {
            Self::MessagePair => OrderPolicy::Chronological,
            Self::ImageAsset | Self::MetricsRow => OrderPolicy::Discovery,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessagePair => "message pair",
            Self::ImageAsset => "image",
            Self::MetricsRow => "metrics row",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One human message and the bot reply paired with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePair {
    human_text: String,
    bot_text: String,
}

impl MessagePair {
    /// Creates a message pair, trimming both fields
    pub fn new(human_text: impl AsRef<str>, bot_text: impl AsRef<str>) -> Self {
        Self {
            human_text: human_text.as_ref().trim().to_string(),
            bot_text: bot_text.as_ref().trim().to_string(),
        }
    }

    pub fn human_text(&self) -> &str {
        &self.human_text
    }

    pub fn bot_text(&self) -> &str {
        &self.bot_text
    }

    /// Returns true if either side was missing when the pair was read
    pub fn is_partial(&self) -> bool {
        self.human_text == MISSING_FIELD || self.bot_text == MISSING_FIELD
    }
}

/// A binary asset referenced by the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    source_url: String,
}

impl ImageAsset {
    pub fn new(source_url: impl AsRef<str>) -> Self {
        Self {
            source_url: source_url.as_ref().trim().to_string(),
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

/// One row of a metrics table, cells in column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRow {
    cells: Vec<String>,
}

impl MetricsRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            cells: cells
                .into_iter()
                .map(|cell| cell.as_ref().trim().to_string())
                .collect(),
        }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// A recovered unit of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    MessagePair(MessagePair),
    ImageAsset(ImageAsset),
    MetricsRow(MetricsRow),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::MessagePair(_) => RecordKind::MessagePair,
            Self::ImageAsset(_) => RecordKind::ImageAsset,
            Self::MetricsRow(_) => RecordKind::MetricsRow,
        }
    }

    pub fn as_message_pair(&self) -> Option<&MessagePair> {
        match self {
            Self::MessagePair(pair) => Some(pair),
            _ => None,
        }
    }

    pub fn as_image_asset(&self) -> Option<&ImageAsset> {
        match self {
            Self::ImageAsset(asset) => Some(asset),
            _ => None,
        }
    }

    pub fn as_metrics_row(&self) -> Option<&MetricsRow> {
        match self {
            Self::MetricsRow(row) => Some(row),
            _ => None,
        }
    }
}

impl From<MessagePair> for Record {
    fn from(pair: MessagePair) -> Self {
        Self::MessagePair(pair)
    }
}

impl From<ImageAsset> for Record {
    fn from(asset: ImageAsset) -> Self {
        Self::ImageAsset(asset)
    }
}

impl From<MetricsRow> for Record {
    fn from(row: MetricsRow) -> Self {
        Self::MetricsRow(row)
    }
}
