//! Content fingerprints used as deduplication keys

use crate::record::{Record, RecordKind};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of digest bytes kept for a content fingerprint (128 bits)
const CONTENT_DIGEST_BYTES: usize = 16;

/// Deterministic identity of a record
///
/// Text records are identified by the exact tuple of their trimmed fields.
/// Binary assets are identified by a digest of their bytes, which is only
/// known after the asset has been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// Exact field tuple of a text record
    Fields {
        kind: RecordKind,
        values: Vec<String>,
    },

    /// Hex-encoded 128-bit digest of fetched bytes
    Content(String),
}

impl Fingerprint {
    /// Returns the hex digest for content fingerprints
    pub fn as_hex(&self) -> Option<&str> {
        match self {
            Self::Content(hex) => Some(hex),
            Self::Fields { .. } => None,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fields { kind, values } => write!(f, "{}{:?}", kind, values),
            Self::Content(hex) => f.write_str(hex),
        }
    }
}

/// Computes the fingerprint of a record
///
/// An `ImageAsset` seen on the page has no bytes yet, so during the reveal
/// phase it is keyed by its URL. Content identity for assets comes from
/// [`fingerprint_bytes`] once they are downloaded.
pub fn fingerprint(record: &Record) -> Fingerprint {
    let values = match record {
        Record::MessagePair(pair) => vec![
            pair.human_text().trim().to_string(),
            pair.bot_text().trim().to_string(),
        ],
        Record::ImageAsset(asset) => vec![asset.source_url().trim().to_string()],
        Record::MetricsRow(row) => row.cells().iter().map(|c| c.trim().to_string()).collect(),
    };

    Fingerprint::Fields {
        kind: record.kind(),
        values,
    }
}

/// Computes the content fingerprint of fetched bytes
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let digest = Sha256::digest(bytes);
    Fingerprint::Content(hex::encode(&digest[..CONTENT_DIGEST_BYTES]))
}
