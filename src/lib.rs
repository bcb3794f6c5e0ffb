//! Backscroll: an incremental collector for infinite-scroll pages
//!
//! This crate drives a browser session to reveal paginated or infinite-scroll
//! content (chat transcripts, images, metrics tables), deduplicates what it
//! extracts, and persists the result even when a run is cut short.

pub mod collector;
pub mod config;
pub mod driver;
pub mod fetch;
pub mod harvest;
pub mod output;
pub mod record;
pub mod session;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Backscroll operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Browser driver error: {0}")]
    Driver(#[from] driver::DriverError),

    #[error("Session lost during collection: {0}")]
    SessionLost(String),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Collection panicked: {0}")]
    Panicked(String),

    /// A fatal failure that happened after partial results were flushed
    #[error("Collection aborted after saving {saved} records: {source}")]
    Partial {
        saved: usize,
        destination: PathBuf,
        #[source]
        source: Box<HarvestError>,
    },
}

impl HarvestError {
    /// Returns where partial results were written, if anything was saved
    pub fn saved_destination(&self) -> Option<(&PathBuf, usize)> {
        match self {
            Self::Partial {
                saved, destination, ..
            } => Some((destination, *saved)),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector in config: {0}")]
    InvalidSelector(String),
}

/// Session establishment errors
///
/// All of these are fatal: no collection happens without a ready session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Verification code required but none was provided")]
    ChallengeRequired,

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Login page unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for Backscroll operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use collector::{CollectionState, RevealLoop, RevealSettings, TerminationDecision};
pub use config::Config;
pub use harvest::{CrashSafePersister, Harvest};
pub use record::{DedupStore, Fingerprint, Record, RecordKind};
