//! Configuration module for Backscroll
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so running without a file is supported.
//!
//! # Example
//!
//! ```no_run
//! use backscroll::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("backscroll.toml")).unwrap();
//! println!("Pause per step: {}ms", config.collection.pause_per_step_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserOptions, CollectionConfig, Config, FetchConfig, ImagesConfig, MetricsConfig,
    SessionConfig, TranscriptConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_or_default};
pub use validation::validate;
