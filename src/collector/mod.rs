//! Incremental collection engine
//!
//! This module contains the loop that reveals more content, the extractors
//! that read it, and the state those two share:
//! - [`RevealLoop`]: scroll, pause, trigger, extract, decide
//! - [`ContentExtractor`]: one implementation per record kind
//! - [`CollectionState`]: ordered records, streak, fingerprints

mod extract;
mod reveal;
mod state;

pub use extract::{
    ContentExtractor, Extraction, ImageUrlExtractor, MessagePairExtractor, MetricsRowExtractor,
};
pub use reveal::{decide, RevealLoop, RevealSettings, TriggerOutcome};
pub use state::{CollectionState, CollectionStats, TerminationDecision};
