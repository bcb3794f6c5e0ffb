//! End-to-end collection runs against replayed pages

mod common;
mod images_tests;
mod metrics_tests;
mod transcript_tests;
