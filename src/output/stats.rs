//! End-of-run report
//!
//! This module collects what the operator sees when a run finishes:
//! termination reason, counts, and where the output went.

use crate::collector::{CollectionStats, TerminationDecision};
use crate::record::RecordKind;
use std::path::PathBuf;
use std::time::Duration;

/// Summary of a finished (or interrupted) collection run
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub kind: RecordKind,

    /// Why the reveal loop stopped
    pub reason: TerminationDecision,

    /// Unique records collected
    pub collected: usize,

    /// Records (or unique files) the writer saved
    pub saved: usize,

    /// Where the output was written; `None` when nothing was saved
    pub destination: Option<PathBuf>,

    pub stats: CollectionStats,

    pub elapsed: Duration,
}

impl HarvestReport {
    pub fn was_interrupted(&self) -> bool {
        self.reason == TerminationDecision::StopInterrupted
    }

    /// One-line summary for logs
    pub fn summary_line(&self) -> String {
        match &self.destination {
            Some(destination) => format!(
                "{} {} records saved to {} ({})",
                self.saved,
                self.kind,
                destination.display(),
                self.reason
            ),
            None => format!("No {} records saved ({})", self.kind, self.reason),
        }
    }

    /// Where an interrupted run left its output, for the stderr line shown
    /// even in quiet mode; `None` for runs that were not interrupted
    pub fn interrupt_notice(&self) -> Option<String> {
        if !self.was_interrupted() {
            return None;
        }
        Some(match &self.destination {
            Some(destination) => format!(
                "Interrupted: saved {} records to {}",
                self.saved,
                destination.display()
            ),
            None => "Interrupted: nothing was saved".to_string(),
        })
    }
}

/// Prints a report to stdout in a formatted manner
pub fn print_report(report: &HarvestReport) {
    println!("=== Collection Summary ===\n");

    println!("Overview:");
    println!("  Record kind: {}", report.kind);
    println!("  Stopped because: {}", report.reason);
    println!("  Iterations: {}", report.stats.iterations);
    println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    println!();

    println!("Records:");
    println!("  Candidates seen: {}", report.stats.candidates_seen);
    println!("  Unique records: {}", report.collected);
    println!("  Duplicates skipped: {}", report.stats.duplicates_skipped);
    if report.stats.stale_skipped > 0 {
        println!("  Stale nodes skipped: {}", report.stats.stale_skipped);
    }
    println!();

    match &report.destination {
        Some(destination) => {
            println!("Saved {} to {}", report.saved, destination.display());
        }
        None => println!("Nothing was saved"),
    }
}
