//! Mutable state of one collection run

use crate::output::RecordBatch;
use crate::record::{fingerprint, DedupStore, Fingerprint, OrderPolicy, Record, RecordKind};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of the per-iteration termination check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationDecision {
    /// Keep revealing
    Continue,

    /// The wall-clock budget ran out
    StopTimeExceeded,

    /// Too many consecutive iterations surfaced nothing new
    StopNoNewContent,

    /// The reveal trigger disappeared or failed
    StopNoMoreTrigger,

    /// The run was cancelled by the operator
    StopInterrupted,
}

impl TerminationDecision {
    pub fn is_stop(&self) -> bool {
        !matches!(self, Self::Continue)
    }

    /// Returns true for the stop reasons that mean collection ran to its end
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            Self::StopTimeExceeded | Self::StopNoNewContent | Self::StopNoMoreTrigger
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::StopTimeExceeded => "time limit reached",
            Self::StopNoNewContent => "no new content",
            Self::StopNoMoreTrigger => "no more content to reveal",
            Self::StopInterrupted => "interrupted",
        }
    }
}

impl fmt::Display for TerminationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub iterations: u32,
    pub candidates_seen: usize,
    pub duplicates_skipped: usize,
    pub stale_skipped: usize,
}

/// Records and bookkeeping accumulated by the reveal loop
///
/// Only the fingerprint set is shared; everything else is owned by the loop.
#[derive(Debug)]
pub struct CollectionState {
    kind: RecordKind,
    records: Vec<Record>,
    /// Fingerprint of `records[i]`, kept in step with it
    keys: Vec<Fingerprint>,
    seen: Arc<DedupStore>,
    streak: u32,
    started: Instant,
    counterpart: Option<String>,
    column_headers: Vec<String>,
    stats: CollectionStats,
}

impl CollectionState {
    pub fn new(kind: RecordKind) -> Self {
        Self::with_store(kind, Arc::new(DedupStore::new()))
    }

    /// Creates a state that records fingerprints into an existing store
    pub fn with_store(kind: RecordKind, seen: Arc<DedupStore>) -> Self {
        Self {
            kind,
            records: Vec::new(),
            keys: Vec::new(),
            seen,
            streak: 0,
            started: Instant::now(),
            counterpart: None,
            column_headers: Vec::new(),
            stats: CollectionStats::default(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Adds unseen candidates and returns how many were new
    ///
    /// Candidates arrive in page order. For chronological kinds, a new record
    /// is placed right after the nearest known record above it on the page;
    /// new records with no known record above them go before the first known
    /// one, or in front of everything when the snapshot shares nothing with
    /// what was already collected.
    ///
    /// # Arguments
    ///
    /// * `candidates` - Records read from the page, top to bottom
    ///
    /// # Returns
    ///
    /// The number of candidates not seen before. Repeats are counted in
    /// the stats and dropped.
    pub fn absorb(&mut self, candidates: Vec<Record>) -> usize {
        self.stats.candidates_seen += candidates.len();
        match self.kind.order_policy() {
            OrderPolicy::Discovery => self.absorb_in_discovery_order(candidates),
            OrderPolicy::Chronological => self.absorb_in_page_order(candidates),
        }
    }

    fn absorb_in_discovery_order(&mut self, candidates: Vec<Record>) -> usize {
        let mut new_found = 0;
        for candidate in candidates {
            let key = fingerprint(&candidate);
            if self.seen.contains_or_insert(key.clone()) {
                self.stats.duplicates_skipped += 1;
                continue;
            }
            self.records.push(candidate);
            self.keys.push(key);
            new_found += 1;
        }
        new_found
    }

    fn absorb_in_page_order(&mut self, candidates: Vec<Record>) -> usize {
        let mut new_found = 0;
        let mut anchor: Option<usize> = None;
        let mut pending: Vec<(Fingerprint, Record)> = Vec::new();

        for candidate in candidates {
            let key = fingerprint(&candidate);
            if self.seen.contains_or_insert(key.clone()) {
                self.stats.duplicates_skipped += 1;
                let Some(mut position) = self.position_of(&key) else {
                    // Repeated within this snapshot before being placed
                    continue;
                };
                if anchor.is_none() && !pending.is_empty() {
                    let count = pending.len();
                    self.splice_at(position, pending.drain(..));
                    position += count;
                }
                anchor = Some(position);
                continue;
            }

            new_found += 1;
            match anchor {
                Some(position) => {
                    self.records.insert(position + 1, candidate);
                    self.keys.insert(position + 1, key);
                    anchor = Some(position + 1);
                }
                None => pending.push((key, candidate)),
            }
        }

        if !pending.is_empty() {
            self.splice_at(0, pending.drain(..));
        }
        new_found
    }

    fn position_of(&self, key: &Fingerprint) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    fn splice_at(&mut self, index: usize, entries: impl Iterator<Item = (Fingerprint, Record)>) {
        let (keys, records): (Vec<_>, Vec<_>) = entries.unzip();
        self.keys.splice(index..index, keys);
        self.records.splice(index..index, records);
    }

    /// Closes an iteration, updating the no-new-content streak
    pub fn record_iteration(&mut self, new_found: usize) {
        self.stats.iterations += 1;
        if new_found > 0 {
            self.streak = 0;
        } else {
            self.streak += 1;
        }
    }

    pub fn note_stale(&mut self, count: usize) {
        self.stats.stale_skipped += count;
    }

    /// Remembers the display name of the other party; the first non-empty one wins
    pub fn note_counterpart(&mut self, name: &str) {
        if self.counterpart.is_none() && !name.trim().is_empty() {
            self.counterpart = Some(name.trim().to_string());
        }
    }

    pub fn counterpart(&self) -> Option<&str> {
        self.counterpart.as_deref()
    }

    pub fn set_column_headers(&mut self, headers: Vec<String>) {
        self.column_headers = headers;
    }

    pub fn column_headers(&self) -> &[String] {
        &self.column_headers
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn stats(&self) -> CollectionStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Snapshot of everything collected so far, ready for a writer
    pub fn to_batch(&self, source_url: &str) -> RecordBatch {
        RecordBatch {
            kind: self.kind,
            records: self.records.clone(),
            source_url: source_url.to_string(),
            counterpart: self.counterpart.clone(),
            column_headers: self.column_headers.clone(),
        }
    }
}
