//! Fingerprint set shared between the reveal loop and the asset pool

use crate::record::Fingerprint;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory set of seen fingerprints
///
/// `contains_or_insert` is a single critical section, so concurrent fetch
/// tasks can never both claim the same fingerprint.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: Mutex<HashSet<Fingerprint>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the fingerprint was already present
    ///
    /// When it was absent it is inserted before the lock is released.
    pub fn contains_or_insert(&self, fingerprint: Fingerprint) -> bool {
        !self.lock().insert(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().contains(fingerprint)
    }

    /// Forgets a fingerprint whose record could not be kept
    pub fn remove(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().remove(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Fingerprint>> {
        // The set stays consistent even if a holder panicked mid-insert
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fingerprint_bytes;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_contains_or_insert_is_idempotent() {
        let store = DedupStore::new();
        let fp = fingerprint_bytes(b"same");

        assert!(!store.contains_or_insert(fp.clone()));
        assert!(store.contains_or_insert(fp.clone()));
        assert_eq!(store.len(), 1);
        assert!(store.contains(&fp));
    }

    #[test]
    fn test_remove() {
        let store = DedupStore::new();
        let fp = fingerprint_bytes(b"gone");
        store.contains_or_insert(fp.clone());
        assert!(store.remove(&fp));
        assert!(store.is_empty());
        assert!(!store.contains_or_insert(fp));
    }

    #[test]
    fn test_concurrent_inserts_claim_once() {
        let store = Arc::new(DedupStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..5)
                        .filter(|i| !store.contains_or_insert(fingerprint_bytes(&[*i as u8])))
                        .count()
                })
            })
            .collect();

        let claimed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(claimed, 5);
        assert_eq!(store.len(), 5);
    }
}
