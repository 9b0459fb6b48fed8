//! Synchronized owner of all resumable state: dedup set, cursors, total

use std::collections::BTreeMap;
use std::io;
use std::sync::Mutex;

use crate::checkpoint::{CheckpointState, CheckpointStore, apply_position, position_of};
use crate::dedup::Deduplicator;
use crate::record::{Cursor, Position};

/// Outcome of [`Ledger::admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Reserved for publishing
    Admitted,
    /// Already published or queued by some worker
    Duplicate,
    /// Published + queued records already fill `target_total`
    TargetReached,
}

#[derive(Debug)]
struct Inner {
    dedup: Deduplicator,
    cursors: BTreeMap<String, Option<Cursor>>,
    total_accepted: u64,
}

impl Inner {
    fn to_state(&self) -> CheckpointState {
        CheckpointState {
            processed_identities: self.dedup.committed_sorted(),
            item_cursors: self.cursors.clone(),
            total_accepted: self.total_accepted,
        }
    }
}

/// All mutations happen under one mutex, and every persisting operation
/// saves while still holding it, so checkpoint writes are serialized and
/// always reflect a consistent state.
#[derive(Debug)]
pub struct Ledger {
    store: CheckpointStore,
    target_total: Option<u64>,
    inner: Mutex<Inner>,
}

impl Ledger {
    /// Load the checkpoint (empty if absent or corrupt) for writing.
    ///
    /// `target_total` is the only cutoff a run enforces.
    pub fn open(store: CheckpointStore, target_total: Option<u64>) -> Self {
        store.cleanup_tmp();
        let state = store.load();
        Self::from_state(store, state, target_total)
    }

    pub fn from_state(
        store: CheckpointStore,
        state: CheckpointState,
        target_total: Option<u64>,
    ) -> Self {
        let inner = Inner {
            dedup: Deduplicator::from_committed(state.processed_identities),
            cursors: state.item_cursors,
            total_accepted: state.total_accepted,
        };
        Self {
            store,
            target_total,
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("ledger mutex poisoned")
    }

    pub fn target_total(&self) -> Option<u64> {
        self.target_total
    }

    pub fn position(&self, item: &str) -> Position {
        position_of(&self.lock().cursors, item)
    }

    pub fn total_accepted(&self) -> u64 {
        self.lock().total_accepted
    }

    /// Whether published records already meet `target_total`.
    pub fn target_met(&self) -> bool {
        self.target_total
            .is_some_and(|target| self.lock().total_accepted >= target)
    }

    /// Atomic check-and-reserve of an identity key.
    ///
    /// Duplicates are reported before the target check so a repeat is
    /// never mistaken for an overshoot.
    pub fn admit(&self, key: &str) -> Admission {
        let mut inner = self.lock();
        if inner.dedup.contains(key) {
            return Admission::Duplicate;
        }
        if let Some(target) = self.target_total {
            let in_flight = inner.total_accepted + inner.dedup.pending_len() as u64;
            if in_flight >= target {
                return Admission::TargetReached;
            }
        }
        inner.dedup.admit(key);
        Admission::Admitted
    }

    /// Return reservations of a batch that could not be published.
    pub fn release<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        self.lock().dedup.release(keys);
    }

    /// Record a successfully published batch and persist.
    ///
    /// `advance` optionally moves an item's position in the same write, so
    /// a cursor is never persisted ahead of the records it covers.
    /// Returns the new `total_accepted`.
    pub fn commit<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a str>,
        advance: Option<(&str, Position)>,
    ) -> io::Result<u64> {
        let mut inner = self.lock();
        let added = inner.dedup.commit(keys);
        inner.total_accepted += added as u64;
        if let Some((item, position)) = advance {
            apply_position(&mut inner.cursors, item, position);
        }
        self.store.save(&inner.to_state())?;
        Ok(inner.total_accepted)
    }

    /// Move an item's position and persist.
    pub fn advance(&self, item: &str, position: Position) -> io::Result<()> {
        let mut inner = self.lock();
        apply_position(&mut inner.cursors, item, position);
        self.store.save(&inner.to_state())
    }

    /// Persist the current state as-is.
    pub fn save(&self) -> io::Result<()> {
        let inner = self.lock();
        self.store.save(&inner.to_state())
    }

    pub fn snapshot(&self) -> CheckpointState {
        self.lock().to_state()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().dedup.pending_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ledger(dir: &TempDir, target: Option<u64>) -> Ledger {
        Ledger::open(CheckpointStore::new(dir.path().join("cp.json")), target)
    }

    #[test]
    fn admit_commit_persists() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir, None);
        assert_eq!(l.admit("a"), Admission::Admitted);
        assert_eq!(l.admit("a"), Admission::Duplicate);
        let total = l
            .commit(["a"], Some(("tag", Position::At(Cursor::Offset(2)))))
            .unwrap();
        assert_eq!(total, 1);

        let reopened = ledger(&dir, None);
        assert_eq!(reopened.total_accepted(), 1);
        assert_eq!(reopened.admit("a"), Admission::Duplicate);
        assert_eq!(reopened.position("tag"), Position::At(Cursor::Offset(2)));
    }

    #[test]
    fn open_clears_stale_tmp() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join("cp.json.tmp");
        std::fs::write(&tmp, b"{").unwrap();
        let l = ledger(&dir, None);
        assert!(!tmp.exists());
        assert_eq!(l.total_accepted(), 0);
    }

    #[test]
    fn release_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir, None);
        l.admit("a");
        l.release(["a"]);
        l.save().unwrap();
        let snap = ledger(&dir, None).snapshot();
        assert!(snap.processed_identities.is_empty());
        assert_eq!(snap.total_accepted, 0);
        assert_eq!(l.admit("a"), Admission::Admitted);
    }

    #[test]
    fn target_counts_pending() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir, Some(2));
        assert_eq!(l.admit("a"), Admission::Admitted);
        assert_eq!(l.admit("b"), Admission::Admitted);
        assert_eq!(l.admit("c"), Admission::TargetReached);
        assert_eq!(l.admit("a"), Admission::Duplicate);
        l.release(["b"]);
        assert_eq!(l.admit("c"), Admission::Admitted);
    }

    #[test]
    fn target_met_after_commit() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir, Some(1));
        assert!(!l.target_met());
        l.admit("a");
        l.commit(["a"], None).unwrap();
        assert!(l.target_met());
        assert_eq!(l.admit("b"), Admission::TargetReached);
        assert_eq!(l.admit("a"), Admission::Duplicate);
    }

    #[test]
    fn advance_exhausted_persists_null() {
        let dir = TempDir::new().unwrap();
        let l = ledger(&dir, None);
        l.advance("tag", Position::Exhausted).unwrap();
        assert_eq!(ledger(&dir, None).position("tag"), Position::Exhausted);
    }

    #[test]
    fn concurrent_admit_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let l = Arc::new(ledger(&dir, None));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let l = l.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| l.admit(&format!("user{i}")) == Admission::Admitted)
                        .count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
        assert_eq!(l.pending_len(), 100);
    }
}
