//! Identity deduplication with reserve / commit / release semantics

use rustc_hash::FxHashSet;

/// Tracks identities that were published (`committed`) and identities that
/// are queued for publishing but not yet confirmed (`pending`).
///
/// `admit` is check-and-reserve: a key is admitted at most once while it is
/// pending or committed. Only `commit` makes a key permanent; `release`
/// returns a reservation after a failed publish.
///
/// Not synchronized itself; shared access goes through the
/// [`Ledger`](crate::ledger::Ledger) mutex.
#[derive(Debug, Default)]
pub struct Deduplicator {
    committed: FxHashSet<String>,
    pending: FxHashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from identities published by earlier runs.
    pub fn from_committed(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            committed: keys.into_iter().collect(),
            pending: FxHashSet::default(),
        }
    }

    /// Reserve `key` on first sight; `false` if already pending or committed.
    pub fn admit(&mut self, key: &str) -> bool {
        if self.contains(key) {
            return false;
        }
        self.pending.insert(key.to_string());
        true
    }

    /// Mark reserved keys as published. Returns how many were newly committed.
    pub fn commit<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> usize {
        let mut added = 0;
        for key in keys {
            self.pending.remove(key);
            if self.committed.insert(key.to_string()) {
                added += 1;
            }
        }
        added
    }

    /// Drop reservations without committing them.
    pub fn release<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.pending.remove(key);
        }
    }

    /// Pending or committed
    pub fn contains(&self, key: &str) -> bool {
        self.committed.contains(key) || self.pending.contains(key)
    }

    pub fn is_committed(&self, key: &str) -> bool {
        self.committed.contains(key)
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Committed keys in sorted order (stable checkpoint output).
    pub fn committed_sorted(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.committed.iter().cloned().collect();
        keys.sort_unstable();
        keys
    }
}
