//! Lock-free item queue shared by the worker pool

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ledger::Ledger;

/// Work items distributed to workers in order.
///
/// Workers call [`next()`](ItemQueue::next) to atomically claim the next
/// item. Items already exhausted in the checkpoint are dropped at
/// construction so resumed runs only touch unfinished work.
#[derive(Debug)]
pub struct ItemQueue {
    items: Vec<String>,
    cursor: AtomicUsize,
    skipped: usize,
}

impl ItemQueue {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
            skipped: 0,
        }
    }

    /// Keep only items the ledger has not marked exhausted (resume support)
    pub fn pending(items: Vec<String>, ledger: &Ledger) -> Self {
        let total = items.len();
        let items: Vec<String> = items
            .into_iter()
            .filter(|item| !ledger.position(item).is_exhausted())
            .collect();
        let skipped = total - items.len();
        if skipped > 0 {
            log::info!("{skipped} items already exhausted, {} to process", items.len());
        }
        Self {
            items,
            cursor: AtomicUsize::new(0),
            skipped,
        }
    }

    /// Claim next item (lock-free)
    pub fn next(&self) -> Option<&str> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i).map(String::as_str)
    }

    /// Items in queue (after filtering)
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Items dropped because they were already exhausted
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
