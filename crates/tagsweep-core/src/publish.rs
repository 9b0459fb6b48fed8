//! Batch publisher: buffer accepted records, flush them to a sink

use std::sync::Arc;

use crate::error::RemoteError;
use crate::record::CanonicalRecord;
use crate::retry::BackoffPolicy;
use crate::shutdown::StopToken;

/// Remote destination for accepted records.
pub trait RecordSink: Send + Sync {
    fn publish(&self, batch: &[CanonicalRecord]) -> Result<(), RemoteError>;
}

/// Per-worker buffer in front of a shared [`RecordSink`].
///
/// A failed flush leaves the buffer intact; the caller decides what to do
/// with the records (the controller releases their reservations and halts).
pub struct BatchPublisher {
    sink: Arc<dyn RecordSink>,
    policy: BackoffPolicy,
    batch_size: usize,
    buffer: Vec<CanonicalRecord>,
}

impl std::fmt::Debug for BatchPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPublisher")
            .field("batch_size", &self.batch_size)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl BatchPublisher {
    pub fn new(sink: Arc<dyn RecordSink>, policy: BackoffPolicy, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            policy,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
        }
    }

    pub fn enqueue(&mut self, record: CanonicalRecord) {
        self.buffer.push(record);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer reached the batch threshold and should be flushed
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.batch_size
    }

    /// Dedup keys of the buffered records
    pub fn keys(&self) -> Vec<String> {
        self.buffer.iter().map(CanonicalRecord::key).collect()
    }

    /// Send the buffer to the sink with retry.
    ///
    /// On success the buffer is cleared and the committed keys are returned.
    /// On failure nothing changes.
    pub fn flush(&mut self, label: &str, stop: &StopToken) -> Result<Vec<String>, RemoteError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let batch = &self.buffer;
        // The first attempt always runs, even after a stop request.
        self.policy
            .run(label, stop, || self.sink.publish(batch))?;
        let keys = self.keys();
        self.buffer.clear();
        Ok(keys)
    }

    /// Drop buffered records, returning their keys.
    pub fn discard(&mut self) -> Vec<String> {
        let keys = self.keys();
        self.buffer.clear();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        batches: Mutex<Vec<Vec<String>>>,
        fail_first: AtomicUsize,
    }

    impl RecordingSink {
        fn new(fail_first: usize) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail_first: AtomicUsize::new(fail_first),
            }
        }
    }

    impl RecordSink for RecordingSink {
        fn publish(&self, batch: &[CanonicalRecord]) -> Result<(), RemoteError> {
            let left = self.fail_first.load(Ordering::SeqCst);
            if left > 0 {
                self.fail_first.store(left - 1, Ordering::SeqCst);
                return Err(RemoteError::http(503, "unavailable"));
            }
            self.batches
                .lock()
                .unwrap()
                .push(batch.iter().map(|r| r.identity.clone()).collect());
            Ok(())
        }
    }

    fn record(id: &str) -> CanonicalRecord {
        CanonicalRecord {
            identity: id.to_string(),
            attributes: Map::new(),
            source_item: "t".to_string(),
        }
    }

    #[test]
    fn full_at_batch_size() {
        let sink = Arc::new(RecordingSink::new(0));
        let mut p = BatchPublisher::new(sink, BackoffPolicy::immediate(1), 2);
        p.enqueue(record("a"));
        assert!(!p.is_full());
        p.enqueue(record("b"));
        assert!(p.is_full());
    }

    #[test]
    fn flush_clears_and_returns_keys() {
        let sink = Arc::new(RecordingSink::new(0));
        let mut p = BatchPublisher::new(sink.clone(), BackoffPolicy::immediate(1), 10);
        p.enqueue(record("A"));
        p.enqueue(record("@b"));
        let keys = p.flush("t", &StopToken::new()).unwrap();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(p.is_empty());
        assert_eq!(sink.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn flush_retries_transient() {
        let sink = Arc::new(RecordingSink::new(2));
        let mut p = BatchPublisher::new(sink.clone(), BackoffPolicy::immediate(3), 10);
        p.enqueue(record("a"));
        assert!(p.flush("t", &StopToken::new()).is_ok());
        assert_eq!(sink.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_flush_keeps_buffer() {
        let sink = Arc::new(RecordingSink::new(3));
        let mut p = BatchPublisher::new(sink.clone(), BackoffPolicy::immediate(3), 10);
        for id in ["a", "b", "c", "d", "e"] {
            p.enqueue(record(id));
        }
        assert!(p.flush("t", &StopToken::new()).is_err());
        assert_eq!(p.len(), 5);
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_flush_skips_sink() {
        let sink = Arc::new(RecordingSink::new(5));
        let mut p = BatchPublisher::new(sink, BackoffPolicy::immediate(1), 10);
        assert!(p.flush("t", &StopToken::new()).unwrap().is_empty());
    }

    #[test]
    fn discard_returns_keys() {
        let sink = Arc::new(RecordingSink::new(0));
        let mut p = BatchPublisher::new(sink, BackoffPolicy::immediate(1), 10);
        p.enqueue(record("X"));
        assert_eq!(p.discard(), vec!["x"]);
        assert!(p.is_empty());
    }
}
