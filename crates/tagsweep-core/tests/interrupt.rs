//! Signal handling sets a process-wide flag, so this lives in its own test
//! binary.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tagsweep_core::{
    BackoffPolicy, CanonicalRecord, CheckpointStore, Cursor, ItemOutcome, Ledger, Page,
    PageFetcher, Pipeline, Position, RawRecord, RecordFilter, RecordSink, RemoteError, RunOptions,
    RunStatus, is_shutdown_requested, request_shutdown,
};
use tempfile::TempDir;

/// Three pages of two records per item; fetching page 2 of `travel` acts
/// like a SIGINT arriving mid-run.
#[derive(Default)]
struct SignalingFetcher {
    calls: Mutex<Vec<(String, u64)>>,
}

impl PageFetcher for SignalingFetcher {
    fn fetch(
        &self,
        item: &str,
        cursor: Option<&Cursor>,
        _page_size: usize,
    ) -> Result<Page, RemoteError> {
        let index = match cursor {
            None => 0,
            Some(Cursor::Offset(n)) => *n,
            Some(Cursor::Token(t)) => panic!("unexpected token cursor {t}"),
        };
        self.calls.lock().unwrap().push((item.to_string(), index));
        if item == "travel" && index == 1 {
            request_shutdown();
        }
        let prefix = (b'a' + index as u8) as char;
        Ok(Page {
            records: (0..2)
                .map(|i| {
                    RawRecord::from_value(json!({"id": format!("{prefix}{i}"), "followers": 9000}))
                        .unwrap()
                })
                .collect(),
            next_cursor: (index < 2).then_some(Cursor::Offset(index + 1)),
        })
    }
}

#[derive(Default)]
struct CollectingSink {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordSink for CollectingSink {
    fn publish(&self, batch: &[CanonicalRecord]) -> Result<(), RemoteError> {
        self.batches
            .lock()
            .unwrap()
            .push(batch.iter().map(|r| r.identity.clone()).collect());
        Ok(())
    }
}

#[test]
fn interrupt_finishes_page_and_saves_checkpoint() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
    let fetcher = Arc::new(SignalingFetcher::default());
    let sink = Arc::new(CollectingSink::default());
    let options = RunOptions {
        page_size: 2,
        concurrency: 1,
        batch_size: 3,
        inter_page_delay: Duration::ZERO,
        inter_item_delay: Duration::ZERO,
        ..Default::default()
    };
    let filter = RecordFilter {
        identity_field: "id".to_string(),
        ..RecordFilter::new(0)
    };
    let pipeline = Pipeline::new(
        fetcher.clone(),
        sink.clone(),
        filter,
        BackoffPolicy::immediate(3),
        options,
    );

    assert!(!is_shutdown_requested());
    let ledger = Ledger::open(store.clone(), None);
    let report = pipeline
        .run(vec!["travel".to_string(), "food".to_string()], &ledger)
        .unwrap();

    assert_eq!(report.status, RunStatus::Interrupted);
    assert_eq!(
        report.outcomes,
        vec![("travel".to_string(), ItemOutcome::Stopped)]
    );
    // Page 2 is finished, page 3 and the next item are never requested
    assert_eq!(
        *fetcher.calls.lock().unwrap(),
        vec![("travel".to_string(), 0), ("travel".to_string(), 1)]
    );
    // Full batch mid-page, then the remainder flushed on the way out
    assert_eq!(
        *sink.batches.lock().unwrap(),
        vec![vec!["a0", "a1", "b0"], vec!["b1"]]
    );

    let saved = store.load();
    assert_eq!(saved.total_accepted, 4);
    assert_eq!(saved.processed_identities, vec!["a0", "a1", "b0", "b1"]);
    assert_eq!(saved.position("travel"), Position::At(Cursor::Offset(2)));
    assert_eq!(saved.position("food"), Position::Start);
}
