//! Tagsweep Core - paginated collection engine
//!
//! Pages through remote sources per work item, filters and deduplicates
//! records, publishes them in batches and checkpoints progress so an
//! interrupted run resumes where it stopped.

pub mod checkpoint;
pub mod controller;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod ledger;
pub mod logging;
pub mod progress;
pub mod publish;
pub mod record;
pub mod retry;
pub mod shutdown;
pub mod source;
pub mod stats;
pub mod work_queue;

// Re-exports for convenience
pub use checkpoint::{CheckpointState, CheckpointStore};
pub use controller::{ItemOutcome, Pipeline, RunOptions, RunReport, RunStatus};
pub use dedup::Deduplicator;
pub use error::RemoteError;
pub use fetch::PageFetcher;
pub use filter::RecordFilter;
pub use ledger::{Admission, Ledger};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use publish::{BatchPublisher, RecordSink};
pub use record::{CanonicalRecord, Cursor, Page, Position, RawRecord, identity_key};
pub use retry::BackoffPolicy;
pub use shutdown::{StopReason, StopToken, is_shutdown_requested, request_shutdown, shutdown_flag};
pub use source::{FileItems, ItemSource, StaticItems, expand_platforms, normalize_items, split_item};
pub use stats::{RunStats, RunSummary};
