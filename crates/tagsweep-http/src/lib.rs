//! Tagsweep HTTP - adapters for JSON search APIs and webhook sinks
//!
//! Every adapter is synchronous on the outside and runs its requests on
//! [`SHARED_RUNTIME`], so it can be called from rayon workers.

pub mod client;
pub mod fetcher;
pub mod items;
pub mod router;
pub mod sink;

pub use client::{HttpClient, SHARED_RUNTIME, token_from_env};
pub use fetcher::{JsonFetchConfig, JsonPageFetcher, parse_page};
pub use items::RemoteItems;
pub use router::PlatformRouter;
pub use sink::WebhookSink;
