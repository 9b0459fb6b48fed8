//! Page fetcher interface implemented by data-source adapters

use crate::error::RemoteError;
use crate::record::{Cursor, Page};

/// Fetches one page of raw records for a work item.
///
/// `cursor = None` requests the first page. A returned
/// `next_cursor = None` marks the item as exhausted. Calls with the same
/// `(item, cursor)` should return the same records; the deduplicator
/// covers adapters that cannot guarantee it.
pub trait PageFetcher: Send + Sync {
    fn fetch(
        &self,
        item: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page, RemoteError>;
}

impl<F: PageFetcher + ?Sized> PageFetcher for std::sync::Arc<F> {
    fn fetch(
        &self,
        item: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page, RemoteError> {
        (**self).fetch(item, cursor, page_size)
    }
}
