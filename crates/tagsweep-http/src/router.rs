//! Dispatch `platform/hashtag` items to per-platform fetchers

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tagsweep_core::{Cursor, Page, PageFetcher, RemoteError, split_item};

/// Attribute added to records that do not name their platform
pub const PLATFORM_FIELD: &str = "platform";

/// Routes each item to the fetcher registered for its platform prefix.
///
/// Bare items (no `/`) and unknown platforms are rejected. The inner
/// fetcher only sees the hashtag.
#[derive(Default)]
pub struct PlatformRouter {
    routes: BTreeMap<String, Arc<dyn PageFetcher>>,
}

impl std::fmt::Debug for PlatformRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRouter")
            .field("platforms", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PlatformRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, platform: impl Into<String>, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.routes.insert(platform.into(), fetcher);
        self
    }
}

impl PageFetcher for PlatformRouter {
    fn fetch(
        &self,
        item: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page, RemoteError> {
        let (platform, tag) = split_item(item);
        let (platform, fetcher) = platform
            .and_then(|p| self.routes.get(p).map(|f| (p, f)))
            .ok_or_else(|| {
                RemoteError::Decode(format!("no fetcher configured for item {item}"))
            })?;

        let mut page = fetcher.fetch(tag, cursor, page_size)?;
        for record in &mut page.records {
            if record.get(PLATFORM_FIELD).is_none() {
                record.insert(PLATFORM_FIELD, Value::String(platform.to_string()));
            }
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tagsweep_core::RawRecord;

    /// Returns one record per call and remembers the items it was asked for.
    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<String>>,
        record: Option<Value>,
    }

    impl PageFetcher for Echo {
        fn fetch(&self, item: &str, _: Option<&Cursor>, _: usize) -> Result<Page, RemoteError> {
            self.seen.lock().unwrap().push(item.to_string());
            let value = self
                .record
                .clone()
                .unwrap_or_else(|| json!({"username": item}));
            Ok(Page {
                records: vec![RawRecord::from_value(value).unwrap()],
                next_cursor: None,
            })
        }
    }

    #[test]
    fn routes_by_prefix_and_tags_platform() {
        let ig = Arc::new(Echo::default());
        let tt = Arc::new(Echo::default());
        let router = PlatformRouter::new()
            .route("instagram", ig.clone())
            .route("tiktok", tt.clone());

        let page = router.fetch("tiktok/travel", None, 10).unwrap();
        assert_eq!(tt.seen.lock().unwrap().as_slice(), ["travel"]);
        assert!(ig.seen.lock().unwrap().is_empty());
        assert_eq!(page.records[0].get("platform"), Some(&json!("tiktok")));
    }

    #[test]
    fn keeps_platform_reported_by_source() {
        let yt = Arc::new(Echo {
            record: Some(json!({"username": "a", "platform": "youtube-shorts"})),
            ..Default::default()
        });
        let router = PlatformRouter::new().route("youtube", yt);
        let page = router.fetch("youtube/food", None, 10).unwrap();
        assert_eq!(page.records[0].get("platform"), Some(&json!("youtube-shorts")));
    }

    #[test]
    fn unknown_platform_not_retryable() {
        let router = PlatformRouter::new().route("instagram", Arc::new(Echo::default()));
        let err = router.fetch("facebook/travel", None, 10).unwrap_err();
        assert!(!err.is_retryable());
        assert!(router.fetch("travel", None, 10).is_err());
    }
}
