//! Item sources: the ordered list of hashtags to walk

use std::path::PathBuf;

use anyhow::Context;
use rustc_hash::FxHashSet;

/// Produces the work items for a run.
///
/// Must be deterministic (same list, same order) so resumed runs line up
/// with the checkpointed cursors.
pub trait ItemSource {
    fn items(&self) -> anyhow::Result<Vec<String>>;
}

/// Items given inline (config list or CLI).
#[derive(Clone, Debug, Default)]
pub struct StaticItems(pub Vec<String>);

impl ItemSource for StaticItems {
    fn items(&self) -> anyhow::Result<Vec<String>> {
        Ok(normalize_items(self.0.iter().map(String::as_str)))
    }
}

/// One hashtag per line. A leading `hashtag`/`hashtags` header is skipped.
#[derive(Clone, Debug)]
pub struct FileItems {
    pub path: PathBuf,
}

impl FileItems {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ItemSource for FileItems {
    fn items(&self) -> anyhow::Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read item file {}", self.path.display()))?;
        let items = parse_item_lines(&content);
        log::info!("{}: {} items", self.path.display(), items.len());
        Ok(items)
    }
}

/// Parse newline-separated items, skipping an optional header line.
pub fn parse_item_lines(content: &str) -> Vec<String> {
    let mut lines = content.lines().peekable();
    if lines
        .peek()
        .is_some_and(|l| matches!(l.trim().to_lowercase().as_str(), "hashtag" | "hashtags"))
    {
        lines.next();
    }
    normalize_items(lines)
}

/// Normalize one hashtag: trim, strip leading `#`.
pub fn normalize_item(raw: &str) -> Option<String> {
    let item = raw.trim().trim_start_matches('#').trim();
    (!item.is_empty()).then(|| item.to_string())
}

/// Normalize and drop repeats (case-insensitive), keeping first-seen order.
pub fn normalize_items<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    raw.into_iter()
        .filter_map(normalize_item)
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

/// Cross every hashtag with every platform as `platform/hashtag`,
/// hashtag-major. An empty platform list returns the hashtags unchanged.
pub fn expand_platforms(items: &[String], platforms: &[String]) -> Vec<String> {
    if platforms.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .flat_map(|item| platforms.iter().map(move |p| format!("{p}/{item}")))
        .collect()
}

/// Split a `platform/hashtag` item. Bare items have no platform.
pub fn split_item(item: &str) -> (Option<&str>, &str) {
    match item.split_once('/') {
        Some((platform, tag)) => (Some(platform), tag),
        None => (None, item),
    }
}
