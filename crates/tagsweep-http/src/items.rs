//! Item list served over HTTP

use anyhow::Context;
use tagsweep_core::ItemSource;
use tagsweep_core::source::{normalize_items, parse_item_lines};

use crate::client::HttpClient;

/// Items from a URL returning a JSON array of strings or plain text with
/// one hashtag per line.
#[derive(Debug)]
pub struct RemoteItems {
    client: HttpClient,
    url: String,
    token: Option<String>,
}

impl RemoteItems {
    pub fn new(client: HttpClient, url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token,
        }
    }
}

impl ItemSource for RemoteItems {
    fn items(&self) -> anyhow::Result<Vec<String>> {
        let body = self
            .client
            .get_text(&self.url, &[], self.token.as_deref())
            .with_context(|| format!("Failed to fetch item list from {}", self.url))?;
        let items = parse_item_body(&body)?;
        log::info!("{}: {} items", self.url, items.len());
        Ok(items)
    }
}

/// JSON array of strings, or newline-separated text.
pub fn parse_item_body(body: &str) -> anyhow::Result<Vec<String>> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('[') {
        let list: Vec<String> =
            serde_json::from_str(trimmed).context("Item list is not a JSON array of strings")?;
        return Ok(normalize_items(list.iter().map(String::as_str)));
    }
    Ok(parse_item_lines(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array() {
        let items = parse_item_body(r##"["#travel", "food", "Travel"]"##).unwrap();
        assert_eq!(items, vec!["travel", "food"]);
    }

    #[test]
    fn plain_lines_with_header() {
        let items = parse_item_body("hashtag\n#travel\n\nfood\n").unwrap();
        assert_eq!(items, vec!["travel", "food"]);
    }

    #[test]
    fn malformed_json_is_error() {
        assert!(parse_item_body("[1, 2]").is_err());
    }
}
