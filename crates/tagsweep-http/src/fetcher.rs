//! Cursor-paginated JSON API fetcher

use serde_json::Value;
use tagsweep_core::{Cursor, Page, PageFetcher, RawRecord, RemoteError};

use crate::client::HttpClient;

/// Endpoint layout of a cursor-paginated JSON search API.
///
/// A request is `GET {url}?{tag_param}=..&{limit_param}=..[&{cursor_param}=..]`.
#[derive(Clone, Debug)]
pub struct JsonFetchConfig {
    pub url: String,
    pub tag_param: String,
    pub limit_param: String,
    pub cursor_param: String,
    /// JSON pointer to the records array
    pub records_pointer: String,
    /// JSON pointer to the next cursor (null, missing or "" = exhausted)
    pub cursor_pointer: String,
    /// Bearer token, already resolved from the environment
    pub token: Option<String>,
}

impl JsonFetchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tag_param: "tag".to_string(),
            limit_param: "limit".to_string(),
            cursor_param: "cursor".to_string(),
            records_pointer: "/data".to_string(),
            cursor_pointer: "/next_cursor".to_string(),
            token: None,
        }
    }
}

#[derive(Debug)]
pub struct JsonPageFetcher {
    client: HttpClient,
    config: JsonFetchConfig,
}

impl JsonPageFetcher {
    pub fn new(client: HttpClient, config: JsonFetchConfig) -> Self {
        Self { client, config }
    }
}

impl PageFetcher for JsonPageFetcher {
    fn fetch(
        &self,
        item: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page, RemoteError> {
        let cfg = &self.config;
        let mut query = vec![
            (cfg.tag_param.as_str(), item.to_string()),
            (cfg.limit_param.as_str(), page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push((cfg.cursor_param.as_str(), cursor.to_string()));
        }

        let body = self.client.get_json(&cfg.url, &query, cfg.token.as_deref())?;
        let mut page = parse_page(&body, &cfg.records_pointer, &cfg.cursor_pointer)?;

        // A source echoing the same cursor would page forever
        if page.next_cursor.is_some() && page.next_cursor.as_ref() == cursor {
            log::warn!("item={item} source repeated cursor {cursor:?}, treating as exhausted");
            page.next_cursor = None;
        }
        Ok(page)
    }
}

/// Extract records and the next cursor from a response body.
///
/// Array entries that are not JSON objects are skipped.
pub fn parse_page(
    body: &Value,
    records_pointer: &str,
    cursor_pointer: &str,
) -> Result<Page, RemoteError> {
    let records = match body.pointer(records_pointer) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => {
            return Err(RemoteError::Decode(format!(
                "no records array at {records_pointer}"
            )));
        }
        Some(other) => {
            return Err(RemoteError::Decode(format!(
                "expected array at {records_pointer}, found {}",
                type_name(other)
            )));
        }
    };

    let total = records.len();
    let records: Vec<RawRecord> = records
        .iter()
        .filter_map(|v| RawRecord::from_value(v.clone()))
        .collect();
    if records.len() < total {
        log::debug!("skipped {} non-object records", total - records.len());
    }

    let next_cursor = match body.pointer(cursor_pointer) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(Cursor::Token(s.clone())),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(offset) => Some(Cursor::Offset(offset)),
            None => {
                return Err(RemoteError::Decode(format!("invalid numeric cursor {n}")));
            }
        },
        Some(other) => {
            return Err(RemoteError::Decode(format!(
                "expected cursor at {cursor_pointer}, found {}",
                type_name(other)
            )));
        }
    };

    Ok(Page {
        records,
        next_cursor,
    })
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
