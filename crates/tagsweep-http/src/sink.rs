//! Webhook publish sink: one POST per batch

use tagsweep_core::{CanonicalRecord, RecordSink, RemoteError};

use crate::client::HttpClient;

/// POSTs each batch as a JSON array of canonical records.
#[derive(Debug)]
pub struct WebhookSink {
    client: HttpClient,
    url: String,
    token: Option<String>,
}

impl WebhookSink {
    pub fn new(client: HttpClient, url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token,
        }
    }
}

impl RecordSink for WebhookSink {
    fn publish(&self, batch: &[CanonicalRecord]) -> Result<(), RemoteError> {
        log::debug!("POST batch of {} records", batch.len());
        self.client.post_json(&self.url, batch, self.token.as_deref())
    }
}
