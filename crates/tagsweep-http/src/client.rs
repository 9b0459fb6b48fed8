//! Blocking facade over async reqwest, shared by all HTTP adapters.
//!
//! Requests run on a shared tokio runtime and are awaited with
//! `block_on`, so adapters present the sync interface rayon workers need.

use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tagsweep_core::RemoteError;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body excerpt kept in error messages
const ERROR_BODY_LIMIT: usize = 200;

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Pooled client with a per-request timeout.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .pool_max_idle_per_host(8)
            .user_agent(concat!("tagsweep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { inner, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` with query parameters and decode the body as JSON.
    pub fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        let body = self.get_text(url, query, token)?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(format!("invalid JSON: {e}")))
    }

    /// GET `url` and return the body as text.
    pub fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<String, RemoteError> {
        SHARED_RUNTIME.handle().block_on(async {
            let mut req = self.inner.get(url).query(query);
            if let Some(token) = token {
                req = req.bearer_auth(token);
            }
            let resp = req.send().await.map_err(|e| self.map_err(&e))?;
            let resp = check_status(resp).await?;
            resp.text().await.map_err(|e| self.map_err(&e))
        })
    }

    /// POST `body` as JSON; any 2xx counts as success.
    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        token: Option<&str>,
    ) -> Result<(), RemoteError> {
        SHARED_RUNTIME.handle().block_on(async {
            let mut req = self.inner.post(url).json(body);
            if let Some(token) = token {
                req = req.bearer_auth(token);
            }
            let resp = req.send().await.map_err(|e| self.map_err(&e))?;
            check_status(resp).await?;
            Ok(())
        })
    }

    fn map_err(&self, e: &reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            return RemoteError::Timeout(self.timeout);
        }
        if e.is_decode() || e.is_body() {
            return RemoteError::Decode(without_url(e));
        }
        RemoteError::Http {
            status: e.status().map(|s| s.as_u16()),
            message: without_url(e),
        }
    }
}

/// Turn a non-2xx response into an error carrying a body excerpt.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let excerpt: String = body.trim().chars().take(ERROR_BODY_LIMIT).collect();
    let message = match (status.canonical_reason(), excerpt.is_empty()) {
        (Some(reason), true) => reason.to_string(),
        (Some(reason), false) => format!("{reason}: {excerpt}"),
        (None, _) => excerpt,
    };
    Err(RemoteError::http(status.as_u16(), message))
}

/// Strip URL from error to avoid leaking endpoints and tokens in logs
fn without_url(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(url) = e.url() {
        msg = msg.replace(url.as_str(), "<url>");
    }
    msg
}

/// Read a secret from the environment; empty values count as missing.
pub fn token_from_env(var: &str) -> anyhow::Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => anyhow::bail!("environment variable {var} is not set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_token_is_error() {
        let err = token_from_env("TAGSWEEP_TEST_TOKEN_THAT_IS_NEVER_SET").unwrap_err();
        assert!(err.to_string().contains("TAGSWEEP_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn unreachable_host_is_retryable() {
        let client = HttpClient::new(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let err = client
            .get_text("http://127.0.0.1:9/", &[], None)
            .unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }
}
