//! Error type shared by page fetchers and publish sinks

use std::time::Duration;

/// Failure of a single remote call (page fetch or batch publish).
///
/// Adapters map their transport errors into this type so the engine can
/// decide between retrying, deferring an item and halting the run.
#[derive(Debug)]
pub enum RemoteError {
    /// HTTP error with optional status code (`None` = connection-level failure)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Call exceeded its per-request timeout
    Timeout(Duration),
    /// Response arrived but could not be understood
    Decode(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout(d) => write!(f, "timed out after {:.1}s", d.as_secs_f64()),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for RemoteError {}

impl RemoteError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Transient failures: connection errors, timeouts, 408, 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                matches!(status, None | Some(408) | Some(429) | Some(500..=599))
            }
            Self::Timeout(_) => true,
            Self::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_500_retryable() {
        assert!(RemoteError::http(500, "boom").is_retryable());
        assert!(RemoteError::http(503, "unavailable").is_retryable());
    }

    #[test]
    fn http_429_and_408_retryable() {
        assert!(RemoteError::http(429, "slow down").is_retryable());
        assert!(RemoteError::http(408, "request timeout").is_retryable());
    }

    #[test]
    fn http_4xx_not_retryable() {
        assert!(!RemoteError::http(400, "bad").is_retryable());
        assert!(!RemoteError::http(401, "unauthorized").is_retryable());
        assert!(!RemoteError::http(404, "missing").is_retryable());
    }

    #[test]
    fn connection_error_retryable() {
        let err = RemoteError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn timeout_retryable_decode_not() {
        assert!(RemoteError::Timeout(Duration::from_secs(10)).is_retryable());
        assert!(!RemoteError::Decode("not json".into()).is_retryable());
    }

    #[test]
    fn display_formats() {
        assert_eq!(format!("{}", RemoteError::http(404, "test")), "HTTP 404: test");
        assert_eq!(
            format!("{}", RemoteError::Timeout(Duration::from_millis(1500))),
            "timed out after 1.5s"
        );
        assert!(format!("{}", RemoteError::Decode("x".into())).contains("decode"));
    }
}
