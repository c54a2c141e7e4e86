use thiserror::Error;

/// Top-level error type for the `rbxwatch-api` crate.
///
/// Covers every failure mode of a single upstream request after the
/// retry budget is spent, plus response-shape problems detected by the
/// typed fetch operations. `rbxwatch-core` maps these into `CoreError`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Failed to build the underlying HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Upstream status ─────────────────────────────────────────────
    /// Upstream answered 429 on every attempt.
    #[error("Rate limited by upstream (HTTP 429)")]
    RateLimited,

    /// Non-success status from the upstream API.
    #[error("Unexpected status (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// The payload decoded but lacks the fields the endpoint promises.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// A paginated fetch gave up after too many failed pages.
    #[error("Gave up after {failures} failed pages: {last_error}")]
    PaginationAborted { failures: u32, last_error: String },
}

impl Error {
    /// Returns `true` if the request that produced this error should be
    /// attempted again: timeouts, connection failures, undecodable bodies,
    /// 5xx and 429. Every other status is a client error and is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } | Self::RateLimited | Self::Deserialization { .. } => true,
            Self::Status { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited => Some(429),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        for status in [500, 502, 503, 504] {
            let err = Error::Status {
                status,
                message: String::new(),
            };
            assert!(err.is_retryable(), "{status} should be retryable");
        }
    }

    #[test]
    fn client_errors_are_final() {
        for status in [400, 401, 403, 404] {
            let err = Error::Status {
                status,
                message: String::new(),
            };
            assert!(!err.is_retryable(), "{status} should not be retried");
        }
        assert!(
            Error::Status {
                status: 404,
                message: String::new()
            }
            .is_not_found()
        );
    }

    #[test]
    fn rate_limit_and_decode_failures_are_retryable() {
        assert!(Error::RateLimited.is_retryable());
        assert!(
            Error::Deserialization {
                message: "eof".into(),
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!Error::InvalidResponse("missing id".into()).is_retryable());
    }

    #[test]
    fn status_message_mentions_code() {
        let err = Error::Status {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert!(err.to_string().contains("503"));
        assert_eq!(err.status(), Some(503));
    }
}
