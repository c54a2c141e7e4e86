// ── Core error types ──
//
// Errors surfaced by rbxwatch-core to the CLI. Upstream HTTP details are
// folded into `Api` / `Timeout` by the `From<rbxwatch_api::Error>` impl;
// callers only need to tell "could not reach Roblox" apart from "you are
// not allowed to do that".

use thiserror::Error;

use crate::model::{PrincipalId, RobloxId, TenantId};

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Upstream ─────────────────────────────────────────────────────
    #[error("Roblox API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("Roblox API timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: &'static str, id: RobloxId },

    // ── Command gate ─────────────────────────────────────────────────
    #[error("Principal {principal} is not authorized to change tracking")]
    PermissionDenied { principal: PrincipalId },

    #[error("Too many commands from {principal}; blocked for {retry_after_secs}s")]
    CommandRateLimited {
        principal: PrincipalId,
        retry_after_secs: u64,
    },

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Unknown tenant {tenant}")]
    UnknownTenant { tenant: TenantId },

    // ── Storage / notification ───────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Notification failed: {message}")]
    Notification { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<rbxwatch_api::Error> for CoreError {
    fn from(err: rbxwatch_api::Error) -> Self {
        match err {
            rbxwatch_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            rbxwatch_api::Error::Transport(ref e) if e.is_timeout() => {
                CoreError::Timeout { timeout_secs: 0 }
            }
            rbxwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid endpoint URL: {e}"),
            },
            rbxwatch_api::Error::ClientBuild(message) => CoreError::Config { message },
            rbxwatch_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            other => CoreError::Api {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

impl From<crate::notify::SinkError> for CoreError {
    fn from(err: crate::notify::SinkError) -> Self {
        CoreError::Notification {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_status_is_preserved() {
        let err: CoreError = rbxwatch_api::Error::Status {
            status: 503,
            message: "Service Unavailable".into(),
        }
        .into();
        match err {
            CoreError::Api { status, message } => {
                assert_eq!(status, Some(503));
                assert!(message.contains("503"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn timeouts_map_to_timeout() {
        let err: CoreError = rbxwatch_api::Error::Timeout { timeout_secs: 20 }.into();
        assert!(matches!(err, CoreError::Timeout { timeout_secs: 20 }));
    }
}
