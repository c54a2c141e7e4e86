// ── Notification sinks ──
//
// The engine hands finished events to a `NotificationSink`. Delivery is
// one-shot: a failed send is logged by the caller and never retried on a
// later cycle.

mod discord;
mod escalate;
pub mod render;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use discord::{DiscordConfig, DiscordSink};
pub use escalate::Escalator;

use crate::model::{ChangeEvent, ChannelId};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid sink URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Missing permission to post in channel {destination}")]
    Forbidden { destination: ChannelId },

    #[error("Channel {destination} does not exist")]
    UnknownDestination { destination: ChannelId },

    #[error("Still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl SinkError {
    /// The destination exists but we may not post there.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Forbidden { .. } | Self::UnknownDestination { .. })
    }
}

/// Outbound delivery of change events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Post one event to `destination`.
    async fn deliver(&self, destination: ChannelId, event: &ChangeEvent) -> Result<(), SinkError>;

    /// Check that events could be posted to `destination`.
    async fn verify_destination(&self, destination: ChannelId) -> Result<(), SinkError>;
}

/// Dry-run sink: writes events to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, destination: ChannelId, event: &ChangeEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event).unwrap_or_default();
        info!(destination, kind = event.kind(), event = %payload, "notification");
        Ok(())
    }

    async fn verify_destination(&self, _destination: ChannelId) -> Result<(), SinkError> {
        Ok(())
    }
}
