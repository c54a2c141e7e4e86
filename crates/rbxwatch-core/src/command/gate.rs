// Authorization and per-principal command rate limiting.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::warn;

use crate::config::AccessConfig;
use crate::error::CoreError;
use crate::model::PrincipalId;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct History {
    recent: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

/// The single check every mutating command passes through.
#[derive(Debug)]
pub struct CommandGate {
    access: AccessConfig,
    history: DashMap<PrincipalId, History>,
}

impl CommandGate {
    pub fn new(access: AccessConfig) -> Self {
        Self {
            access,
            history: DashMap::new(),
        }
    }

    pub fn is_authorized(&self, principal: PrincipalId) -> bool {
        self.access.owner == Some(principal)
            || self.access.authorized.is_empty()
            || self.access.authorized.contains(&principal)
    }

    pub fn authorize(&self, principal: PrincipalId) -> Result<(), CoreError> {
        if self.is_authorized(principal) {
            Ok(())
        } else {
            warn!(principal, "unauthorized tracking command");
            Err(CoreError::PermissionDenied { principal })
        }
    }

    /// Count one command against `principal`'s sliding window.
    ///
    /// Going over the per-minute limit blocks the principal for the
    /// configured duration. The owner is never limited.
    pub fn admit(&self, principal: PrincipalId) -> Result<(), CoreError> {
        if self.access.owner == Some(principal) {
            return Ok(());
        }

        let now = Instant::now();
        let mut history = self.history.entry(principal).or_default();

        if let Some(until) = history.blocked_until {
            if now < until {
                return Err(CoreError::CommandRateLimited {
                    principal,
                    retry_after_secs: until.duration_since(now).as_secs().max(1),
                });
            }
            history.blocked_until = None;
        }

        while history
            .recent
            .front()
            .is_some_and(|t| now.duration_since(*t) >= WINDOW)
        {
            history.recent.pop_front();
        }

        let limit =
            usize::try_from(self.access.max_commands_per_minute.max(1)).unwrap_or(usize::MAX);
        if history.recent.len() >= limit {
            history.recent.clear();
            history.blocked_until = Some(now + self.access.block_duration);
            warn!(
                principal,
                block_secs = self.access.block_duration.as_secs(),
                "command rate limit exceeded, principal blocked"
            );
            return Err(CoreError::CommandRateLimited {
                principal,
                retry_after_secs: self.access.block_duration.as_secs(),
            });
        }

        history.recent.push_back(now);
        Ok(())
    }
}

/// Roblox usernames: 3 to 20 characters of letters, digits and `_`.
pub fn validate_username(username: &str) -> Result<(), CoreError> {
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Err(CoreError::validation(
            "username",
            "must be 3 to 20 characters long",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CoreError::validation(
            "username",
            "may only contain letters, digits and underscores",
        ));
    }
    Ok(())
}
