//! CLI configuration: thin wrapper around `rbxwatch_config`.
//!
//! Adds the pieces that depend on `GlobalOpts` (config path override,
//! tenant and principal selection) and builds the engine from a loaded
//! `Config`.

use std::path::PathBuf;
use std::sync::Arc;

use rbxwatch_api::{ApiClient, RateLimiter, RobloxApi};
use rbxwatch_core::{DiscordSink, LogSink, Monitor, NotificationSink, PrincipalId, TenantId};
use tracing::debug;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use rbxwatch_config::{Config, config_path, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Path given with `--config`, else the platform default.
pub fn active_config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = active_config_path(global);
    debug!(path = %path.display(), "loading config");
    Ok(rbxwatch_config::load_config_from(&path)?)
}

pub fn tenant(global: &GlobalOpts) -> Result<TenantId, CliError> {
    global.tenant.ok_or(CliError::NoTenant)
}

/// `--principal`, falling back to the configured owner.
pub fn principal(global: &GlobalOpts, cfg: &Config) -> Result<PrincipalId, CliError> {
    global
        .principal
        .or(cfg.access.owner_id)
        .ok_or(CliError::NoPrincipal)
}

/// Where notifications go.
pub enum SinkMode {
    /// Discord; fail if no token is configured.
    Discord,
    /// Discord when a token is configured, otherwise the log.
    PreferDiscord,
    /// Log only.
    DryRun,
}

pub fn build_sink(cfg: &Config, mode: &SinkMode) -> Result<Arc<dyn NotificationSink>, CliError> {
    let discord = match mode {
        SinkMode::DryRun => return Ok(Arc::new(LogSink)),
        SinkMode::Discord => cfg.discord_config()?,
        SinkMode::PreferDiscord => match cfg.discord_config() {
            Ok(discord) => discord,
            Err(rbxwatch_config::ConfigError::NoCredentials) => {
                debug!("no bot token configured, notifications go to the log");
                return Ok(Arc::new(LogSink));
            }
            Err(e) => return Err(e.into()),
        },
    };
    Ok(Arc::new(DiscordSink::new(discord)?))
}

/// Wire the API client, rate limiter and sink into a `Monitor`.
pub fn build_monitor(cfg: &Config, sink: Arc<dyn NotificationSink>) -> Result<Monitor, CliError> {
    let limiter = Arc::new(RateLimiter::new(cfg.rate_limits()));
    let client = ApiClient::new(&cfg.transport(), limiter, cfg.retry_policy())?;
    let api = RobloxApi::new(Arc::new(client), cfg.api_settings()?);
    Ok(Monitor::new(cfg.monitor_config(), api, sink)?)
}
