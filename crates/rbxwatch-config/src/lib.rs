//! Configuration for rbxwatch.
//!
//! One TOML file layered under `RBXWATCH_` environment overrides, bot token
//! resolution (env var + keyring + plaintext), and translation to the
//! engine's `MonitorConfig` and the API client's settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rbxwatch_api::{
    ApiEndpoints, ApiSettings, CacheTtls, CallOptions, EndpointClass, FetchOptions, PagingConfig,
    RateLimits, RetryPolicy, TransportConfig,
};
use rbxwatch_core::{
    AccessConfig, BackupConfig, DiscordConfig, EscalationConfig, MonitorConfig, PollingConfig,
    StorageConfig, TenantLimits,
};

/// Keyring service and entry holding the Discord bot token.
pub const KEYRING_SERVICE: &str = "rbxwatch";
pub const KEYRING_TOKEN_ENTRY: &str = "bot-token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no Discord bot token configured (env var, keyring, or [discord] bot_token)")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageSection,
    pub polling: PollingSection,
    pub rate_limits: RateLimitSection,
    pub requests: RequestSection,
    pub cache: CacheSection,
    pub limits: LimitsSection,
    pub access: AccessSection,
    pub backup: BackupSection,
    pub discord: DiscordSection,
    pub logging: LoggingSection,
    pub endpoints: EndpointSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSection {
    pub data_dir: PathBuf,
    pub tenants_file: String,
    pub known_badges_file: String,
    pub last_presence_file: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        let defaults = StorageConfig::default();
        Self {
            data_dir: defaults.data_dir,
            tenants_file: defaults.tenants_file,
            known_badges_file: defaults.known_badges_file,
            last_presence_file: defaults.last_presence_file,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingSection {
    pub base_interval_secs: u64,
    pub group_interval_multiplier: u32,
    pub failure_threshold: u32,
    pub watchdog_interval_secs: u64,
    pub max_restarts: u32,
    pub restart_backoff_secs: u64,
    pub restart_backoff_cap_secs: u64,
    /// Log API statistics every N badge cycles; 0 disables.
    pub stats_log_every: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            base_interval_secs: 30,
            group_interval_multiplier: 3,
            failure_threshold: 5,
            watchdog_interval_secs: 60,
            max_restarts: 5,
            restart_backoff_secs: 30,
            restart_backoff_cap_secs: 300,
            stats_log_every: 10,
        }
    }
}

/// Calls per window for each endpoint class.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub window_secs: u64,
    pub badges: u32,
    pub presence: u32,
    pub users: u32,
    pub places: u32,
    pub groups: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            window_secs: 60,
            badges: 60,
            presence: 120,
            users: 600,
            places: 600,
            groups: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CallSection {
    pub retries: u32,
    pub timeout_secs: u64,
}

impl From<CallSection> for CallOptions {
    fn from(section: CallSection) -> Self {
        Self::new(section.retries, section.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestSection {
    pub badges: CallSection,
    pub presence: CallSection,
    pub lookups: CallSection,
    pub group_members: CallSection,
    /// Retry `n` waits `backoff_base_secs * 2^n` plus jitter.
    pub backoff_base_secs: f64,
    pub jitter_max_secs: f64,
    /// Wait after an upstream 429.
    pub rate_limit_pause_secs: u64,
    /// Ceiling for any single HTTP request.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for RequestSection {
    fn default() -> Self {
        Self {
            badges: CallSection {
                retries: 2,
                timeout_secs: 20,
            },
            presence: CallSection {
                retries: 3,
                timeout_secs: 15,
            },
            lookups: CallSection {
                retries: 2,
                timeout_secs: 10,
            },
            group_members: CallSection {
                retries: 2,
                timeout_secs: 15,
            },
            backoff_base_secs: 1.0,
            jitter_max_secs: 1.0,
            rate_limit_pause_secs: 60,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: None,
        }
    }
}

/// Cache lifetimes in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSection {
    pub user_info_mins: u64,
    pub avatar_mins: u64,
    pub badge_info_mins: u64,
    pub place_info_mins: u64,
    pub group_info_mins: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            user_info_mins: 10,
            avatar_mins: 30,
            badge_info_mins: 60,
            place_info_mins: 30,
            group_info_mins: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_tracked_entities: usize,
    pub max_tracked_groups: usize,
    pub max_group_import: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        let defaults = TenantLimits::default();
        Self {
            max_tracked_entities: defaults.max_tracked_entities,
            max_tracked_groups: defaults.max_tracked_groups,
            max_group_import: defaults.max_group_import,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessSection {
    /// Always authorized and never rate limited.
    pub owner_id: Option<u64>,
    /// Principals allowed to change tracking. Empty allows everyone.
    pub authorized: Vec<u64>,
    pub max_commands_per_minute: u32,
    pub block_secs: u64,
}

impl Default for AccessSection {
    fn default() -> Self {
        Self {
            owner_id: None,
            authorized: Vec::new(),
            max_commands_per_minute: 10,
            block_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupSection {
    pub enabled: bool,
    pub interval_hours: u64,
    pub max_backups: usize,
    pub on_critical: bool,
    /// Defaults to `<data_dir>/backups`.
    pub directory: Option<PathBuf>,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 6,
            max_backups: 10,
            on_critical: true,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscordSection {
    /// Bot token (plaintext; prefer the keyring or an env var).
    pub bot_token: Option<String>,
    /// Environment variable holding the bot token.
    pub bot_token_env: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
    /// Channel that receives critical alerts.
    pub escalation_channel: Option<u64>,
    pub escalation_cooldown_secs: u64,
}

impl Default for DiscordSection {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_token_env: Some("DISCORD_BOT_TOKEN".into()),
            api_base: "https://discord.com/api/v10".into(),
            timeout_secs: 15,
            escalation_channel: None,
            escalation_cooldown_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive used when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
    pub json: bool,
    /// Write a daily-rolling log file here in addition to stderr.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            directory: None,
        }
    }
}

/// Base URLs of the upstream services.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointSection {
    pub badges: String,
    pub presence: String,
    pub users: String,
    pub thumbnails: String,
    pub games: String,
    pub groups: String,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            badges: "https://badges.roblox.com".into(),
            presence: "https://presence.roblox.com".into(),
            users: "https://users.roblox.com".into(),
            thumbnails: "https://thumbnails.roblox.com".into(),
            games: "https://games.roblox.com".into(),
            groups: "https://groups.roblox.com".into(),
        }
    }
}

impl EndpointSection {
    /// Point every service at one base URL.
    pub fn single(base: &str) -> Self {
        Self {
            badges: base.into(),
            presence: base.into(),
            users: base.into(),
            thumbnails: base.into(),
            games: base.into(),
            groups: base.into(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "rbxwatch", "rbxwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("rbxwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from `path` (or the platform default) plus environment.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config_from(path),
        None => load_config_from(&config_path()),
    }
}

/// Defaults, then the TOML file at `path` if it exists, then `RBXWATCH_*`
/// variables with `__` separating nested keys.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RBXWATCH_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let polling = &self.polling;
        if polling.base_interval_secs == 0 {
            return Err(ConfigError::validation(
                "polling.base_interval_secs",
                "must be at least 1",
            ));
        }
        if polling.watchdog_interval_secs == 0 {
            return Err(ConfigError::validation(
                "polling.watchdog_interval_secs",
                "must be at least 1",
            ));
        }
        if polling.restart_backoff_cap_secs < polling.restart_backoff_secs {
            return Err(ConfigError::validation(
                "polling.restart_backoff_cap_secs",
                "must not be below restart_backoff_secs",
            ));
        }

        let rl = &self.rate_limits;
        if rl.window_secs == 0 {
            return Err(ConfigError::validation(
                "rate_limits.window_secs",
                "must be at least 1",
            ));
        }
        for (class, limit) in self.class_limits() {
            if limit == 0 {
                return Err(ConfigError::validation(
                    &format!("rate_limits.{class}"),
                    "must allow at least one call per window",
                ));
            }
        }

        let req = &self.requests;
        for (field, secs) in [
            ("requests.backoff_base_secs", req.backoff_base_secs),
            ("requests.jitter_max_secs", req.jitter_max_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::validation(field, "must be a non-negative number"));
            }
        }

        let limits = &self.limits;
        if limits.max_tracked_entities == 0 || limits.max_tracked_groups == 0 {
            return Err(ConfigError::validation(
                "limits",
                "tracking limits must be at least 1",
            ));
        }
        if limits.max_group_import == 0 {
            return Err(ConfigError::validation(
                "limits.max_group_import",
                "must be at least 1",
            ));
        }

        if self.access.max_commands_per_minute == 0 {
            return Err(ConfigError::validation(
                "access.max_commands_per_minute",
                "must be at least 1",
            ));
        }

        if self.backup.enabled {
            if self.backup.interval_hours == 0 {
                return Err(ConfigError::validation(
                    "backup.interval_hours",
                    "must be at least 1",
                ));
            }
            if self.backup.max_backups == 0 {
                return Err(ConfigError::validation(
                    "backup.max_backups",
                    "must keep at least one backup",
                ));
            }
        }

        for (field, name) in [
            ("storage.tenants_file", &self.storage.tenants_file),
            ("storage.known_badges_file", &self.storage.known_badges_file),
            ("storage.last_presence_file", &self.storage.last_presence_file),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::validation(field, "must be a plain file name"));
            }
        }

        self.endpoints()?;
        parse_url("discord.api_base", &self.discord.api_base)?;
        Ok(())
    }

    fn class_limits(&self) -> [(EndpointClass, u32); 5] {
        let rl = &self.rate_limits;
        [
            (EndpointClass::Badges, rl.badges),
            (EndpointClass::Presence, rl.presence),
            (EndpointClass::Users, rl.users),
            (EndpointClass::Places, rl.places),
            (EndpointClass::Groups, rl.groups),
        ]
    }
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::validation(field, format!("invalid URL: {raw}")))
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Engine settings.
    pub fn monitor_config(&self) -> MonitorConfig {
        let p = &self.polling;
        let a = &self.access;
        let b = &self.backup;
        MonitorConfig {
            storage: StorageConfig {
                data_dir: self.storage.data_dir.clone(),
                tenants_file: self.storage.tenants_file.clone(),
                known_badges_file: self.storage.known_badges_file.clone(),
                last_presence_file: self.storage.last_presence_file.clone(),
            },
            polling: PollingConfig {
                base_interval: Duration::from_secs(p.base_interval_secs),
                group_interval_multiplier: p.group_interval_multiplier,
                failure_threshold: p.failure_threshold,
                watchdog_interval: Duration::from_secs(p.watchdog_interval_secs),
                max_restarts: p.max_restarts,
                restart_backoff: Duration::from_secs(p.restart_backoff_secs),
                restart_backoff_cap: Duration::from_secs(p.restart_backoff_cap_secs),
                stats_log_every: p.stats_log_every,
            },
            limits: TenantLimits {
                max_tracked_entities: self.limits.max_tracked_entities,
                max_tracked_groups: self.limits.max_tracked_groups,
                max_group_import: self.limits.max_group_import,
            },
            access: AccessConfig {
                owner: a.owner_id,
                authorized: a.authorized.clone(),
                max_commands_per_minute: a.max_commands_per_minute,
                block_duration: Duration::from_secs(a.block_secs),
            },
            backup: BackupConfig {
                enabled: b.enabled,
                interval: Duration::from_secs(b.interval_hours.saturating_mul(3600)),
                max_backups: b.max_backups,
                on_critical: b.on_critical,
                directory: b.directory.clone(),
            },
            escalation: EscalationConfig {
                channel: self.discord.escalation_channel,
                cooldown: Duration::from_secs(self.discord.escalation_cooldown_secs),
            },
        }
    }

    pub fn endpoints(&self) -> Result<ApiEndpoints, ConfigError> {
        let e = &self.endpoints;
        Ok(ApiEndpoints {
            badges: parse_url("endpoints.badges", &e.badges)?,
            presence: parse_url("endpoints.presence", &e.presence)?,
            users: parse_url("endpoints.users", &e.users)?,
            thumbnails: parse_url("endpoints.thumbnails", &e.thumbnails)?,
            games: parse_url("endpoints.games", &e.games)?,
            groups: parse_url("endpoints.groups", &e.groups)?,
        })
    }

    /// Settings for the `RobloxApi` facade.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        let r = &self.requests;
        let c = &self.cache;
        let mins = |m: u64| Duration::from_secs(m.saturating_mul(60));
        Ok(ApiSettings {
            endpoints: self.endpoints()?,
            fetch: FetchOptions {
                badges: r.badges.into(),
                presence: r.presence.into(),
                lookups: r.lookups.into(),
                group_members: r.group_members.into(),
            },
            cache: CacheTtls {
                user_info: mins(c.user_info_mins),
                avatar: mins(c.avatar_mins),
                badge_info: mins(c.badge_info_mins),
                place_info: mins(c.place_info_mins),
                group_info: mins(c.group_info_mins),
            },
            paging: PagingConfig::default(),
        })
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            window: Duration::from_secs(self.rate_limits.window_secs),
            per_class: self.class_limits().into_iter().collect(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let r = &self.requests;
        RetryPolicy {
            backoff_base: Duration::from_secs_f64(r.backoff_base_secs.max(0.0)),
            jitter_max: Duration::from_secs_f64(r.jitter_max_secs.max(0.0)),
            rate_limit_pause: Duration::from_secs(r.rate_limit_pause_secs),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        let r = &self.requests;
        let mut transport = TransportConfig {
            timeout: Duration::from_secs(r.timeout_secs),
            connect_timeout: Duration::from_secs(r.connect_timeout_secs),
            ..TransportConfig::default()
        };
        if let Some(ref ua) = r.user_agent {
            transport.user_agent.clone_from(ua);
        }
        transport
    }

    /// Discord sink settings, resolving the bot token.
    pub fn discord_config(&self) -> Result<DiscordConfig, ConfigError> {
        let token = resolve_bot_token(&self.discord)?;
        let mut discord = DiscordConfig::new(token);
        discord.api_base.clone_from(&self.discord.api_base);
        discord.timeout = Duration::from_secs(self.discord.timeout_secs);
        Ok(discord)
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the bot token: env var, then keyring, then plaintext config.
pub fn resolve_bot_token(discord: &DiscordSection) -> Result<SecretString, ConfigError> {
    // 1. Configured env var
    if let Some(ref env_name) = discord.bot_token_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.trim().is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_ENTRY) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = discord.bot_token {
        if !token.is_empty() {
            return Ok(SecretString::from(token.clone()));
        }
    }

    Err(ConfigError::NoCredentials)
}

/// Store the bot token in the system keyring.
pub fn store_bot_token(token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_ENTRY)
        .and_then(|entry| entry.set_password(token))
        .map_err(|e| ConfigError::validation("keyring", e.to_string()))
}
