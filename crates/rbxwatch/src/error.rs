//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use rbxwatch_config::ConfigError;
use rbxwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Upstream ─────────────────────────────────────────────────────
    #[error("Roblox API error: {message}")]
    #[diagnostic(
        code(rbxwatch::api_error),
        help("Roblox may be rate limiting or unavailable. Try again shortly, or run with -v.")
    )]
    Api { message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(rbxwatch::timeout),
        help("Raise the per-call timeouts in the [requests] config section.")
    )]
    Timeout { seconds: u64 },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(rbxwatch::not_found))]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("Could not deliver to Discord: {message}")]
    #[diagnostic(
        code(rbxwatch::notification),
        help("Check the bot token and that the bot can post in the channel.")
    )]
    Notification { message: String },

    // ── Command gate ─────────────────────────────────────────────────
    #[error("Principal {principal} may not change tracking")]
    #[diagnostic(
        code(rbxwatch::permission_denied),
        help("Add the principal to [access] authorized, or run as the owner.")
    )]
    PermissionDenied { principal: u64 },

    #[error("Too many commands; try again in {retry_after_secs}s")]
    #[diagnostic(code(rbxwatch::rate_limited))]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(rbxwatch::validation))]
    Validation { field: String, reason: String },

    #[error("No tenant selected")]
    #[diagnostic(
        code(rbxwatch::no_tenant),
        help("Pass --tenant <GUILD_ID> or set RBXWATCH_TENANT.")
    )]
    NoTenant,

    #[error("No principal to act as")]
    #[diagnostic(
        code(rbxwatch::no_principal),
        help("Pass --principal <USER_ID>, or set [access] owner_id in the config file.")
    )]
    NoPrincipal,

    // ── Configuration ────────────────────────────────────────────────
    #[error("No Discord bot token configured")]
    #[diagnostic(
        code(rbxwatch::no_credentials),
        help(
            "Store one with: rbxwatch config set-token <TOKEN>\n\
             Or set DISCORD_BOT_TOKEN, or use --dry-run."
        )
    )]
    NoCredentials,

    #[error("Configuration error: {message}")]
    #[diagnostic(code(rbxwatch::config), help("Config file: {path}"))]
    Config { message: String, path: String },

    #[error("Storage error: {message}")]
    #[diagnostic(
        code(rbxwatch::storage),
        help("Check that [storage] data_dir exists and is writable.")
    )]
    Storage { message: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(rbxwatch::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(rbxwatch::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(rbxwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    #[diagnostic(code(rbxwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Api { .. } | Self::Notification { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::PermissionDenied { .. } | Self::RateLimited { .. } => exit_code::PERMISSION,
            Self::NoCredentials => exit_code::AUTH,
            Self::Validation { .. }
            | Self::NoTenant
            | Self::NoPrincipal
            | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Api { message, status: _ } => CliError::Api { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::NotFound { entity_type, id } => CliError::NotFound {
                resource_type: entity_type.into(),
                identifier: id.to_string(),
            },
            CoreError::PermissionDenied { principal } => CliError::PermissionDenied { principal },
            CoreError::CommandRateLimited {
                principal: _,
                retry_after_secs,
            } => CliError::RateLimited { retry_after_secs },
            CoreError::Validation { field, reason } => CliError::Validation {
                field: field.into(),
                reason,
            },
            CoreError::UnknownTenant { tenant } => CliError::NotFound {
                resource_type: "tenant".into(),
                identifier: tenant.to_string(),
            },
            CoreError::Storage { message } => CliError::Storage { message },
            CoreError::Notification { message } => CliError::Notification { message },
            CoreError::Config { message } => CliError::Config {
                message,
                path: rbxwatch_config::config_path().display().to_string(),
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials => CliError::NoCredentials,
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
                path: rbxwatch_config::config_path().display().to_string(),
            },
        }
    }
}

impl From<rbxwatch_api::Error> for CliError {
    fn from(err: rbxwatch_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<rbxwatch_core::SinkError> for CliError {
    fn from(err: rbxwatch_core::SinkError) -> Self {
        CoreError::from(err).into()
    }
}
