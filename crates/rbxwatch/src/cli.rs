//! Clap derive structures for the `rbxwatch` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// rbxwatch -- Roblox badge, presence and group watcher
#[derive(Debug, Parser)]
#[command(
    name = "rbxwatch",
    version,
    about = "Watch Roblox users and groups and post changes to Discord",
    long_about = "Polls the Roblox web APIs for tracked users and groups.\n\n\
        New badges, users coming online, and group member count changes\n\
        are posted to each tenant's Discord channel.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "RBXWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Tenant (Discord guild id) to operate on
    #[arg(long, short = 't', env = "RBXWATCH_TENANT", global = true)]
    pub tenant: Option<u64>,

    /// Principal (Discord user id) issuing the command; defaults to the owner
    #[arg(long, env = "RBXWATCH_PRINCIPAL", global = true)]
    pub principal: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RBXWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the polling loops until interrupted
    Run(RunArgs),

    /// Start tracking a Roblox user
    Track {
        /// User id or username
        user: String,

        /// Name shown in notifications (defaults to the Roblox display name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Stop tracking a Roblox user
    Untrack {
        /// User id or username
        user: String,
    },

    /// Show a user's profile, badge count and latest badge
    View {
        /// User id or username
        user: String,
    },

    /// List the users tracked by the tenant
    #[command(alias = "ls")]
    List,

    /// Manage tracked groups
    #[command(alias = "g")]
    Group(GroupArgs),

    /// Manage the notification channel
    Channel(ChannelArgs),

    /// Create or list state backups
    Backup(BackupArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RUN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Run one badge, presence and group cycle, then exit
    #[arg(long)]
    pub once: bool,

    /// Log notifications instead of posting them to Discord
    #[arg(long)]
    pub dry_run: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  GROUPS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct GroupArgs {
    #[command(subcommand)]
    pub command: GroupCommand,
}

#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    /// Watch a group's member count
    Add {
        /// Group id
        group: u64,
    },

    /// Stop watching a group
    #[command(alias = "rm")]
    Remove {
        /// Group id
        group: u64,
    },

    /// List watched groups
    #[command(alias = "ls")]
    List,

    /// Track members of a group as users
    Import {
        /// Group id
        group: u64,

        /// Maximum members to examine
        #[arg(long, short = 'l', default_value = "100")]
        limit: usize,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CHANNEL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ChannelArgs {
    #[command(subcommand)]
    pub command: ChannelCommand,
}

#[derive(Debug, Subcommand)]
pub enum ChannelCommand {
    /// Send the tenant's notifications to a channel
    Set {
        /// Discord channel id
        channel: u64,
    },

    /// Show the tenant's notification channel
    Show,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  BACKUP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Copy the current state documents into a new backup
    Create,

    /// List existing backups, newest first
    #[command(alias = "ls")]
    List,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display current resolved configuration
    Show,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store the Discord bot token in the system keyring
    SetToken {
        /// Bot token
        token: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
