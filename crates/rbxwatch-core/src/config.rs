// ── Runtime engine configuration ──
//
// Everything the monitor needs to run, already resolved into concrete
// values. The CLI builds a `MonitorConfig` from `rbxwatch-config` and hands
// it in; core never reads config files itself.

use std::path::PathBuf;
use std::time::Duration;

use crate::model::{ChannelId, PrincipalId};

#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    pub storage: StorageConfig,
    pub polling: PollingConfig,
    pub limits: TenantLimits,
    pub access: AccessConfig,
    pub backup: BackupConfig,
    pub escalation: EscalationConfig,
}

/// Where the three state documents live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub tenants_file: String,
    pub known_badges_file: String,
    pub last_presence_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tenants_file: "guild_data.json".into(),
            known_badges_file: "known_badges.json".into(),
            last_presence_file: "last_presence.json".into(),
        }
    }
}

/// Loop cadence and supervision.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub base_interval: Duration,
    /// Group polling runs every `base_interval * group_interval_multiplier`.
    pub group_interval_multiplier: u32,
    /// Consecutive failed cycles before a loop backs off for one 2x interval.
    pub failure_threshold: u32,
    pub watchdog_interval: Duration,
    pub max_restarts: u32,
    pub restart_backoff: Duration,
    pub restart_backoff_cap: Duration,
    /// Log API statistics every N badge cycles (0 disables).
    pub stats_log_every: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(30),
            group_interval_multiplier: 3,
            failure_threshold: 5,
            watchdog_interval: Duration::from_secs(60),
            max_restarts: 5,
            restart_backoff: Duration::from_secs(30),
            restart_backoff_cap: Duration::from_secs(300),
            stats_log_every: 10,
        }
    }
}

impl PollingConfig {
    pub fn group_interval(&self) -> Duration {
        self.base_interval
            .saturating_mul(self.group_interval_multiplier.max(1))
    }

    /// Delay before restart number `restarts + 1`.
    pub fn restart_delay(&self, restarts: u32) -> Duration {
        self.restart_backoff
            .saturating_mul(2_u32.saturating_pow(restarts))
            .min(self.restart_backoff_cap)
    }
}

/// Per-tenant size limits.
#[derive(Debug, Clone)]
pub struct TenantLimits {
    pub max_tracked_entities: usize,
    pub max_tracked_groups: usize,
    pub max_group_import: usize,
}

impl Default for TenantLimits {
    fn default() -> Self {
        Self {
            max_tracked_entities: 100,
            max_tracked_groups: 25,
            max_group_import: 500,
        }
    }
}

/// Who may change tracking, and how often.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub owner: Option<PrincipalId>,
    /// Empty means every principal is authorized.
    pub authorized: Vec<PrincipalId>,
    pub max_commands_per_minute: u32,
    pub block_duration: Duration,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            owner: None,
            authorized: Vec::new(),
            max_commands_per_minute: 10,
            block_duration: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub max_backups: usize,
    /// Take a `critical` backup whenever something is escalated.
    pub on_critical: bool,
    /// Defaults to `<data_dir>/backups`.
    pub directory: Option<PathBuf>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(6 * 3600),
            max_backups: 10,
            on_critical: true,
            directory: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscalationConfig {
    /// Channel that receives critical alerts. `None` logs only.
    pub channel: Option<ChannelId>,
    pub cooldown: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            channel: None,
            cooldown: Duration::from_secs(300),
        }
    }
}
