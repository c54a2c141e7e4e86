// rbxwatch-core: change detection, persistence and supervised polling on top
// of rbxwatch-api.

pub mod backup;
pub mod command;
pub mod config;
pub mod detect;
pub mod error;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod state;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backup::BackupManager;
pub use command::{CommandGate, CommandOutcome, ImportSummary, TrackingCommand};
pub use config::{
    AccessConfig, BackupConfig, EscalationConfig, MonitorConfig, PollingConfig, StorageConfig,
    TenantLimits,
};
pub use error::CoreError;
pub use monitor::{CycleReport, EntityProfile, LoopKind, Monitor, TaskStatus, Watchdog};
pub use notify::{DiscordConfig, DiscordSink, Escalator, LogSink, NotificationSink, SinkError};
pub use state::MonitorState;
pub use store::StateStore;

pub use model::{
    BadgeEarned, ChangeEvent, ChannelId, CriticalAlert, Delivery, GroupMemberCountChanged,
    PresenceChanged, PresenceType, PrincipalId, RobloxId, Tenant, TenantConfig, TenantId,
    TrackedEntity, TrackedGroup,
};
