// ── Domain model ──
//
// Persisted tracking configuration (tenants, tracked entities and groups),
// presence codes, and the change events produced by the detector.

mod event;
pub(crate) mod lenient;
mod presence;
mod tracking;

pub use event::{
    BadgeEarned, ChangeEvent, CriticalAlert, Delivery, GroupMemberCountChanged, PresenceChanged,
};
pub use presence::PresenceType;
pub(crate) use presence::code_from_upstream;
pub use tracking::{Tenant, TenantConfig, TrackedEntity, TrackedGroup};

pub use rbxwatch_api::models::RobloxId;

/// Tenant (Discord guild) identifier.
pub type TenantId = u64;
/// Principal (Discord user) issuing commands.
pub type PrincipalId = u64;
/// Notification destination (Discord channel) identifier.
pub type ChannelId = u64;
