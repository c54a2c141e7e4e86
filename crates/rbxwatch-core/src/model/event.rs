use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ChannelId, PresenceType, RobloxId, TenantId};

/// A change worth telling a tenant about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    BadgeEarned(BadgeEarned),
    PresenceChanged(PresenceChanged),
    GroupMemberCountChanged(GroupMemberCountChanged),
    CriticalAlert(CriticalAlert),
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadgeEarned(_) => "badge_earned",
            Self::PresenceChanged(_) => "presence_changed",
            Self::GroupMemberCountChanged(_) => "group_member_count_changed",
            Self::CriticalAlert(_) => "critical_alert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeEarned {
    pub entity: RobloxId,
    /// Name the receiving tenant tracks the entity under.
    pub entity_name: String,
    pub badge_id: RobloxId,
    pub badge_name: Option<String>,
    pub badge_description: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceChanged {
    pub entity: RobloxId,
    pub entity_name: String,
    pub previous: u8,
    pub current: u8,
    pub place_id: Option<RobloxId>,
    pub place_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl PresenceChanged {
    pub fn presence(&self) -> PresenceType {
        PresenceType::from_code(self.current)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMemberCountChanged {
    pub group: RobloxId,
    pub group_name: String,
    pub old_count: u64,
    pub new_count: u64,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalAlert {
    pub title: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// An event addressed to one tenant's destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub tenant: TenantId,
    pub destination: ChannelId,
    pub event: ChangeEvent,
}
