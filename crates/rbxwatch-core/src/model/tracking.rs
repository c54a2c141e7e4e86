use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;
use super::{ChannelId, PrincipalId, RobloxId};

/// A Roblox user tracked by one tenant. Keyed by user id in the tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntity {
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub added_by: Option<PrincipalId>,
    #[serde(default, deserialize_with = "lenient::opt_timestamp")]
    pub added_at: Option<DateTime<Utc>>,
    /// Group the entity was imported from, if any.
    #[serde(
        rename = "from_group",
        default,
        deserialize_with = "lenient::opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_group: Option<RobloxId>,
    #[serde(
        rename = "from_group_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_group_name: Option<String>,
}

impl TrackedEntity {
    pub fn new(display_name: impl Into<String>, added_by: PrincipalId) -> Self {
        Self {
            display_name: display_name.into(),
            added_by: Some(added_by),
            added_at: Some(Utc::now()),
            origin_group: None,
            origin_group_name: None,
        }
    }
}

/// A Roblox group whose member count a tenant watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedGroup {
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(rename = "member_count", default)]
    pub last_known_member_count: u64,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub added_by: Option<PrincipalId>,
    #[serde(default, deserialize_with = "lenient::opt_timestamp")]
    pub added_at: Option<DateTime<Utc>>,
}

impl TrackedGroup {
    pub fn new(display_name: impl Into<String>, member_count: u64, added_by: PrincipalId) -> Self {
        Self {
            display_name: display_name.into(),
            last_known_member_count: member_count,
            added_by: Some(added_by),
            added_at: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(
        rename = "notification_channel_id",
        default,
        deserialize_with = "lenient::opt_id"
    )]
    pub notification_destination: Option<ChannelId>,
}

/// One isolated tracking workspace (a Discord guild).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(rename = "tracked_users", default, deserialize_with = "lenient::id_map")]
    pub tracked_entities: BTreeMap<RobloxId, TrackedEntity>,
    #[serde(default, deserialize_with = "lenient::id_map")]
    pub tracked_groups: BTreeMap<RobloxId, TrackedGroup>,
    #[serde(default)]
    pub config: TenantConfig,
}

impl Tenant {
    pub fn destination(&self) -> Option<ChannelId> {
        self.config.notification_destination
    }

    pub fn tracks_entity(&self, id: RobloxId) -> bool {
        self.tracked_entities.contains_key(&id)
    }

    pub fn tracks_group(&self, id: RobloxId) -> bool {
        self.tracked_groups.contains_key(&id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_legacy_tenant_layout() {
        let tenant: Tenant = serde_json::from_value(json!({
            "tracked_users": {
                "156": {
                    "name": "builderman",
                    "added_by": 42,
                    "added_at": "2024-01-02T03:04:05.678901"
                },
                "261": {
                    "name": "shedletsky",
                    "added_by": "43",
                    "added_at": "2024-01-02T03:04:05Z",
                    "from_group": 7,
                    "from_group_name": "Builders",
                    "favourite_colour": "red"
                }
            },
            "tracked_groups": {
                "7": { "name": "Builders", "member_count": 120, "added_by": 42 }
            },
            "config": { "notification_channel_id": null }
        }))
        .unwrap();

        assert_eq!(tenant.tracked_entities.len(), 2);
        assert_eq!(tenant.tracked_entities[&156].added_by, Some(42));
        assert_eq!(tenant.tracked_entities[&261].added_by, Some(43));
        assert_eq!(tenant.tracked_entities[&261].origin_group, Some(7));
        assert!(tenant.tracked_entities[&156].added_at.is_some());
        assert_eq!(tenant.tracked_groups[&7].last_known_member_count, 120);
        assert_eq!(tenant.destination(), None);
    }

    #[test]
    fn missing_sections_default() {
        let tenant: Tenant = serde_json::from_value(json!({})).unwrap();
        assert!(tenant.tracked_entities.is_empty());
        assert!(tenant.tracked_groups.is_empty());
    }

    #[test]
    fn writes_field_names_the_bot_expects() {
        let mut tenant = Tenant::default();
        tenant
            .tracked_entities
            .insert(1, TrackedEntity::new("one", 9));
        tenant.config.notification_destination = Some(555);

        let value = serde_json::to_value(&tenant).unwrap();
        assert_eq!(value["tracked_users"]["1"]["name"], "one");
        assert_eq!(value["config"]["notification_channel_id"], 555);
        assert!(value["tracked_users"]["1"].get("from_group").is_none());
    }
}
