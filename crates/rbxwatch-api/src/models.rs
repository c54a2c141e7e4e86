// Wire types for the Roblox web APIs.
//
// Only the fields rbxwatch reads are modelled; everything else in the
// payloads is ignored. Optional fields default rather than fail so a
// slightly changed upstream shape degrades gracefully.

use serde::{Deserialize, Serialize};

/// Numeric Roblox id (users, badges, places, groups, roles).
pub type RobloxId = u64;

// ── Badges ──────────────────────────────────────────────────────────

/// A badge as returned in a user's badge listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: RobloxId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub awarding_universe: Option<AwardingUniverse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardingUniverse {
    pub id: RobloxId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub root_place_id: Option<RobloxId>,
}

/// Full badge details from the badge info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeInfo {
    pub id: RobloxId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub icon_image_id: Option<RobloxId>,
    #[serde(default)]
    pub awarding_universe: Option<AwardingUniverse>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
}

// ── Presence ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    pub user_id: RobloxId,
    /// 0 offline, 1 online, 2 in game, 3 in studio.
    #[serde(default)]
    pub user_presence_type: i64,
    #[serde(default)]
    pub place_id: Option<RobloxId>,
    #[serde(default)]
    pub last_location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresenceResponse {
    #[serde(default)]
    pub user_presences: Vec<UserPresence>,
}

// ── Users ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: RobloxId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub has_verified_badge: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Thumbnail {
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UsernameMatch {
    pub id: RobloxId,
}

// ── Places ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceInfo {
    pub place_id: RobloxId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub universe_id: Option<RobloxId>,
}

// ── Groups ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: RobloxId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRole {
    pub id: RobloxId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub member_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RolesResponse {
    #[serde(default)]
    pub roles: Vec<GroupRole>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoleMember {
    pub user_id: RobloxId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
}

/// A group member collected across role listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: RobloxId,
    pub username: String,
    pub display_name: String,
    pub role: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn badge_page_tolerates_missing_fields() {
        let page: CursorPage<Badge> = serde_json::from_value(json!({
            "previousPageCursor": null,
            "data": [{ "id": 7, "extra": true }]
        }))
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, 7);
        assert!(page.data[0].name.is_empty());
        assert!(page.next_page_cursor.is_none());
    }

    #[test]
    fn presence_defaults_to_offline() {
        let resp: PresenceResponse = serde_json::from_value(json!({
            "userPresences": [{ "userId": 1 }, { "userId": 2, "userPresenceType": 2, "placeId": 99 }]
        }))
        .unwrap();
        assert_eq!(resp.user_presences[0].user_presence_type, 0);
        assert_eq!(resp.user_presences[1].place_id, Some(99));
    }

    #[test]
    fn group_info_reads_member_count() {
        let info: GroupInfo = serde_json::from_value(json!({
            "id": 5, "name": "Builders", "memberCount": 1234, "owner": {}
        }))
        .unwrap();
        assert_eq!(info.member_count, 1234);
        assert_eq!(info.name, "Builders");
    }
}
