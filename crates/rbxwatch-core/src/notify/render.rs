// Discord embed rendering for change events.

use chrono::Utc;
use serde_json::{Value, json};

use crate::model::{
    BadgeEarned, ChangeEvent, CriticalAlert, GroupMemberCountChanged, PresenceChanged,
};

const BADGE_COLOUR: u32 = 0x00_FF_00;
const GROWTH_COLOUR: u32 = 0x00_FF_00;
const SHRINK_COLOUR: u32 = 0xFF_00_00;
const CRITICAL_COLOUR: u32 = 0xE7_4C_3C;

/// Render an event as a single Discord embed object.
pub fn embed(event: &ChangeEvent) -> Value {
    match event {
        ChangeEvent::BadgeEarned(e) => badge_embed(e),
        ChangeEvent::PresenceChanged(e) => presence_embed(e),
        ChangeEvent::GroupMemberCountChanged(e) => group_embed(e),
        ChangeEvent::CriticalAlert(e) => critical_embed(e),
    }
}

/// Full message body: `{ "embeds": [ ... ] }`.
pub fn message(event: &ChangeEvent) -> Value {
    json!({ "embeds": [embed(event)] })
}

pub fn badge_url(badge_id: u64) -> String {
    format!("https://www.roblox.com/badges/{badge_id}")
}

fn field(name: &str, value: impl ToString, inline: bool) -> Value {
    json!({ "name": name, "value": value.to_string(), "inline": inline })
}

fn badge_embed(e: &BadgeEarned) -> Value {
    let badge = e
        .badge_name
        .clone()
        .unwrap_or_else(|| format!("Badge {}", e.badge_id));

    let mut embed = json!({
        "title": "New badge earned",
        "color": BADGE_COLOUR,
        "timestamp": Utc::now().to_rfc3339(),
        "fields": [
            field("Badge", badge, true),
            field("User", &e.entity_name, true),
            field("Link", format!("[View badge]({})", badge_url(e.badge_id)), true),
        ],
    });
    if let Some(desc) = e.badge_description.as_deref().filter(|d| !d.is_empty()) {
        embed["description"] = json!(desc);
    }
    if let Some(url) = &e.avatar_url {
        embed["thumbnail"] = json!({ "url": url });
    }
    embed
}

fn presence_embed(e: &PresenceChanged) -> Value {
    let presence = e.presence();
    let mut fields = vec![
        field("User", &e.entity_name, true),
        field("Status", presence, true),
    ];
    if let Some(place) = &e.place_name {
        fields.push(field("Game", place, true));
    }

    let mut embed = json!({
        "title": "Status changed",
        "color": presence.colour(),
        "timestamp": Utc::now().to_rfc3339(),
        "fields": fields,
    });
    if let Some(url) = &e.avatar_url {
        embed["thumbnail"] = json!({ "url": url });
    }
    embed
}

fn group_embed(e: &GroupMemberCountChanged) -> Value {
    let (colour, change) = if e.delta >= 0 {
        (GROWTH_COLOUR, format!("+{} members", e.delta))
    } else {
        (SHRINK_COLOUR, format!("{} members", e.delta))
    };

    json!({
        "title": "Group member count changed",
        "color": colour,
        "timestamp": Utc::now().to_rfc3339(),
        "fields": [
            field("Group", &e.group_name, true),
            field("ID", e.group, true),
            field("Change", change, true),
            field("Before", e.old_count, true),
            field("Now", e.new_count, true),
        ],
    })
}

fn critical_embed(e: &CriticalAlert) -> Value {
    json!({
        "title": format!("Critical: {}", e.title),
        "description": e.message,
        "color": CRITICAL_COLOUR,
        "timestamp": e.at.to_rfc3339(),
    })
}
