//! User tracking handlers: `track`, `untrack`, `list`, `view`.

use std::fmt::Write as _;

use rbxwatch_core::{EntityProfile, Monitor, RobloxId, TrackedEntity, TrackingCommand};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct TrackedUser {
    id: RobloxId,
    #[serde(flatten)]
    entity: TrackedEntity,
}

#[derive(Tabled)]
struct TrackedUserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Added")]
    added: String,
    #[tabled(rename = "From Group")]
    origin: String,
}

impl From<&TrackedUser> for TrackedUserRow {
    fn from(u: &TrackedUser) -> Self {
        Self {
            id: u.id.to_string(),
            name: u.entity.display_name.clone(),
            added: util::format_time(u.entity.added_at),
            origin: u.entity.origin_group_name.clone().unwrap_or_default(),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn track(
    monitor: &Monitor,
    cfg: &Config,
    user: &str,
    name: Option<String>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let tenant = config::tenant(global)?;
    let principal = config::principal(global, cfg)?;
    let entity = util::resolve_user(monitor, user).await?;

    let display_name = match name {
        Some(name) => name,
        None => {
            let info = monitor.user_info(entity).await?;
            if info.display_name.is_empty() {
                info.name
            } else {
                info.display_name
            }
        }
    };
    let subject = format!("{display_name} ({entity})");

    let outcome = monitor
        .execute(
            principal,
            TrackingCommand::AddEntity {
                tenant,
                entity,
                display_name,
            },
        )
        .await?;
    util::report_outcome(&outcome, &subject, global)
}

pub async fn untrack(
    monitor: &Monitor,
    cfg: &Config,
    user: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let tenant = config::tenant(global)?;
    let principal = config::principal(global, cfg)?;
    let entity = util::resolve_user(monitor, user).await?;

    let outcome = monitor
        .execute(principal, TrackingCommand::RemoveEntity { tenant, entity })
        .await?;
    util::report_outcome(&outcome, &format!("user {entity}"), global)
}

pub async fn list(monitor: &Monitor, global: &GlobalOpts) -> Result<(), CliError> {
    let tenant = config::tenant(global)?;
    let users: Vec<TrackedUser> = monitor
        .list_tracked_entities(tenant)
        .await
        .into_iter()
        .map(|(id, entity)| TrackedUser { id, entity })
        .collect();

    let out = output::render_list(
        &global.output,
        &users,
        |u| TrackedUserRow::from(u),
        |u| u.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn view(monitor: &Monitor, user: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let entity = util::resolve_user(monitor, user).await?;
    let profile = monitor.inspect_entity(entity).await?;

    let out = output::render_single(&global.output, &profile, detail, |p| p.info.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn detail(p: &EntityProfile) -> String {
    let mut out = String::new();
    let info = &p.info;
    let _ = writeln!(out, "{} (@{})", info.display_name, info.name);
    let _ = writeln!(out, "  ID:       {}", info.id);
    if let Some(ref created) = info.created {
        let _ = writeln!(out, "  Created:  {created}");
    }
    if info.is_banned {
        let _ = writeln!(out, "  Banned:   yes");
    }
    let _ = writeln!(out, "  Badges:   {}", p.badge_count);
    if let Some(ref badge) = p.latest_badge {
        let name = badge
            .display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&badge.name);
        let _ = writeln!(out, "  Latest:   {name} ({})", badge.id);
    }
    if let Some(ref url) = p.avatar_url {
        let _ = writeln!(out, "  Avatar:   {url}");
    }
    let _ = write!(out, "  Profile:  https://www.roblox.com/users/{}/profile", info.id);
    out
}
