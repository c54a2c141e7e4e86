//! Group handlers.

use rbxwatch_core::{Monitor, RobloxId, TrackedGroup, TrackingCommand};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, GroupArgs, GroupCommand};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct WatchedGroup {
    id: RobloxId,
    #[serde(flatten)]
    group: TrackedGroup,
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Members")]
    members: String,
    #[tabled(rename = "Added")]
    added: String,
}

impl From<&WatchedGroup> for GroupRow {
    fn from(g: &WatchedGroup) -> Self {
        Self {
            id: g.id.to_string(),
            name: g.group.display_name.clone(),
            members: g.group.last_known_member_count.to_string(),
            added: util::format_time(g.group.added_at),
        }
    }
}

pub async fn handle(
    monitor: &Monitor,
    cfg: &Config,
    args: GroupArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let tenant = config::tenant(global)?;

    match args.command {
        GroupCommand::Add { group } => {
            let principal = config::principal(global, cfg)?;
            let info = monitor.group_info(group).await?;
            let subject = format!("{} ({group})", info.name);
            let outcome = monitor
                .execute(
                    principal,
                    TrackingCommand::AddGroup {
                        tenant,
                        group,
                        display_name: info.name,
                        member_count: info.member_count,
                    },
                )
                .await?;
            util::report_outcome(&outcome, &subject, global)
        }

        GroupCommand::Remove { group } => {
            let principal = config::principal(global, cfg)?;
            let outcome = monitor
                .execute(principal, TrackingCommand::RemoveGroup { tenant, group })
                .await?;
            util::report_outcome(&outcome, &format!("group {group}"), global)
        }

        GroupCommand::List => {
            let groups: Vec<WatchedGroup> = monitor
                .list_tracked_groups(tenant)
                .await
                .into_iter()
                .map(|(id, group)| WatchedGroup { id, group })
                .collect();
            let out = output::render_list(
                &global.output,
                &groups,
                |g| GroupRow::from(g),
                |g| g.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        GroupCommand::Import { group, limit } => {
            let principal = config::principal(global, cfg)?;
            let outcome = monitor
                .execute(
                    principal,
                    TrackingCommand::ImportGroupMembers {
                        tenant,
                        group,
                        limit,
                    },
                )
                .await?;
            util::report_outcome(&outcome, &format!("group {group}"), global)
        }
    }
}
