//! Notification channel handlers.

use rbxwatch_core::{Monitor, TrackingCommand};

use crate::cli::{ChannelArgs, ChannelCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    monitor: &Monitor,
    cfg: &Config,
    args: ChannelArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let tenant = config::tenant(global)?;

    match args.command {
        ChannelCommand::Set { channel } => {
            let principal = config::principal(global, cfg)?;
            let outcome = monitor
                .execute(
                    principal,
                    TrackingCommand::SetDestination {
                        tenant,
                        destination: channel,
                    },
                )
                .await?;
            util::report_outcome(&outcome, &format!("channel {channel}"), global)
        }

        ChannelCommand::Show => {
            let destination = monitor.tenant(tenant).await.and_then(|t| t.destination());
            let out = output::render_single(
                &global.output,
                &destination,
                |d| d.map_or_else(|| "No channel set".into(), |c| format!("Channel: {c}")),
                |d| d.map(|c| c.to_string()).unwrap_or_default(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
