//! Command dispatch: load config, build the engine, route to handlers.

pub mod backup;
pub mod channel;
pub mod config_cmd;
pub mod group;
pub mod run;
pub mod track;
mod util;

use crate::cli::{ChannelArgs, ChannelCommand, Command, GlobalOpts};
use crate::config::{self, SinkMode};
use crate::error::CliError;

/// Dispatch an engine-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;

    // Only the daemon and channel verification need to reach Discord.
    let mode = match &cmd {
        Command::Run(args) if args.dry_run => SinkMode::DryRun,
        Command::Run(_)
        | Command::Channel(ChannelArgs {
            command: ChannelCommand::Set { .. },
        }) => SinkMode::Discord,
        _ => SinkMode::PreferDiscord,
    };
    let sink = config::build_sink(&cfg, &mode)?;
    let monitor = config::build_monitor(&cfg, sink)?;

    match cmd {
        Command::Run(args) => run::handle(&monitor, &args, global).await,
        Command::Track { user, name } => track::track(&monitor, &cfg, &user, name, global).await,
        Command::Untrack { user } => track::untrack(&monitor, &cfg, &user, global).await,
        Command::View { user } => track::view(&monitor, &user, global).await,
        Command::List => track::list(&monitor, global).await,
        Command::Group(args) => group::handle(&monitor, &cfg, args, global).await,
        Command::Channel(args) => channel::handle(&monitor, &cfg, args, global).await,
        Command::Backup(args) => backup::handle(&monitor, &args, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
