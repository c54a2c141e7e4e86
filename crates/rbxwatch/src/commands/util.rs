//! Shared helpers for command handlers.

use chrono::{DateTime, Utc};
use rbxwatch_core::{CommandOutcome, Monitor, RobloxId};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Accept either a numeric user id or a username.
pub async fn resolve_user(monitor: &Monitor, user: &str) -> Result<RobloxId, CliError> {
    if let Ok(id) = user.parse::<RobloxId>() {
        return Ok(id);
    }
    monitor
        .resolve_username(user)
        .await?
        .ok_or_else(|| CliError::NotFound {
            resource_type: "user".into(),
            identifier: user.into(),
        })
}

pub fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// One-line summary of a command outcome, and whether it changed anything.
fn describe(outcome: &CommandOutcome, subject: &str) -> (String, bool) {
    match outcome {
        CommandOutcome::Added => (format!("Now tracking {subject}"), true),
        CommandOutcome::AlreadyTracked => (format!("{subject} is already tracked"), false),
        CommandOutcome::LimitExceeded { limit } => (
            format!("Cannot track {subject}: this tenant is at its limit of {limit}"),
            false,
        ),
        CommandOutcome::Removed => (format!("Stopped tracking {subject}"), true),
        CommandOutcome::NotFound => (format!("{subject} was not tracked"), false),
        CommandOutcome::Imported(summary) => (
            format!(
                "Imported from {}: {} added, {} already tracked, {} over the limit ({} examined)",
                summary.group_name,
                summary.added,
                summary.already_tracked,
                summary.skipped_limit,
                summary.examined
            ),
            summary.added > 0,
        ),
        CommandOutcome::DestinationSet => {
            (format!("Notifications will be posted to {subject}"), true)
        }
        CommandOutcome::DestinationDenied { reason } => {
            (format!("Cannot post to {subject}: {reason}"), false)
        }
    }
}

/// Print an outcome: a status line in table mode, the serialized outcome
/// otherwise.
pub fn report_outcome(
    outcome: &CommandOutcome,
    subject: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (message, changed) = describe(outcome, subject);
    if matches!(global.output, crate::cli::OutputFormat::Table) {
        let color = output::should_color(&global.color);
        output::status(&message, changed, color, global.quiet);
        return Ok(());
    }
    let out = output::render_single(
        &global.output,
        outcome,
        |_| message.clone(),
        |_| message.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rbxwatch_core::ImportSummary;

    use super::*;

    #[test]
    fn import_summary_is_described() {
        let outcome = CommandOutcome::Imported(ImportSummary {
            group_name: "Builders".into(),
            examined: 10,
            added: 7,
            already_tracked: 2,
            skipped_limit: 1,
        });
        let (message, changed) = describe(&outcome, "group 5");
        assert!(changed);
        assert!(message.contains("7 added"));
        assert!(message.contains("Builders"));
    }

    #[test]
    fn no_op_outcomes_are_not_changes() {
        assert!(!describe(&CommandOutcome::AlreadyTracked, "user 1").1);
        assert!(!describe(&CommandOutcome::NotFound, "user 1").1);
    }
}
