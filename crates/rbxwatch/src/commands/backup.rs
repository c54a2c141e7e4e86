//! Backup handlers.

use std::path::PathBuf;

use rbxwatch_core::Monitor;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{BackupArgs, BackupCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct BackupEntry {
    name: String,
    path: PathBuf,
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "Backup")]
    name: String,
    #[tabled(rename = "Path")]
    path: String,
}

pub fn handle(monitor: &Monitor, args: &BackupArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let backups = monitor.backups();
    let color = output::should_color(&global.color);

    match args.command {
        BackupCommand::Create => {
            match backups.create_backup("manual")? {
                Some(path) => output::status(
                    &format!("Backup written to {}", path.display()),
                    true,
                    color,
                    global.quiet,
                ),
                None => output::status("No state files to back up", false, color, global.quiet),
            }
            Ok(())
        }

        BackupCommand::List => {
            let entries: Vec<BackupEntry> = backups
                .list()
                .into_iter()
                .map(|path| BackupEntry {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &entries,
                |e| BackupRow {
                    name: e.name.clone(),
                    path: e.path.display().to_string(),
                },
                |e| e.path.display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
