//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// Copy of the config with secrets masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    if cfg.discord.bot_token.is_some() {
        cfg.discord.bot_token = Some("****".into());
    }
    cfg
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::active_config_path(global);
    let color = output::should_color(&global.color);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&config::load(global)?);
            let as_toml = toml::to_string_pretty(&cfg).map_err(|e| CliError::Config {
                message: e.to_string(),
                path: path.display().to_string(),
            })?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |_| as_toml.clone(),
                |_| as_toml.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::save_config(&Config::default(), &path)?;
            output::status(
                &format!("Config written to {}", path.display()),
                true,
                color,
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::SetToken { token } => {
            let token = token.trim();
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "must not be empty".into(),
                });
            }
            rbxwatch_config::store_bot_token(token)?;
            output::status("Bot token stored in the system keyring", true, color, global.quiet);
            Ok(())
        }
    }
}
