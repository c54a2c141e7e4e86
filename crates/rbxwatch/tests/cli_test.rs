//! Integration tests for the `rbxwatch` binary.
//!
//! These tests cover argument parsing, config handling, and the commands
//! that work from local state alone, without reaching Roblox or Discord.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the binary with env isolation.
///
/// The config file and data directory live under `dir`, and every
/// `RBXWATCH_*` / token variable is cleared so tests never touch the
/// user's real configuration.
fn rbxwatch_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("rbxwatch");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("RBXWATCH_CONFIG", dir.join("config.toml"))
        .env("RBXWATCH_STORAGE__DATA_DIR", dir.join("data"))
        .env("RBXWATCH_BACKUP__DIRECTORY", dir.join("backups"))
        .env_remove("RBXWATCH_TENANT")
        .env_remove("RBXWATCH_PRINCIPAL")
        .env_remove("RBXWATCH_OUTPUT")
        .env_remove("DISCORD_BOT_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = rbxwatch_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("track")
            .and(predicate::str::contains("group"))
            .and(predicate::str::contains("channel"))
            .and(predicate::str::contains("run")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rbxwatch"));
}

#[test]
fn test_completions_zsh() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let output = rbxwatch_cmd(dir.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("foobar"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_override() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(dir.path().join("config.toml").exists());

    rbxwatch_cmd(dir.path())
        .args(["config", "init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    rbxwatch_cmd(dir.path())
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_masks_token() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[discord]\nbot_token = \"super-secret\"\n",
    )
    .unwrap();

    rbxwatch_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****").and(predicate::str::contains("super-secret").not()));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[polling]\nbase_interval_secs = 0\n",
    )
    .unwrap();

    rbxwatch_cmd(dir.path())
        .args(["--tenant", "1", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("base_interval_secs"));
}

// ── Local-state commands ────────────────────────────────────────────

#[test]
fn test_list_requires_tenant() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No tenant"));
}

#[test]
fn test_list_empty_tenant_as_json() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["--tenant", "42", "-o", "json", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_track_requires_principal() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["--tenant", "42", "track", "156"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No principal"));
}

#[test]
fn test_untrack_unknown_user_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["--tenant", "42", "--principal", "7", "untrack", "156"])
        .assert()
        .success()
        .stderr(predicate::str::contains("was not tracked"));
}

#[test]
fn test_untrack_rejects_out_of_range_id() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["--tenant", "42", "--principal", "7", "untrack", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("entity"));
}

#[test]
fn test_channel_show_without_destination() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["--tenant", "42", "channel", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No channel set"));
}

#[test]
fn test_run_once_with_nothing_tracked() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["-o", "plain", "run", "--once", "--dry-run"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("badges\tok")
                .and(predicate::str::contains("presence\tok"))
                .and(predicate::str::contains("groups\tok")),
        );
}

#[test]
fn test_backup_create_with_no_state() {
    let dir = tempfile::tempdir().unwrap();
    rbxwatch_cmd(dir.path())
        .args(["backup", "create"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No state files"));
}
