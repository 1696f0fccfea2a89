//! Integration tests for the CLI surface: help, version, global flags.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn clawdeploy() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("clawdeploy"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    clawdeploy()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_help_lists_every_command() {
    clawdeploy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("test-connection"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    clawdeploy()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("clawdeploy"));
}

#[test]
fn test_version_command_shows_version() {
    clawdeploy()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(concat!(
            "clawdeploy v",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let output = clawdeploy()
        .args(["version", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value =
        serde_json::from_slice(&output).expect("version --json emits JSON");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_quiet_version_prints_nothing() {
    clawdeploy()
        .args(["--quiet", "version"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_unknown_command_is_a_usage_error() {
    clawdeploy()
        .arg("frobnicate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_invalid_log_level_is_rejected() {
    clawdeploy()
        .args(["--log-level", "chatty", "version"])
        .assert()
        .code(2);
}

#[test]
fn test_deploy_requires_host_user_and_config() {
    clawdeploy()
        .arg("deploy")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--host"));
}

#[test]
fn test_no_color_accepts_any_conventional_value() {
    for value in ["1", "yes", "", "0", "false"] {
        Command::new(assert_cmd::cargo::cargo_bin!("clawdeploy"))
            .env("NO_COLOR", value)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("clawdeploy v"));
    }
}

#[test]
fn test_no_color_flag_needs_no_value() {
    clawdeploy()
        .args(["--no-color", "version"])
        .assert()
        .success();
}
