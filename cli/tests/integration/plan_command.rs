//! Integration tests for `clawdeploy plan`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const OPENROUTER_KEY: &str = "sk-or-v1-integration-secret";
const TELEGRAM_TOKEN: &str = "987654:telegram-integration";
const WALLET_PASSWORD: &str = "wallet-integration-pw";

fn clawdeploy() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("clawdeploy"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn deploy_config(extra: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("deploy.yaml");
    std::fs::write(
        &path,
        format!(
            "telegram_token: '{TELEGRAM_TOKEN}'\nopenrouter_key: {OPENROUTER_KEY}\nwallet_password: {WALLET_PASSWORD}\n{extra}"
        ),
    )
    .expect("write deploy config");
    (dir, path)
}

fn assert_no_secrets(text: &str) {
    for secret in [OPENROUTER_KEY, TELEGRAM_TOKEN, WALLET_PASSWORD] {
        assert!(!text.contains(secret), "leaked {secret}");
    }
}

#[test]
fn test_plan_lists_commands_without_secrets() {
    let (_dir, path) = deploy_config("");
    let output = clawdeploy()
        .args(["plan", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Provisioning plan (24 commands)"))
        .stdout(predicate::str::contains("docker compose up -d"))
        .get_output()
        .stdout
        .clone();
    assert_no_secrets(&String::from_utf8_lossy(&output));
}

#[test]
fn test_plan_full_masks_secrets_in_file_bodies() {
    let (_dir, path) = deploy_config("network: testnet\n");
    let output = clawdeploy()
        .args(["plan", "--full", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("NETWORK=testnet"))
        .stdout(predicate::str::contains("OPENROUTER_API_KEY=********"))
        .get_output()
        .stdout
        .clone();
    assert_no_secrets(&String::from_utf8_lossy(&output));
}

#[test]
fn test_plan_json_has_twenty_four_entries() {
    let (_dir, path) = deploy_config("autonomy_level: conservative\n");
    let output = clawdeploy()
        .args(["--json", "plan", "--full", "--config"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON");
    assert_eq!(value["total"], 24);
    let commands = value["commands"].as_array().expect("commands array");
    assert_eq!(commands.len(), 24);
    assert_eq!(commands[0]["index"], 0);
    assert!(
        commands[13]["command"]
            .as_str()
            .unwrap()
            .contains("\"autonomyLevel\": \"conservative\"")
    );
    assert_no_secrets(&String::from_utf8_lossy(&output));
}

#[test]
fn test_plan_rejects_missing_credentials() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("deploy.yaml");
    std::fs::write(&path, "openrouter_key: sk\nwallet_password: pw\ntelegram_token: ''\n")
        .expect("write");
    clawdeploy()
        .args(["plan", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("telegram_token"));
}

#[test]
fn test_plan_rejects_unknown_keys() {
    let (_dir, path) = deploy_config("gas_limit: 9\n");
    clawdeploy()
        .args(["plan", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse"));
}

#[test]
fn test_plan_missing_file_fails_json_with_error_object() {
    let output = clawdeploy()
        .args(["--json", "plan", "--config", "/nonexistent/deploy.yaml"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("error JSON");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "COMMAND_FAILED");
}
