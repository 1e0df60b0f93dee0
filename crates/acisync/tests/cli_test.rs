//! Integration tests for the `acisync` binary.
//!
//! Argument parsing, config handling and error exit codes, all without a
//! live APIC or NetBox.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use pretty_assertions::assert_eq;

// ── Helpers ─────────────────────────────────────────────────────────

const ISOLATED_ENV: &[&str] = &[
    "ACISYNC_CONFIG",
    "ACISYNC_OUTPUT",
    "ACI_HOST",
    "ACI_USERNAME",
    "ACI_PASSWORD",
    "ACI_VERIFY_SSL",
    "ACI_TIMEOUT",
    "NETBOX_URL",
    "NETBOX_TOKEN",
    "NETBOX_VERIFY_SSL",
    "NETBOX_TIMEOUT",
    "SYNC_DRY_RUN",
    "SYNC_VERIFY_UPDATES",
    "SYNC_CONTINUE_ON_ERROR",
    "SYNC_ABORT_RUN_ON_FATAL",
    "SYNC_ON_PRELOAD_FAILURE",
    "RUST_LOG",
];

/// The binary with every acisync variable cleared and the platform config
/// directory pointed at a path that does not exist.
fn acisync() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("acisync");
    cmd.env("HOME", "/tmp/acisync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/acisync-cli-test-nonexistent");
    for var in ISOLATED_ENV {
        cmd.env_remove(var);
    }
    cmd
}

fn write_config(dir: &Path, body: &str) -> String {
    let path = dir.join("acisync.toml");
    std::fs::write(&path, body).unwrap();
    path.display().to_string()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_usage() {
    let output = acisync().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    acisync().arg("--help").assert().success().stdout(
        predicate::str::contains("NetBox")
            .and(predicate::str::contains("sync"))
            .and(predicate::str::contains("kinds"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn version_flag() {
    acisync()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("acisync"));
}

#[test]
fn completions_zsh() {
    acisync()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── kinds ───────────────────────────────────────────────────────────

#[test]
fn kinds_in_execution_order() {
    let output = acisync().arg("kinds").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    let fabric = text.find("fabric").unwrap();
    let tenants = text.find("tenants").unwrap();
    let software = text.find("software").unwrap();
    assert!(fabric < tenants && tenants < software, "{text}");
}

#[test]
fn kinds_as_json() {
    let output = acisync().args(["kinds", "-o", "json"]).output().unwrap();
    let kinds: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(kinds.first().map(String::as_str), Some("fabric"));
    assert!(kinds.contains(&"contracts".to_owned()));
}

// ── sync argument and config errors ─────────────────────────────────

#[test]
fn only_and_skip_are_exclusive() {
    acisync()
        .args(["sync", "--only", "vrfs", "--skip", "epgs"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn unknown_kind_is_a_usage_error() {
    acisync()
        .args(["sync", "--only", "routers"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("routers"));
}

#[test]
fn missing_apic_host_is_a_usage_error() {
    acisync()
        .arg("sync")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("apic.host"));
}

#[test]
fn explicit_config_must_exist() {
    acisync()
        .args(["sync", "--config", "/nonexistent/acisync.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn missing_password_is_an_auth_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[apic]\nhost = \"127.0.0.1:1\"\nusername = \"acisync-test-nobody\"\n\
         [netbox]\nurl = \"http://127.0.0.1:1\"\ntoken = \"t\"\n",
    );
    acisync()
        .args(["sync", "--config", &config])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("apic.password"));
}

#[test]
fn unreachable_apic_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[apic]\nhost = \"127.0.0.1:1\"\npassword = \"pw\"\ntimeout = 5\n\
         [netbox]\nurl = \"http://127.0.0.1:1\"\ntoken = \"t\"\n",
    );
    acisync()
        .args(["sync", "--config", &config])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("APIC"));
}

// ── config ──────────────────────────────────────────────────────────

#[test]
fn config_init_writes_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("config.toml");
    let path_arg = path.display().to_string();

    acisync()
        .args(["config", "init", "--config", &path_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(std::fs::read_to_string(&path).unwrap().contains("[netbox]"));

    acisync()
        .args(["config", "init", "--config", &path_arg])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    acisync()
        .args(["config", "init", "--force", "--config", &path_arg])
        .assert()
        .success();
}

#[test]
fn config_show_redacts_secrets_and_applies_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[apic]\nhost = \"apic1\"\npassword = \"hunter2\"\n",
    );
    acisync()
        .args(["config", "show", "--config", &config, "--netbox-url", "https://nb.lab"])
        .env("SYNC_DRY_RUN", "true")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("hunter2")
                .not()
                .and(predicate::str::contains("********"))
                .and(predicate::str::contains("https://nb.lab"))
                .and(predicate::str::contains("dry_run = true")),
        );
}

#[test]
fn config_path_echoes_explicit_file() {
    acisync()
        .args(["config", "path", "--config", "/etc/acisync/custom.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/etc/acisync/custom.toml"));
}
