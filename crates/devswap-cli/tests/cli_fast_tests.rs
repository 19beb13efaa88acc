//! Fast CLI tests using assert_cmd.
//! These test the binary directly without needing a container runtime.

#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but works fine

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

/// The binary with HOME and XDG dirs pointing into `home`
fn devswap(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("devswap").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    devswap(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("development container"))
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("--remote"))
        .stdout(predicate::str::contains("--branch"));
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    devswap(home.path()).arg("--version").assert().success();
}

#[test]
fn test_missing_name_fails() {
    let home = tempfile::tempdir().unwrap();
    devswap(home.path())
        .args(["--source", "/tmp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--name"));
}

#[test]
fn test_unknown_flag_fails() {
    let home = tempfile::tempdir().unwrap();
    devswap(home.path())
        .args(["--name", "api", "--bogus"])
        .assert()
        .failure();
}

#[test]
fn test_show_config_prints_defaults() {
    let home = tempfile::tempdir().unwrap();
    devswap(home.path())
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("not created yet"))
        .stdout(predicate::str::contains("docker-dev-golang:latest"))
        .stdout(predicate::str::contains("target = \"/app\""))
        .stdout(predicate::str::contains("branch = \"master\""));
}

#[cfg(target_os = "linux")]
#[test]
fn test_unreachable_runtime_exits_nonzero() {
    let home = tempfile::tempdir().unwrap();
    let config_dir = home.path().join(".config").join("devswap");
    std::fs::create_dir_all(&config_dir).unwrap();
    let socket = home.path().join("missing.sock");
    std::fs::write(
        config_dir.join("config.toml"),
        format!(
            "[defaults]\nprovider = \"docker\"\n\n[providers.docker]\nsocket = \"{}\"\n",
            socket.display()
        ),
    )
    .unwrap();

    devswap(home.path())
        .args(["--name", "api", "--source", "/tmp"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: "))
        .stderr(predicate::str::contains("Cannot connect to Docker"))
        .stderr(predicate::str::contains("missing.sock"));
}
