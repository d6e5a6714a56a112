//! Focused CLI argument parsing tests.
//!
//! Tests that verify command-line argument parsing works correctly without
//! requiring a running server or long timeouts.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_command_succeeds() {
    Command::cargo_bin("hyperkv").unwrap().arg("version").assert().success();
}

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hyperkv"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Redis-compatible"));
}

#[test]
fn no_command_shows_help() {
    Command::cargo_bin("hyperkv").unwrap().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn start_help_shows_description() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the HyperKV server"));
}

#[test]
fn start_help_mentions_data_dir_and_port() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("data-dir"))
        .stdout(predicate::str::contains("port"));
}

#[test]
fn start_help_mentions_eviction_policy() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("eviction-policy"));
}

#[test]
fn start_help_mentions_daemon_flag() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("daemon"));
}

#[test]
fn info_help_shows_description() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["info", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("INFO"));
}

#[test]
fn info_default_host_shown_in_help() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["info", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("127.0.0.1"));
}

#[test]
fn info_short_port_flag_exists() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["info", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-p"));
}

#[test]
fn invalid_port_rejected() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["info", "--port", "not-a-number"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn unrecognized_command_shows_error() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized"));
}

#[test]
fn daemon_flag_fails_at_runtime_not_at_parse_time() {
    let temp = tempfile::tempdir().unwrap();
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["start", "--daemon", "--data-dir", temp.path().to_str().unwrap(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("daemon"));
}

#[test]
fn start_requires_no_positional_args() {
    // `start` takes only flags; an unexpected positional is rejected.
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["start", "unexpected-positional"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn max_memory_accepts_suffixed_values_in_help() {
    Command::cargo_bin("hyperkv")
        .unwrap()
        .args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max-memory"));
}
