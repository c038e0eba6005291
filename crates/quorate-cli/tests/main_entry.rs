//! Integration tests for the `quorate` binary entry point.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

#[test]
fn help_lists_the_commands() {
    let mut command = cargo_bin_cmd!("quorate");
    command.arg("--help");
    command
        .assert()
        .success()
        .stdout(contains("status").and(contains("kill-node")).and(contains("listen")));
}

#[test]
fn missing_subcommand_exits_with_failure() {
    let mut command = cargo_bin_cmd!("quorate");
    command.assert().failure().stderr(contains("Usage: quorate"));
}

#[test]
fn unreachable_socket_is_reported() {
    let directory = tempfile::tempdir().expect("temporary directory");
    let socket = directory.path().join("missing.sock");
    let mut command = cargo_bin_cmd!("quorate");
    command
        .env("QUORATE_CLIENT_SOCKET", format!("unix://{}", socket.display()))
        .arg("status");
    command
        .assert()
        .failure()
        .stderr(contains("failed to connect to daemon"));
}
