//! BDD step definitions for the CLI commands.
//!
//! Scenarios live in `tests/features/cli_commands.feature` and run the
//! runtime against a [`FakeDaemon`] on a loopback TCP port.

use std::cell::RefCell;
use std::process::ExitCode;

use quorate::Frame;
use quorate_config::Config;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use super::support::{CliRun, DaemonAction, FakeDaemon, run_cli, version_body};

#[derive(Default)]
struct CliWorld {
    daemon: Option<FakeDaemon>,
    config: Config,
    run: Option<CliRun>,
    requests: Option<Vec<Frame>>,
}

impl CliWorld {
    fn start_daemon(&mut self, actions: Vec<DaemonAction>) {
        let daemon = FakeDaemon::spawn(actions).expect("spawn fake daemon");
        self.config = daemon.config();
        self.daemon = Some(daemon);
    }

    fn run(&self) -> &CliRun {
        self.run.as_ref().expect("the CLI has run")
    }

    fn requests(&mut self) -> &[Frame] {
        if self.requests.is_none() {
            let daemon = self.daemon.take().expect("a daemon was started");
            self.requests = Some(daemon.join().expect("daemon script"));
        }
        self.requests.as_deref().unwrap_or_default()
    }
}

#[fixture]
fn world() -> RefCell<CliWorld> {
    RefCell::new(CliWorld::default())
}

#[given("a daemon reporting a quorate cluster of {nodes} nodes")]
fn given_quorate_cluster(world: &RefCell<CliWorld>, nodes: i32) {
    world.borrow_mut().start_daemon(vec![
        DaemonAction::status(1),
        DaemonAction::status(1),
        DaemonAction::status(nodes),
        DaemonAction::Reply {
            status: 0,
            body: version_body([6, 2, 0, 7]),
        },
    ]);
}

#[given("a daemon answering one request with status {status}")]
fn given_single_answer(world: &RefCell<CliWorld>, status: i32) {
    world
        .borrow_mut()
        .start_daemon(vec![DaemonAction::status(status)]);
}

#[when("the operator runs \"{command}\"")]
fn when_operator_runs(world: &RefCell<CliWorld>, command: String) {
    let args: Vec<&str> = command.split_whitespace().collect();
    let config = world.borrow().config.clone();
    world.borrow_mut().run = Some(run_cli(&args, config));
}

#[then("the command succeeds")]
fn then_succeeds(world: &RefCell<CliWorld>) {
    let world = world.borrow();
    let run = world.run();
    assert_eq!(run.exit, ExitCode::SUCCESS, "stderr: {}", run.stderr);
}

#[then("the command fails")]
fn then_fails(world: &RefCell<CliWorld>) {
    assert_eq!(world.borrow().run().exit, ExitCode::FAILURE);
}

#[then("the output reports {nodes} nodes with quorum")]
fn then_output_reports(world: &RefCell<CliWorld>, nodes: u64) {
    let world = world.borrow();
    let report: Value =
        serde_json::from_str(world.run().stdout.trim()).expect("status output is JSON");
    assert_eq!(report.get("node_count").and_then(Value::as_u64), Some(nodes));
    assert_eq!(report.get("quorate").and_then(Value::as_bool), Some(true));
}

#[then("stderr mentions \"{text}\"")]
fn then_stderr_mentions(world: &RefCell<CliWorld>, text: String) {
    let world = world.borrow();
    let stderr = &world.run().stderr;
    assert!(stderr.contains(&text), "stderr: {stderr}");
}

#[then("the daemon received \"{expected}\"")]
fn then_daemon_received(world: &RefCell<CliWorld>, expected: String) {
    let mut world = world.borrow_mut();
    let received: Vec<String> = world
        .requests()
        .iter()
        .map(|request| request.command().to_string())
        .collect();
    assert_eq!(received.join(","), expected);
}

#[scenario(
    path = "tests/features/cli_commands.feature",
    name = "Status summarises the cluster"
)]
fn status_summary(world: RefCell<CliWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/cli_commands.feature",
    name = "Killing a node sends one privileged request"
)]
fn kill_node(world: RefCell<CliWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/cli_commands.feature",
    name = "A rejected change reports the daemon error"
)]
fn rejected_change(world: RefCell<CliWorld>) {
    drop(world);
}
