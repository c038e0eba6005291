//! Subcommand execution against a daemon session.
//!
//! Every command writes JSON to stdout: one document for queries and
//! administrative changes, one line per record for `listen`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write;
use std::net::SocketAddr;
use std::rc::Rc;

use quorate::{
    ClientError, DataMessage, DispatchMode, Event, Node, NodeId, Session, Stream, Version,
};
use quorate_config::Config;
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::CliCommand;
use crate::errors::AppError;

const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::command");

/// Membership summary printed by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct StatusReport {
    pub(crate) active: bool,
    pub(crate) quorate: bool,
    pub(crate) node_count: u32,
    pub(crate) version: VersionReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct VersionReport {
    pub(crate) major: u32,
    pub(crate) minor: u32,
    pub(crate) patch: u32,
    pub(crate) config: u32,
}

impl From<Version> for VersionReport {
    fn from(version: Version) -> Self {
        Self {
            major: version.major,
            minor: version.minor,
            patch: version.patch,
            config: version.config,
        }
    }
}

/// One line printed by `nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct NodeReport {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) member: bool,
    pub(crate) incarnation: u32,
    pub(crate) join_time: u64,
    pub(crate) address: Option<SocketAddr>,
}

impl From<Node> for NodeReport {
    fn from(node: Node) -> Self {
        Self {
            id: node.id.get(),
            name: node.name,
            member: node.member,
            incarnation: node.incarnation,
            join_time: node.join_time,
            address: node.address,
        }
    }
}

/// Confirmation printed after an administrative change.
#[derive(Debug, Serialize)]
struct Acknowledgement {
    command: &'static str,
    ok: bool,
}

/// One line printed by `listen`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ListenRecord {
    Event {
        reason: String,
        argument: i32,
    },
    Data {
        source: i32,
        port: u8,
        flags: u32,
        payload: Vec<u8>,
    },
}

impl From<Event> for ListenRecord {
    fn from(event: Event) -> Self {
        Self::Event {
            reason: event.reason.to_string(),
            argument: event.argument,
        }
    }
}

impl From<DataMessage<'_>> for ListenRecord {
    fn from(message: DataMessage<'_>) -> Self {
        Self::Data {
            source: message.source.get(),
            port: message.port,
            flags: message.flags,
            payload: message.payload.to_vec(),
        }
    }
}

/// Opens the socket `command` needs, runs it, and closes the session.
pub(crate) fn execute<W: Write>(
    command: &CliCommand,
    config: &Config,
    stdout: &mut W,
) -> Result<(), AppError> {
    let opened = if command.is_privileged() {
        Session::open_admin(config)
    } else {
        Session::open(config)
    };
    let mut session = opened.map_err(AppError::Connect)?;
    let result = run_command(command, &mut session, stdout);
    let discarded = session.close();
    if discarded.total() > 0 {
        debug!(
            target: COMMAND_TARGET,
            replies = discarded.reply,
            data = discarded.data,
            events = discarded.event,
            "discarded queued messages on close"
        );
    }
    result
}

fn run_command<S: Stream, W: Write>(
    command: &CliCommand,
    session: &mut Session<S>,
    stdout: &mut W,
) -> Result<(), AppError> {
    match *command {
        CliCommand::Status => {
            let report = status(session)?;
            write_json(stdout, &report)
        }
        CliCommand::Nodes { max } => {
            let limit = usize::try_from(max).unwrap_or(usize::MAX);
            let nodes = session.nodes(limit).map_err(failed("nodes"))?;
            nodes
                .into_iter()
                .map(NodeReport::from)
                .try_for_each(|node| write_json(&mut *stdout, &node))
        }
        CliCommand::KillNode { node } => {
            session
                .kill_node(NodeId::new(node))
                .map_err(failed("kill-node"))?;
            acknowledge(stdout, "kill-node")
        }
        CliCommand::SetVotes { votes, node } => {
            session
                .set_votes(votes, NodeId::new(node))
                .map_err(failed("set-votes"))?;
            acknowledge(stdout, "set-votes")
        }
        CliCommand::ExpectedVotes { votes } => {
            session
                .set_expected_votes(votes)
                .map_err(failed("expected-votes"))?;
            acknowledge(stdout, "expected-votes")
        }
        CliCommand::Leave { reason } => {
            session.leave_cluster(reason).map_err(failed("leave"))?;
            acknowledge(stdout, "leave")
        }
        CliCommand::Listen { port, count } => listen(session, port, count, stdout),
    }
}

fn failed(operation: &'static str) -> impl Fn(ClientError) -> AppError {
    move |source| AppError::operation(operation, source)
}

fn status<S: Stream>(session: &mut Session<S>) -> Result<StatusReport, AppError> {
    Ok(StatusReport {
        active: session.is_active().map_err(failed("is-active"))?,
        quorate: session.is_quorate().map_err(failed("is-quorate"))?,
        node_count: session.node_count().map_err(failed("node-count"))?,
        version: session.version().map_err(failed("version"))?.into(),
    })
}

fn acknowledge<W: Write>(stdout: &mut W, command: &'static str) -> Result<(), AppError> {
    write_json(stdout, &Acknowledgement { command, ok: true })
}

fn write_json<W: Write, T: Serialize>(stdout: &mut W, value: &T) -> Result<(), AppError> {
    serde_json::to_writer(&mut *stdout, value).map_err(AppError::Serialise)?;
    stdout.write_all(b"\n").map_err(AppError::WriteOutput)?;
    stdout.flush().map_err(AppError::WriteOutput)
}

type RecordQueue = Rc<RefCell<VecDeque<ListenRecord>>>;

/// Copies handler output to stdout between dispatches.
struct Listener<'w, W> {
    stdout: &'w mut W,
    records: RecordQueue,
    written: usize,
    limit: Option<usize>,
}

impl<W: Write> Listener<'_, W> {
    fn is_done(&self) -> bool {
        self.limit.is_some_and(|limit| self.written >= limit)
    }

    fn flush(&mut self) -> Result<(), AppError> {
        while !self.is_done() {
            let Some(record) = self.records.borrow_mut().pop_front() else {
                break;
            };
            write_json(&mut *self.stdout, &record)?;
            self.written += 1;
        }
        Ok(())
    }
}

fn listen<S: Stream, W: Write>(
    session: &mut Session<S>,
    port: Option<u8>,
    limit: Option<usize>,
    stdout: &mut W,
) -> Result<(), AppError> {
    let records = RecordQueue::default();
    let events = Rc::clone(&records);
    session.start_notification(move |event: Event| {
        events.borrow_mut().push_back(event.into());
    });
    if let Some(data_port) = port {
        let data = Rc::clone(&records);
        session
            .start_receiving_data(data_port, move |message: DataMessage<'_>| {
                data.borrow_mut().push_back(message.into());
            })
            .map_err(failed("bind"))?;
    }
    info!(target: COMMAND_TARGET, ?port, "listening for cluster traffic");

    let mut listener = Listener {
        stdout,
        records,
        written: 0,
        limit,
    };
    loop {
        listener.flush()?;
        if listener.is_done() {
            return Ok(());
        }
        match session.dispatch(DispatchMode::blocking()) {
            Ok(_) => {}
            Err(error) if error.is_peer_unreachable() => {
                listener.flush()?;
                debug!(
                    target: COMMAND_TARGET,
                    records = listener.written,
                    "daemon closed the connection"
                );
                return Ok(());
            }
            Err(error) => return Err(AppError::operation("dispatch", error)),
        }
    }
}
