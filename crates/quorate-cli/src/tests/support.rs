//! Harness types shared by the CLI unit and behavioural tests.
//!
//! [`FakeDaemon`] plays the daemon side of one TCP connection from a fixed
//! script, and [`StaticConfigLoader`] points the runtime at it without
//! touching the environment.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::ExitCode;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use quorate::{Command, Frame, FrameHeader, HEADER_LEN};
use quorate_config::{Config, SocketEndpoint};

use crate::config::ConfigLoader;
use crate::errors::AppError;
use crate::{IoStreams, run_with_loader};

/// Returns a fixed configuration.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// One step of the daemon script, in order.
#[derive(Debug, Clone)]
pub(super) enum DaemonAction {
    /// Reads one request frame and records it.
    Read,
    /// Reads one request and answers it with `status` and `body`.
    Reply { status: i32, body: Vec<u8> },
    /// Writes an unsolicited frame.
    Send(Frame),
}

impl DaemonAction {
    pub(super) const fn status(status: i32) -> Self {
        Self::Reply {
            status,
            body: Vec::new(),
        }
    }
}

/// Daemon thread serving exactly one client connection.
pub(super) struct FakeDaemon {
    endpoint: SocketEndpoint,
    handle: JoinHandle<Result<Vec<Frame>>>,
}

impl FakeDaemon {
    /// Listens on an ephemeral port and runs `actions` against the first
    /// client. The connection is closed once the script is done.
    pub(super) fn spawn(actions: Vec<DaemonAction>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake daemon")?;
        let port = listener.local_addr().context("local addr")?.port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().context("accept client")?;
            serve(stream, actions)
        });
        Ok(Self {
            endpoint: SocketEndpoint::tcp("127.0.0.1", port),
            handle,
        })
    }

    /// Configuration routing both sockets to this daemon.
    pub(super) fn config(&self) -> Config {
        Config {
            client_socket: self.endpoint.clone(),
            admin_socket: self.endpoint.clone(),
            ..Config::default()
        }
    }

    /// Waits for the script to finish and returns the requests it read.
    pub(super) fn join(self) -> Result<Vec<Frame>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("fake daemon thread panicked"))?
    }
}

fn serve(mut stream: TcpStream, actions: Vec<DaemonAction>) -> Result<Vec<Frame>> {
    let mut received = Vec::new();
    for action in actions {
        match action {
            DaemonAction::Read => received.push(read_request(&mut stream)?),
            DaemonAction::Reply { status, body } => {
                let request = read_request(&mut stream)?;
                let reply = Frame::reply(request.command(), status, &body)?;
                stream.write_all(reply.as_bytes()).context("write reply")?;
                received.push(request);
            }
            DaemonAction::Send(frame) => {
                stream.write_all(frame.as_bytes()).context("write frame")?;
            }
        }
    }
    Ok(received)
}

fn read_request(stream: &mut TcpStream) -> Result<Frame> {
    let mut raw = [0_u8; HEADER_LEN];
    stream.read_exact(&mut raw).context("read request header")?;
    let header = FrameHeader::decode(&raw).context("decode request header")?;
    let mut payload = vec![0_u8; header.payload_len()];
    stream
        .read_exact(&mut payload)
        .context("read request payload")?;
    Ok(Frame::new(header.command, header.flags, &payload)?)
}

/// Encodes a version reply body.
#[expect(
    clippy::little_endian_bytes,
    reason = "the daemon protocol is little-endian"
)]
pub(super) fn version_body(words: [u32; 4]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Commands of the recorded requests, in order.
pub(super) fn commands(requests: &[Frame]) -> Vec<Command> {
    requests.iter().map(Frame::command).collect()
}

/// Captured result of one CLI run.
#[derive(Debug)]
pub(super) struct CliRun {
    pub(super) exit: ExitCode,
    pub(super) stdout: String,
    pub(super) stderr: String,
}

/// Runs the CLI with `args` against a fixed configuration.
pub(super) fn run_cli(args: &[&str], config: Config) -> CliRun {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let arguments = std::iter::once("quorate")
        .chain(args.iter().copied())
        .map(OsString::from);
    let exit = {
        let mut io = IoStreams::new(&mut stdout, &mut stderr);
        run_with_loader(arguments, &mut io, &StaticConfigLoader::new(config))
    };
    CliRun {
        exit,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    }
}
