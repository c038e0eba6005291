//! Scripted daemon peer running on a thread at the far end of a socket pair.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};

use crate::Session;
use crate::protocol::{Frame, FrameHeader, HEADER_LEN};

/// One step performed by the fake daemon, in order.
#[derive(Debug, Clone)]
pub(crate) enum DaemonAction {
    /// Reads one frame from the client and records it.
    Read,
    /// Writes a frame to the client.
    Send(Frame),
}

/// Handle to the daemon thread. Joining returns the frames it read.
pub(crate) struct FakeDaemon {
    handle: JoinHandle<Result<Vec<Frame>>>,
}

impl FakeDaemon {
    /// Starts a daemon following `actions` and returns a session connected
    /// to it. The daemon closes its end once the script is done.
    pub(crate) fn spawn(actions: Vec<DaemonAction>) -> Result<(Session<UnixStream>, Self)> {
        let (client, mut server) = UnixStream::pair().context("create socket pair")?;
        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            for action in actions {
                match action {
                    DaemonAction::Read => received.push(read_frame(&mut server)?),
                    DaemonAction::Send(frame) => server
                        .write_all(frame.as_bytes())
                        .context("write frame to client")?,
                }
            }
            Ok(received)
        });
        Ok((Session::from_stream(client), Self { handle }))
    }

    /// Waits for the script to finish.
    pub(crate) fn join(self) -> Result<Vec<Frame>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("fake daemon thread panicked"))?
    }
}

fn read_frame(stream: &mut UnixStream) -> Result<Frame> {
    let mut raw = [0_u8; HEADER_LEN];
    stream.read_exact(&mut raw).context("read request header")?;
    let header = FrameHeader::decode(&raw).context("decode request header")?;
    let mut bytes = vec![0_u8; HEADER_LEN + header.payload_len()];
    let (head, body) = bytes.split_at_mut(HEADER_LEN);
    head.copy_from_slice(&raw);
    stream.read_exact(body).context("read request payload")?;
    Ok(Frame::from_wire(header, bytes))
}
