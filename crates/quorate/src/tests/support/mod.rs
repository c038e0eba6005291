//! Test support for exercising sessions without a daemon.
//!
//! [`ScriptedStream`] replays a scripted sequence of read outcomes and
//! records every byte written, so tests can drive short reads, interruptions,
//! would-block results, and disconnects deterministically. The paired
//! [`StreamTap`] stays with the test and inspects or extends the script
//! while a session owns the stream.

#[cfg(unix)]
mod fake_daemon;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::protocol::{Frame, FrameHeader, HEADER_LEN};
use crate::transport::Stream;

#[cfg(unix)]
pub(crate) use fake_daemon::{DaemonAction, FakeDaemon};

/// One scripted outcome of a read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadStep {
    /// Bytes handed out across as many reads as the buffers require.
    Bytes(Vec<u8>),
    /// The read is interrupted before transferring data.
    Interrupted,
    /// The read would block.
    WouldBlock,
    /// The peer closed the stream.
    Eof,
    /// The read fails with the given error kind.
    Error(io::ErrorKind),
}

#[derive(Debug)]
struct Shared {
    reads: VecDeque<ReadStep>,
    read_chunk: usize,
    write_chunk: usize,
    interrupted_writes: usize,
    write_zero: bool,
    written: Vec<u8>,
    nonblocking: bool,
    io_calls: usize,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            reads: VecDeque::new(),
            read_chunk: usize::MAX,
            write_chunk: usize::MAX,
            interrupted_writes: 0,
            write_zero: false,
            written: Vec::new(),
            nonblocking: false,
            io_calls: 0,
        }
    }
}

/// In-memory [`Stream`] replaying a read script.
///
/// Once the script is exhausted a non-blocking read reports would-block and a
/// blocking read reports end of stream.
#[derive(Debug)]
pub(crate) struct ScriptedStream {
    shared: Rc<RefCell<Shared>>,
}

impl ScriptedStream {
    pub(crate) fn builder() -> ScriptBuilder {
        ScriptBuilder::default()
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.shared.borrow_mut();
        shared.io_calls += 1;
        let Some(step) = shared.reads.pop_front() else {
            return if shared.nonblocking {
                Err(io::ErrorKind::WouldBlock.into())
            } else {
                Ok(0)
            };
        };
        match step {
            ReadStep::Bytes(mut bytes) => {
                let count = bytes.len().min(buf.len()).min(shared.read_chunk);
                let rest = bytes.split_off(count);
                buf.get_mut(..count)
                    .expect("count is bounded by buffer length")
                    .copy_from_slice(&bytes);
                if !rest.is_empty() {
                    shared.reads.push_front(ReadStep::Bytes(rest));
                }
                Ok(count)
            }
            ReadStep::Interrupted => Err(io::ErrorKind::Interrupted.into()),
            ReadStep::WouldBlock => Err(io::ErrorKind::WouldBlock.into()),
            ReadStep::Eof => Ok(0),
            ReadStep::Error(kind) => Err(kind.into()),
        }
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = self.shared.borrow_mut();
        shared.io_calls += 1;
        if shared.interrupted_writes > 0 {
            shared.interrupted_writes -= 1;
            return Err(io::ErrorKind::Interrupted.into());
        }
        if shared.write_zero {
            return Ok(0);
        }
        let count = buf.len().min(shared.write_chunk);
        shared
            .written
            .extend_from_slice(buf.get(..count).expect("count is bounded by buffer length"));
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Stream for ScriptedStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.shared.borrow_mut().nonblocking = nonblocking;
        Ok(())
    }
}

/// Builds a [`ScriptedStream`] together with its tap.
#[derive(Debug, Default)]
pub(crate) struct ScriptBuilder {
    shared: Shared,
}

impl ScriptBuilder {
    /// Caps every read at `size` bytes.
    pub(crate) fn read_chunk(mut self, size: usize) -> Self {
        self.shared.read_chunk = size;
        self
    }

    /// Caps every write at `size` bytes.
    pub(crate) fn write_chunk(mut self, size: usize) -> Self {
        self.shared.write_chunk = size;
        self
    }

    /// Interrupts the first `count` writes.
    pub(crate) fn interrupt_writes(mut self, count: usize) -> Self {
        self.shared.interrupted_writes = count;
        self
    }

    /// Makes every write report zero bytes.
    pub(crate) fn write_zero(mut self) -> Self {
        self.shared.write_zero = true;
        self
    }

    pub(crate) fn step(mut self, step: ReadStep) -> Self {
        self.shared.reads.push_back(step);
        self
    }

    /// Queues the wire bytes of `frame` for reading.
    pub(crate) fn frame(self, frame: &Frame) -> Self {
        self.step(ReadStep::Bytes(frame.as_bytes().to_vec()))
    }

    pub(crate) fn build(self) -> (ScriptedStream, StreamTap) {
        let shared = Rc::new(RefCell::new(self.shared));
        (
            ScriptedStream {
                shared: Rc::clone(&shared),
            },
            StreamTap { shared },
        )
    }
}

/// Test-side handle onto a [`ScriptedStream`].
#[derive(Debug, Clone)]
pub(crate) struct StreamTap {
    shared: Rc<RefCell<Shared>>,
}

impl StreamTap {
    pub(crate) fn written(&self) -> Vec<u8> {
        self.shared.borrow().written.clone()
    }

    /// Splits everything written so far into frames.
    pub(crate) fn written_frames(&self) -> Vec<Frame> {
        let written = self.written();
        let mut frames = Vec::new();
        let mut rest = written.as_slice();
        while rest.len() >= HEADER_LEN {
            let raw: [u8; HEADER_LEN] = rest
                .get(..HEADER_LEN)
                .and_then(|head| head.try_into().ok())
                .expect("header slice");
            let header = FrameHeader::decode(&raw).expect("written frame header");
            let (frame, tail) = rest.split_at(HEADER_LEN + header.payload_len());
            frames.push(Frame::from_wire(header, frame.to_vec()));
            rest = tail;
        }
        frames
    }

    pub(crate) fn is_nonblocking(&self) -> bool {
        self.shared.borrow().nonblocking
    }

    /// Number of read and write calls made on the stream.
    pub(crate) fn io_calls(&self) -> usize {
        self.shared.borrow().io_calls
    }

    pub(crate) fn push_step(&self, step: ReadStep) {
        self.shared.borrow_mut().reads.push_back(step);
    }

    pub(crate) fn push_frame(&self, frame: &Frame) {
        self.push_step(ReadStep::Bytes(frame.as_bytes().to_vec()));
    }

    /// Steps not yet consumed by the stream.
    pub(crate) fn unread_steps(&self) -> usize {
        self.shared.borrow().reads.len()
    }
}
