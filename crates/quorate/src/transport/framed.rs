//! Whole-frame reads and writes over a [`Stream`].
//!
//! Frame boundaries come from the length field in each header, so nothing is
//! buffered between frames: the byte after one frame always starts the next
//! header.

use std::io;

use tracing::debug;

use super::{Stream, TRANSPORT_TARGET};
use crate::error::ClientError;
use crate::protocol::{Frame, FrameHeader, HEADER_LEN};

/// Header read off the wire together with its original bytes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReceivedHeader {
    raw: [u8; HEADER_LEN],
    header: FrameHeader,
}

#[derive(Debug)]
pub(crate) struct FramedTransport<S> {
    stream: S,
    // `None` until the stream mode has been set explicitly.
    nonblocking: Option<bool>,
}

impl<S: Stream> FramedTransport<S> {
    pub(crate) const fn new(stream: S) -> Self {
        Self {
            stream,
            nonblocking: None,
        }
    }

    pub(crate) const fn stream(&self) -> &S {
        &self.stream
    }

    /// Writes every byte of `frame`, retrying short writes and interruptions.
    pub(crate) fn send(&mut self, frame: &Frame) -> Result<(), ClientError> {
        self.set_nonblocking(false)?;
        let mut remaining = frame.as_bytes();
        while !remaining.is_empty() {
            match self.stream.write(remaining) {
                Ok(0) => return Err(ClientError::PeerUnreachable),
                Ok(written) => remaining = remaining.get(written..).unwrap_or_default(),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(ClientError::from_io(error)),
            }
        }
        self.stream.flush().map_err(ClientError::from_io)?;
        debug!(
            target: TRANSPORT_TARGET,
            command = %frame.command(),
            length = frame.wire_len(),
            "frame sent"
        );
        Ok(())
    }

    /// Reads one fixed-size header.
    ///
    /// Without `blocking` the first read never suspends and `Ok(None)` means
    /// no frame has started to arrive. Once any header byte is in, the rest
    /// of the header is read in blocking mode.
    pub(crate) fn receive_header(
        &mut self,
        blocking: bool,
    ) -> Result<Option<ReceivedHeader>, ClientError> {
        let mut raw = [0_u8; HEADER_LEN];
        let mut filled = 0;
        if !blocking {
            self.set_nonblocking(true)?;
            loop {
                match self.stream.read(&mut raw) {
                    Ok(0) => return Err(ClientError::PeerUnreachable),
                    Ok(read) => {
                        filled = read;
                        break;
                    }
                    Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                    Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                    Err(error) => return Err(ClientError::from_io(error)),
                }
            }
        }
        self.set_nonblocking(false)?;
        self.fill(&mut raw, filled)?;
        let header = FrameHeader::decode(&raw)?;
        Ok(Some(ReceivedHeader { raw, header }))
    }

    /// Reads the payload announced by `received` and returns the whole frame.
    pub(crate) fn receive_rest(&mut self, received: ReceivedHeader) -> Result<Frame, ClientError> {
        let mut bytes = vec![0_u8; HEADER_LEN + received.header.payload_len()];
        let (head, body) = bytes.split_at_mut(HEADER_LEN);
        head.copy_from_slice(&received.raw);
        self.fill(body, 0)?;
        debug!(
            target: TRANSPORT_TARGET,
            command = %received.header.command,
            length = received.header.length,
            "frame received"
        );
        Ok(Frame::from_wire(received.header, bytes))
    }

    /// Reads one complete frame, or `Ok(None)` when a non-blocking read finds
    /// nothing waiting.
    pub(crate) fn receive(&mut self, blocking: bool) -> Result<Option<Frame>, ClientError> {
        let Some(received) = self.receive_header(blocking)? else {
            return Ok(None);
        };
        self.receive_rest(received).map(Some)
    }

    fn fill(&mut self, buffer: &mut [u8], mut filled: usize) -> Result<(), ClientError> {
        while let Some(rest) = buffer.get_mut(filled..).filter(|rest| !rest.is_empty()) {
            match self.stream.read(rest) {
                Ok(0) => return Err(ClientError::PeerUnreachable),
                Ok(read) => filled += read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(ClientError::from_io(error)),
            }
        }
        Ok(())
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), ClientError> {
        if self.nonblocking != Some(nonblocking) {
            self.stream
                .set_nonblocking(nonblocking)
                .map_err(ClientError::Io)?;
            self.nonblocking = Some(nonblocking);
        }
        Ok(())
    }
}
