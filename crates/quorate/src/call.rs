//! Synchronous request/reply correlation.
//!
//! A [`Call`] holds the session mutably for its whole lifetime, so at most
//! one request can wait for a reply at a time. While the call is armed every
//! data frame and event that arrives is queued, and is delivered in arrival
//! order by a later [`Session::dispatch`].

use tracing::debug;

use crate::dispatch::DispatchMode;
use crate::error::ClientError;
use crate::protocol::{Command, Frame};
use crate::queue::Category;
use crate::session::{SESSION_TARGET, Session};
use crate::transport::{Connection, Stream};

/// Answer to a request, as seen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reply {
    /// Request the reply answers.
    pub command: Command,
    /// Status word reported by the daemon. Negative values are error codes.
    pub status: i32,
    /// Length of the result body sent by the daemon.
    pub body_len: usize,
    /// Bytes copied into the caller's buffer.
    pub copied: usize,
}

impl Reply {
    /// Returns true when the body did not fit the reply buffer.
    ///
    /// Oversized bodies are truncated silently to the buffer capacity.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.copied < self.body_len
    }

    /// Converts the status word into a call result.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Application`] carrying the negated status when
    /// the daemon rejected the request.
    pub fn into_status(self) -> Result<u32, ClientError> {
        u32::try_from(self.status).map_err(|_| ClientError::Application {
            command: self.command,
            code: self.status.saturating_neg(),
        })
    }
}

/// Bookkeeping for the single outstanding request of a session.
#[derive(Debug)]
pub(crate) struct CallState<'buf> {
    command: Command,
    buffer: &'buf mut [u8],
    reply: Option<Reply>,
}

impl<'buf> CallState<'buf> {
    pub(crate) const fn new(command: Command, buffer: &'buf mut [u8]) -> Self {
        Self {
            command,
            buffer,
            reply: None,
        }
    }

    /// Returns true while the reply is still awaited.
    pub(crate) const fn is_armed(&self) -> bool {
        self.reply.is_none()
    }

    /// Copies as much of `body` as fits and disarms the call.
    pub(crate) fn complete(&mut self, status: i32, body: &[u8]) {
        let copied = body.len().min(self.buffer.len());
        if let (Some(target), Some(source)) = (self.buffer.get_mut(..copied), body.get(..copied)) {
            target.copy_from_slice(source);
        }
        self.reply = Some(Reply {
            command: self.command,
            status,
            body_len: body.len(),
            copied,
        });
    }

    pub(crate) const fn reply(&self) -> Option<Reply> {
        self.reply
    }
}

/// An issued request waiting for its reply.
///
/// Ending a call before its reply is consumed, through [`Call::finish`] or
/// by dropping it, disarms it and discards any reply already queued. A reply
/// arriving afterwards is treated as unmatched and dropped.
#[derive(Debug)]
pub struct Call<'s, 'buf, S: Stream = Connection> {
    session: &'s mut Session<S>,
    state: CallState<'buf>,
}

impl<S: Stream> Call<'_, '_, S> {
    /// Dispatches in `mode` with data and event delivery suppressed.
    ///
    /// Returns the reply once it has arrived. Polling in non-blocking mode
    /// lets callers enforce their own time budget.
    ///
    /// # Errors
    ///
    /// Propagates dispatch failures, which fault the session.
    pub fn poll(&mut self, mode: DispatchMode) -> Result<Option<Reply>, ClientError> {
        if let Some(reply) = self.state.reply() {
            return Ok(Some(reply));
        }
        let call_mode = mode.suppress_data().suppress_event();
        self.session.run_dispatch(call_mode, Some(&mut self.state))?;
        Ok(self.state.reply())
    }

    /// Blocks until the reply arrives.
    ///
    /// # Errors
    ///
    /// Propagates dispatch failures, which fault the session.
    pub fn wait(mut self) -> Result<Reply, ClientError> {
        loop {
            if let Some(reply) = self.poll(DispatchMode::blocking())? {
                return Ok(reply);
            }
        }
    }

    /// Returns true once the reply has been received.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !self.state.is_armed()
    }

    /// Ends the call, returning the reply if it arrived.
    #[must_use]
    pub fn finish(self) -> Option<Reply> {
        self.state.reply()
    }
}

impl<S: Stream> Drop for Call<'_, '_, S> {
    fn drop(&mut self) {
        if !self.state.is_armed() {
            return;
        }
        let discarded = self.session.queues.discard(Category::Reply);
        debug!(
            target: SESSION_TARGET,
            command = %self.state.command,
            discarded,
            "abandoning call before its reply arrived"
        );
    }
}

impl<S: Stream> Session<S> {
    /// Sends a request and arms a call for its reply.
    ///
    /// The reply body is copied into `buffer`, truncated to its length.
    ///
    /// # Errors
    ///
    /// Fails without I/O when the session is faulted or the payload does not
    /// fit a frame; otherwise propagates write failures.
    pub fn begin_call<'buf>(
        &mut self,
        command: Command,
        payload: &[u8],
        buffer: &'buf mut [u8],
    ) -> Result<Call<'_, 'buf, S>, ClientError> {
        self.check_fault()?;
        let frame = Frame::request(command, payload).map_err(|_| ClientError::InvalidArgument {
            argument: "payload",
            reason: "request does not fit in a single frame",
        })?;
        self.send_frame(&frame)?;
        Ok(Call {
            session: self,
            state: CallState::new(command, buffer),
        })
    }

    /// Sends a request and blocks until its reply arrives.
    ///
    /// Returns the non-negative status word. Data frames and events arriving
    /// meanwhile are queued for the next [`Session::dispatch`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Application`] when the daemon reports a
    /// negative status, and transport errors otherwise.
    pub fn call(
        &mut self,
        command: Command,
        payload: &[u8],
        buffer: &mut [u8],
    ) -> Result<u32, ClientError> {
        self.begin_call(command, payload, buffer)?
            .wait()?
            .into_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_is_not_truncated() {
        let mut buffer = [0_u8; 4];
        let mut state = CallState::new(Command::GET_VERSION, &mut buffer);
        state.complete(0, &[1, 2, 3, 4]);
        let reply = state.reply().unwrap();
        assert!(!reply.is_truncated());
        assert_eq!(buffer, [1, 2, 3, 4]);
    }

    #[test]
    fn oversized_body_is_truncated_to_capacity() {
        let mut buffer = [0_u8; 2];
        let mut state = CallState::new(Command::GET_VERSION, &mut buffer);
        state.complete(0, &[9, 8, 7]);
        let reply = state.reply().unwrap();
        assert!(reply.is_truncated());
        assert_eq!(reply.body_len, 3);
        assert_eq!(buffer, [9, 8]);
    }

    #[test]
    fn negative_status_is_an_application_error() {
        let reply = Reply {
            command: Command::KILL_NODE,
            status: -22,
            body_len: 0,
            copied: 0,
        };
        let error = reply.into_status().unwrap_err();
        assert_eq!(error.application_code(), Some(22));
    }

    #[test]
    fn non_negative_status_is_returned() {
        let reply = Reply {
            command: Command::GET_ALL_MEMBERS,
            status: 5,
            body_len: 0,
            copied: 0,
        };
        assert_eq!(reply.into_status().unwrap(), 5);
    }
}
