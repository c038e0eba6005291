//! Session lifecycle and handler registration.

use tracing::{debug, warn};

use quorate_config::{Config, SocketEndpoint};

#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};

use crate::error::{ClientError, Fault};
use crate::handler::{DataHandler, EventHandler, Handlers};
use crate::protocol::Frame;
use crate::queue::{CategoryQueues, PendingCounts};
use crate::transport::{self, Connection, FramedTransport, Stream};

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// A single connection to the cluster daemon.
///
/// The session owns the stream, the registered handlers, and the queues of
/// frames whose delivery has been deferred. It is driven from one thread:
/// nothing happens unless the caller invokes [`Session::dispatch`] or a call
/// method.
///
/// Dropping the session closes the connection and discards queued frames.
#[derive(Debug)]
pub struct Session<S: Stream = Connection> {
    pub(crate) transport: FramedTransport<S>,
    pub(crate) queues: CategoryQueues,
    pub(crate) handlers: Handlers,
    fault: Option<Fault>,
}

impl Session<Connection> {
    /// Connects to the daemon listening on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] or [`ClientError::Resolve`] when the
    /// endpoint cannot be reached.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, ClientError> {
        let connection = transport::connect(endpoint)?;
        debug!(target: SESSION_TARGET, %endpoint, "session opened");
        Ok(Self::from_stream(connection))
    }

    /// Connects to the configured client socket.
    ///
    /// # Errors
    ///
    /// See [`Session::connect`].
    pub fn open(config: &Config) -> Result<Self, ClientError> {
        Self::connect(config.client_socket())
    }

    /// Connects to the configured administrative socket, which accepts
    /// privileged commands.
    ///
    /// # Errors
    ///
    /// See [`Session::connect`].
    pub fn open_admin(config: &Config) -> Result<Self, ClientError> {
        Self::connect(config.admin_socket())
    }
}

impl<S: Stream> Session<S> {
    /// Wraps an already connected stream.
    #[must_use]
    pub fn from_stream(stream: S) -> Self {
        Self {
            transport: FramedTransport::new(stream),
            queues: CategoryQueues::default(),
            handlers: Handlers::default(),
            fault: None,
        }
    }

    /// Closes the connection and reports how many queued frames were
    /// discarded.
    #[must_use]
    pub fn close(mut self) -> PendingCounts {
        let discarded = self.queues.clear();
        debug!(
            target: SESSION_TARGET,
            discarded = discarded.total(),
            "session closed"
        );
        discarded
    }

    /// Number of frames waiting in each queue.
    #[must_use]
    pub fn pending(&self) -> PendingCounts {
        self.queues.counts()
    }

    /// Returns true when deferred frames are waiting for a dispatch.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.queues.is_empty()
    }

    /// Condition that stopped the session, if any.
    #[must_use]
    pub const fn fault(&self) -> Option<Fault> {
        self.fault
    }

    /// Underlying stream.
    #[must_use]
    pub const fn stream(&self) -> &S {
        self.transport.stream()
    }

    /// Installs the handler invoked for events, replacing any previous one.
    pub fn start_notification<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.event = Some(Box::new(handler));
    }

    /// Removes the event handler; later events are dropped.
    pub fn stop_notification(&mut self) {
        self.handlers.event = None;
    }

    pub(crate) fn set_data_handler<H>(&mut self, handler: H)
    where
        H: DataHandler + 'static,
    {
        self.handlers.data = Some(Box::new(handler));
    }

    /// Removes the data handler; later data frames are dropped.
    pub fn stop_receiving_data(&mut self) {
        self.handlers.data = None;
    }

    pub(crate) fn check_fault(&self) -> Result<(), ClientError> {
        self.fault.map_or(Ok(()), |fault| Err(fault.to_error()))
    }

    /// Records `error` as the session fault when it leaves the stream
    /// unusable, and hands it back.
    pub(crate) fn record_fault(&mut self, error: ClientError) -> ClientError {
        if let Some(fault) = Fault::from_error(&error) {
            warn!(target: SESSION_TARGET, %error, "session faulted");
            self.fault = Some(fault);
        }
        error
    }

    pub(crate) fn send_frame(&mut self, frame: &Frame) -> Result<(), ClientError> {
        self.check_fault()?;
        let sent = self.transport.send(frame);
        sent.map_err(|error| self.record_fault(error))
    }
}

#[cfg(unix)]
impl<S: Stream + AsRawFd> AsRawFd for Session<S> {
    fn as_raw_fd(&self) -> RawFd {
        self.transport.stream().as_raw_fd()
    }
}

#[cfg(unix)]
impl<S: Stream + AsRawFd> Session<S> {
    /// Descriptor to register with an external readiness poller before a
    /// non-blocking [`Session::dispatch`].
    #[must_use]
    pub fn raw_fd(&self) -> RawFd {
        self.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Event, EventReason};
    use crate::protocol::Command;
    use crate::tests::support::{ReadStep, ScriptedStream};
    use crate::DispatchMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn faulted_session_fails_without_io() {
        let (stream, tap) = ScriptedStream::builder().step(ReadStep::Eof).build();
        let mut session = Session::from_stream(stream);

        let first = session.dispatch(DispatchMode::blocking()).unwrap_err();
        assert!(first.is_peer_unreachable());
        assert_eq!(session.fault(), Some(Fault::PeerUnreachable));

        let calls_before = tap.io_calls();
        let mut buffer = [0_u8; 4];
        let second = session
            .call(Command::IS_ACTIVE, &[], &mut buffer)
            .unwrap_err();
        assert!(second.is_peer_unreachable());
        assert_eq!(tap.io_calls(), calls_before);
        assert!(tap.written().is_empty());
    }

    #[test]
    fn stopped_notification_drops_events() {
        let (stream, tap) = ScriptedStream::builder().build();
        let mut session = Session::from_stream(stream);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.start_notification(move |event: Event| sink.borrow_mut().push(event.reason));

        tap.push_frame(&Frame::event(EventReason::StateChange, 0));
        session.dispatch(DispatchMode::non_blocking()).unwrap();
        session.stop_notification();
        tap.push_frame(&Frame::event(EventReason::PortClosed, 3));
        session.dispatch(DispatchMode::non_blocking()).unwrap();

        assert_eq!(seen.borrow().as_slice(), &[EventReason::StateChange]);
    }

    #[test]
    fn close_reports_discarded_frames() {
        let (stream, _tap) = ScriptedStream::builder()
            .frame(&Frame::event(EventReason::StateChange, 0))
            .frame(&Frame::event(EventReason::PortOpened, 2))
            .build();
        let mut session = Session::from_stream(stream);
        assert!(!session.has_pending());

        session
            .dispatch(DispatchMode::non_blocking().suppress_event().drain_all())
            .unwrap();
        assert!(session.has_pending());
        assert_eq!(session.pending().event, 2);

        let discarded = session.close();
        assert_eq!(discarded.event, 2);
        assert_eq!(discarded.total(), 2);
    }
}
