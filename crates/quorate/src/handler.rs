//! Handler capabilities invoked synchronously from inside dispatch.

use std::fmt;

use crate::protocol::NodeId;

/// Why the daemon raised an out-of-band event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventReason {
    /// A remote node stopped listening on a port; the argument is the node id.
    PortClosed,
    /// Cluster membership or quorum changed.
    StateChange,
    /// A remote node started listening on a port; the argument is the node id.
    PortOpened,
    /// The daemon asks subsystems whether it may shut down.
    TryShutdown,
    /// The cluster configuration was updated; the argument is the new version.
    ConfigUpdate,
    /// Reason code unknown to this library.
    Other(i32),
}

impl EventReason {
    /// Decodes a wire reason code.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::PortClosed,
            1 => Self::StateChange,
            2 => Self::PortOpened,
            3 => Self::TryShutdown,
            4 => Self::ConfigUpdate,
            other => Self::Other(other),
        }
    }

    /// Wire reason code.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::PortClosed => 0,
            Self::StateChange => 1,
            Self::PortOpened => 2,
            Self::TryShutdown => 3,
            Self::ConfigUpdate => 4,
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for EventReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortClosed => formatter.write_str("port-closed"),
            Self::StateChange => formatter.write_str("state-change"),
            Self::PortOpened => formatter.write_str("port-opened"),
            Self::TryShutdown => formatter.write_str("try-shutdown"),
            Self::ConfigUpdate => formatter.write_str("config-update"),
            Self::Other(code) => write!(formatter, "reason-{code}"),
        }
    }
}

/// Out-of-band notification from the daemon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    /// Why the event was raised.
    pub reason: EventReason,
    /// Reason-specific argument.
    pub argument: i32,
}

/// Application data received from another node.
///
/// The payload borrows the frame being dispatched and is only valid for the
/// duration of the handler call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataMessage<'a> {
    /// Node that sent the data.
    pub source: NodeId,
    /// Logical port the data was addressed to.
    pub port: u8,
    /// Sender-supplied flag word.
    pub flags: u32,
    /// Application bytes.
    pub payload: &'a [u8],
}

/// Receives events while event delivery is not suppressed.
pub trait EventHandler {
    /// Handles one event.
    fn on_event(&mut self, event: Event);
}

impl<F> EventHandler for F
where
    F: FnMut(Event),
{
    fn on_event(&mut self, event: Event) {
        self(event);
    }
}

/// Receives data frames while data delivery is not suppressed.
pub trait DataHandler {
    /// Handles one data message.
    fn on_data(&mut self, message: DataMessage<'_>);
}

impl<F> DataHandler for F
where
    F: FnMut(DataMessage<'_>),
{
    fn on_data(&mut self, message: DataMessage<'_>) {
        self(message);
    }
}

/// Registered handlers owned by a session.
#[derive(Default)]
pub(crate) struct Handlers {
    pub(crate) event: Option<Box<dyn EventHandler>>,
    pub(crate) data: Option<Box<dyn DataHandler>>,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Handlers")
            .field("event", &self.event.is_some())
            .field("data", &self.data.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, EventReason::PortClosed)]
    #[case(1, EventReason::StateChange)]
    #[case(2, EventReason::PortOpened)]
    #[case(3, EventReason::TryShutdown)]
    #[case(4, EventReason::ConfigUpdate)]
    #[case(42, EventReason::Other(42))]
    fn reasons_decode_from_wire_codes(#[case] raw: i32, #[case] expected: EventReason) {
        let reason = EventReason::from_raw(raw);
        assert_eq!(reason, expected);
        assert_eq!(reason.raw(), raw);
    }

    #[test]
    fn closures_act_as_event_handlers() {
        let mut seen = Vec::new();
        {
            let mut handler = |event: Event| seen.push(event.argument);
            handler.on_event(Event {
                reason: EventReason::StateChange,
                argument: 5,
            });
        }
        assert_eq!(seen, vec![5]);
    }
}
