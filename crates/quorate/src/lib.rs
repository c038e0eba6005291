//! Client library for the cluster membership daemon.
//!
//! A [`Session`] owns one connection to the daemon. Three kinds of traffic
//! share that connection: replies to this client's requests, application
//! data from other nodes, and out-of-band events. Requests are synchronous:
//! [`Session::call`] writes a request and dispatches until its reply arrives,
//! queueing any data or events that interleave with it. Those frames are
//! delivered, in arrival order, to the registered handlers by a later
//! [`Session::dispatch`].
//!
//! ```no_run
//! use quorate::{DispatchMode, Event, Session};
//! use quorate_config::SocketEndpoint;
//!
//! # fn main() -> Result<(), quorate::ClientError> {
//! let mut session = Session::connect(&SocketEndpoint::unix("/var/run/cman_client"))?;
//! session.start_notification(|event: Event| {
//!     tracing::info!(reason = %event.reason, "cluster event");
//! });
//! let quorate = session.is_quorate()?;
//! session.dispatch(DispatchMode::non_blocking().drain_all())?;
//! # let _ = quorate;
//! # Ok(())
//! # }
//! ```

mod call;
mod demux;
mod dispatch;
mod error;
mod handler;
mod ops;
mod protocol;
mod queue;
mod session;
pub mod transport;

#[cfg(test)]
mod tests;

pub use call::{Call, Reply};
pub use dispatch::DispatchMode;
pub use error::{ClientError, Fault, FramingError};
pub use handler::{DataHandler, DataMessage, Event, EventHandler, EventReason};
pub use ops::{
    BarrierFlags, ClusterInfo, MAX_BARRIER_NAME_LEN, MAX_NODES_PER_REPLY,
    MAX_QUORUM_DEVICE_NAME_LEN, NODE_RECORD_LEN, Node, Version,
};
pub use protocol::{
    Command, DATA_PREAMBLE_LEN, EVENT_PAYLOAD_LEN, Frame, FrameHeader, HEADER_LEN, MAX_FRAME_LEN,
    NodeId, PROTOCOL_TAG, REPLY_PREAMBLE_LEN,
};
pub use queue::{Category, PendingCounts};
pub use session::Session;
pub use transport::{Connection, Stream};
