//! Application data exchange between nodes.

use tracing::debug;

use crate::error::ClientError;
use crate::handler::DataHandler;
use crate::protocol::{Command, Frame, NodeId, encode_i32};
use crate::session::{SESSION_TARGET, Session};
use crate::transport::Stream;

impl<S: Stream> Session<S> {
    /// Sends `payload` to `port` on `node`, or on every node for
    /// [`NodeId::ALL`].
    ///
    /// Data sends are not acknowledged. Returns the number of bytes written,
    /// frame header included.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] when the payload does not fit
    /// in one frame, and propagates write failures.
    pub fn send_data(
        &mut self,
        payload: &[u8],
        port: u8,
        node: NodeId,
        flags: u32,
    ) -> Result<usize, ClientError> {
        let frame =
            Frame::data(node, port, flags, payload).map_err(|_| ClientError::InvalidArgument {
                argument: "payload",
                reason: "data does not fit in a single frame",
            })?;
        self.send_frame(&frame)?;
        Ok(frame.wire_len())
    }

    /// Binds the session to `port` and installs `handler` for incoming data.
    ///
    /// The handler is only installed once the daemon accepts the binding.
    ///
    /// # Errors
    ///
    /// Propagates call failures; the previous handler is kept on failure.
    pub fn start_receiving_data<H>(&mut self, port: u8, handler: H) -> Result<(), ClientError>
    where
        H: DataHandler + 'static,
    {
        self.status_call(Command::BIND, &encode_i32(i32::from(port)))?;
        debug!(target: SESSION_TARGET, port, "bound data port");
        self.set_data_handler(handler);
        Ok(())
    }
}
