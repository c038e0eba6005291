//! The dispatch loop: the only code path that reads from the daemon
//! connection or drains a category queue.

use std::fmt;

use tracing::debug;

use crate::call::CallState;
use crate::demux::{self, Outcome};
use crate::error::ClientError;
use crate::protocol::Frame;
use crate::queue::Category;
use crate::session::Session;
use crate::transport::Stream;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Composable options for one [`Session::dispatch`] invocation.
///
/// ```
/// use quorate::DispatchMode;
///
/// let mode = DispatchMode::non_blocking().suppress_data().drain_all();
/// assert!(!mode.is_blocking());
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DispatchMode(u8);

impl DispatchMode {
    const BLOCKING: u8 = 1;
    const SUPPRESS_REPLY: u8 = 1 << 1;
    const SUPPRESS_DATA: u8 = 1 << 2;
    const SUPPRESS_EVENT: u8 = 1 << 3;
    const DRAIN_ALL: u8 = 1 << 4;

    /// Waits for a frame when no queued work is available.
    #[must_use]
    pub const fn blocking() -> Self {
        Self(Self::BLOCKING)
    }

    /// Returns without suspending when no work is available.
    #[must_use]
    pub const fn non_blocking() -> Self {
        Self(0)
    }

    /// Queues replies instead of completing the outstanding call.
    #[must_use]
    pub const fn suppress_reply(self) -> Self {
        Self(self.0 | Self::SUPPRESS_REPLY)
    }

    /// Queues data frames instead of invoking the data handler.
    #[must_use]
    pub const fn suppress_data(self) -> Self {
        Self(self.0 | Self::SUPPRESS_DATA)
    }

    /// Queues events instead of invoking the event handler.
    #[must_use]
    pub const fn suppress_event(self) -> Self {
        Self(self.0 | Self::SUPPRESS_EVENT)
    }

    /// Keeps dispatching until no unsuppressed work is immediately available.
    ///
    /// Only the first iteration honours the blocking setting; later ones
    /// never suspend.
    #[must_use]
    pub const fn drain_all(self) -> Self {
        Self(self.0 | Self::DRAIN_ALL)
    }

    /// Returns true when the first read may suspend.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        self.0 & Self::BLOCKING != 0
    }

    /// Returns true when the loop repeats until idle.
    #[must_use]
    pub const fn is_drain_all(self) -> bool {
        self.0 & Self::DRAIN_ALL != 0
    }

    /// Returns true when delivery of `category` is deferred to its queue.
    #[must_use]
    pub const fn suppresses(self, category: Category) -> bool {
        let bit = match category {
            Category::Reply => Self::SUPPRESS_REPLY,
            Category::Data => Self::SUPPRESS_DATA,
            Category::Event => Self::SUPPRESS_EVENT,
        };
        self.0 & bit != 0
    }

    const fn without_blocking(self) -> Self {
        Self(self.0 & !Self::BLOCKING)
    }
}

impl fmt::Debug for DispatchMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DispatchMode")
            .field("blocking", &self.is_blocking())
            .field("suppress_reply", &self.suppresses(Category::Reply))
            .field("suppress_data", &self.suppresses(Category::Data))
            .field("suppress_event", &self.suppresses(Category::Event))
            .field("drain_all", &self.is_drain_all())
            .finish()
    }
}

/// Result of a single dispatch iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Idle,
    Processed { bytes: usize, reply_consumed: bool },
}

impl<S: Stream> Session<S> {
    /// Processes pending traffic.
    ///
    /// Each iteration either drains one queued frame (replies before data
    /// before events, skipping suppressed categories) or reads one new frame
    /// from the daemon. Returns the number of frame bytes processed, header
    /// included, or `0` when a non-blocking dispatch found nothing to do.
    ///
    /// No call is outstanding here, so any reply read by this method is
    /// unmatched and dropped.
    ///
    /// When a drain-all dispatch has already processed frames and a later
    /// read faults the session, the processed byte count is returned and the
    /// fault is reported by the next dispatch or call.
    ///
    /// # Errors
    ///
    /// Fails with the transport error that faulted the session, or with the
    /// recorded fault when the session had already failed.
    pub fn dispatch(&mut self, mode: DispatchMode) -> Result<usize, ClientError> {
        self.run_dispatch(mode, None)
    }

    pub(crate) fn run_dispatch(
        &mut self,
        mode: DispatchMode,
        mut call: Option<&mut CallState<'_>>,
    ) -> Result<usize, ClientError> {
        let mut total = 0_usize;
        let mut step_mode = mode;
        loop {
            let step = match self.dispatch_once(step_mode, call.as_deref_mut()) {
                Ok(step) => step,
                // The fault is recorded; the next dispatch or call reports it.
                Err(error) if total > 0 => {
                    debug!(
                        target: DISPATCH_TARGET,
                        %error,
                        processed = total,
                        "drain stopped by a session fault"
                    );
                    break;
                }
                Err(error) => return Err(error),
            };
            match step {
                Step::Idle => break,
                Step::Processed {
                    bytes,
                    reply_consumed,
                } => {
                    total = total.saturating_add(bytes);
                    if reply_consumed || !mode.is_drain_all() {
                        break;
                    }
                }
            }
            step_mode = mode.without_blocking();
        }
        Ok(total)
    }

    fn dispatch_once(
        &mut self,
        mode: DispatchMode,
        call: Option<&mut CallState<'_>>,
    ) -> Result<Step, ClientError> {
        self.check_fault()?;

        if let Some((category, frame)) = self.queues.next_ready(mode) {
            debug!(
                target: DISPATCH_TARGET,
                %category,
                command = %frame.command(),
                "draining queued frame"
            );
            return Ok(self.deliver(frame, mode, call));
        }

        let received = self.transport.receive(mode.is_blocking());
        match received {
            Ok(Some(frame)) => Ok(self.deliver(frame, mode, call)),
            Ok(None) => Ok(Step::Idle),
            Err(error) => Err(self.record_fault(error)),
        }
    }

    fn deliver(
        &mut self,
        frame: Frame,
        mode: DispatchMode,
        call: Option<&mut CallState<'_>>,
    ) -> Step {
        let bytes = frame.wire_len();
        let outcome = demux::deliver(frame, mode, &mut self.queues, &mut self.handlers, call);
        Step::Processed {
            bytes,
            reply_consumed: outcome == Outcome::ReplyConsumed,
        }
    }
}
