//! Frame classification and delivery.

use tracing::{debug, warn};

use crate::call::CallState;
use crate::dispatch::{DISPATCH_TARGET, DispatchMode};
use crate::handler::Handlers;
use crate::protocol::{Command, Frame};
use crate::queue::{Category, CategoryQueues};

/// Classification of an incoming frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Class {
    Matched(Category),
    Unmatched,
}

/// What happened to a delivered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// A handler received the frame.
    Delivered,
    /// The frame was appended to its category queue.
    Queued,
    /// The frame was consumed without delivery.
    Dropped,
    /// The outstanding call received its reply.
    ReplyConsumed,
}

/// Classifies a frame by its command word.
///
/// Data is recognised first, then replies (only while a call is armed), then
/// events. Everything else is unmatched.
pub(crate) fn classify(command: Command, call_armed: bool) -> Class {
    if command.code() == Command::DATA.code() {
        Class::Matched(Category::Data)
    } else if command.is_reply() && call_armed {
        Class::Matched(Category::Reply)
    } else if command == Command::EVENT {
        Class::Matched(Category::Event)
    } else {
        Class::Unmatched
    }
}

/// Routes `frame` to the armed call, a handler, or its queue.
pub(crate) fn deliver(
    frame: Frame,
    mode: DispatchMode,
    queues: &mut CategoryQueues,
    handlers: &mut Handlers,
    call: Option<&mut CallState<'_>>,
) -> Outcome {
    let armed = call.as_ref().is_some_and(|state| state.is_armed());
    let category = match classify(frame.command(), armed) {
        Class::Matched(category) => category,
        Class::Unmatched => {
            debug!(
                target: DISPATCH_TARGET,
                command = %frame.command(),
                "dropping unmatched frame"
            );
            return Outcome::Dropped;
        }
    };

    if mode.suppresses(category) {
        return if queues.enqueue(category, frame) {
            Outcome::Queued
        } else {
            Outcome::Dropped
        };
    }

    match category {
        Category::Data => deliver_data(&frame, handlers),
        Category::Event => deliver_event(&frame, handlers),
        Category::Reply => call.map_or(Outcome::Dropped, |state| deliver_reply(&frame, state)),
    }
}

fn deliver_data(frame: &Frame, handlers: &mut Handlers) -> Outcome {
    let Some(message) = frame.data_message() else {
        warn!(
            target: DISPATCH_TARGET,
            length = frame.wire_len(),
            "dropping truncated data frame"
        );
        return Outcome::Dropped;
    };
    match handlers.data.as_mut() {
        Some(handler) => {
            handler.on_data(message);
            Outcome::Delivered
        }
        None => {
            debug!(
                target: DISPATCH_TARGET,
                port = message.port,
                source = %message.source,
                "no data handler registered; dropping data"
            );
            Outcome::Dropped
        }
    }
}

fn deliver_event(frame: &Frame, handlers: &mut Handlers) -> Outcome {
    let Some(event) = frame.event_message() else {
        warn!(
            target: DISPATCH_TARGET,
            length = frame.wire_len(),
            "dropping truncated event frame"
        );
        return Outcome::Dropped;
    };
    match handlers.event.as_mut() {
        Some(handler) => {
            handler.on_event(event);
            Outcome::Delivered
        }
        None => {
            debug!(
                target: DISPATCH_TARGET,
                reason = %event.reason,
                "no event handler registered; dropping event"
            );
            Outcome::Dropped
        }
    }
}

fn deliver_reply(frame: &Frame, state: &mut CallState<'_>) -> Outcome {
    let Some((status, body)) = frame.reply_parts() else {
        warn!(
            target: DISPATCH_TARGET,
            command = %frame.command(),
            "dropping reply without a status word"
        );
        return Outcome::Dropped;
    };
    state.complete(status, body);
    debug!(
        target: DISPATCH_TARGET,
        command = %frame.command(),
        status,
        "reply consumed"
    );
    Outcome::ReplyConsumed
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::handler::{Event, EventReason};
    use crate::protocol::NodeId;
    use rstest::rstest;

    #[rstest]
    #[case(Command::DATA, false, Class::Matched(Category::Data))]
    #[case(Command::DATA.as_reply(), true, Class::Matched(Category::Data))]
    #[case(Command::IS_QUORATE.as_reply(), true, Class::Matched(Category::Reply))]
    #[case(Command::IS_QUORATE.as_reply(), false, Class::Unmatched)]
    #[case(Command::EVENT, false, Class::Matched(Category::Event))]
    #[case(Command::IS_QUORATE, true, Class::Unmatched)]
    fn classification_follows_precedence(
        #[case] command: Command,
        #[case] armed: bool,
        #[case] expected: Class,
    ) {
        assert_eq!(classify(command, armed), expected);
    }

    #[test]
    fn suppressed_events_are_queued_unchanged() {
        let mut queues = CategoryQueues::default();
        let mut handlers = Handlers::default();
        let frame = Frame::event(EventReason::PortOpened, 4);
        let original = frame.clone();

        let outcome = deliver(
            frame,
            DispatchMode::blocking().suppress_event(),
            &mut queues,
            &mut handlers,
            None,
        );

        assert_eq!(outcome, Outcome::Queued);
        assert_eq!(queues.dequeue(Category::Event), Some(original));
    }

    #[test]
    fn unsuppressed_events_reach_the_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut handlers = Handlers {
            event: Some(Box::new(move |event: Event| sink.borrow_mut().push(event))),
            data: None,
        };
        let mut queues = CategoryQueues::default();

        let outcome = deliver(
            Frame::event(EventReason::StateChange, 7),
            DispatchMode::non_blocking(),
            &mut queues,
            &mut handlers,
            None,
        );

        assert_eq!(outcome, Outcome::Delivered);
        assert_eq!(
            seen.borrow().as_slice(),
            &[Event {
                reason: EventReason::StateChange,
                argument: 7
            }]
        );
    }

    #[test]
    fn data_without_handler_is_dropped() {
        let mut queues = CategoryQueues::default();
        let mut handlers = Handlers::default();
        let frame = Frame::data(NodeId::new(2), 1, 0, b"x").unwrap();

        let outcome = deliver(
            frame,
            DispatchMode::non_blocking(),
            &mut queues,
            &mut handlers,
            None,
        );

        assert_eq!(outcome, Outcome::Dropped);
        assert_eq!(queues.counts().total(), 0);
    }

    #[test]
    fn reply_completes_armed_call() {
        let mut buffer = [0_u8; 4];
        let mut state = CallState::new(Command::GET_VERSION, &mut buffer);
        let mut queues = CategoryQueues::default();
        let mut handlers = Handlers::default();
        let frame = Frame::reply(Command::GET_VERSION, 3, &[1, 2]).unwrap();

        let outcome = deliver(
            frame,
            DispatchMode::blocking().suppress_data().suppress_event(),
            &mut queues,
            &mut handlers,
            Some(&mut state),
        );

        assert_eq!(outcome, Outcome::ReplyConsumed);
        assert!(!state.is_armed());
        let reply = state.reply().unwrap();
        assert_eq!(reply.status, 3);
        assert_eq!(reply.copied, 2);
        assert_eq!(buffer, [1, 2, 0, 0]);
    }

    #[test]
    fn suppressed_reply_is_queued_and_call_stays_armed() {
        let mut buffer = [0_u8; 4];
        let mut state = CallState::new(Command::IS_ACTIVE, &mut buffer);
        let mut queues = CategoryQueues::default();
        let mut handlers = Handlers::default();
        let frame = Frame::reply(Command::IS_ACTIVE, 1, &[]).unwrap();

        let outcome = deliver(
            frame,
            DispatchMode::non_blocking().suppress_reply(),
            &mut queues,
            &mut handlers,
            Some(&mut state),
        );

        assert_eq!(outcome, Outcome::Queued);
        assert!(state.is_armed());
        assert_eq!(queues.len(Category::Reply), 1);
    }
}
