//! Holding areas for frames that arrive while their category is suppressed.

use std::collections::VecDeque;
use std::fmt;

use tracing::warn;

use crate::dispatch::{DISPATCH_TARGET, DispatchMode};
use crate::protocol::Frame;

/// Kind of traffic sharing the daemon connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Answers to requests issued by this session.
    Reply,
    /// Application data from other nodes.
    Data,
    /// Out-of-band notifications.
    Event,
}

impl Category {
    /// Drain order used when several queues hold frames.
    pub const PRIORITY: [Self; 3] = [Self::Reply, Self::Data, Self::Event];
}

impl fmt::Display for Category {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Reply => "reply",
            Self::Data => "data",
            Self::Event => "event",
        })
    }
}

/// Number of frames waiting in each category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingCounts {
    /// Queued replies.
    pub reply: usize,
    /// Queued data frames.
    pub data: usize,
    /// Queued events.
    pub event: usize,
}

impl PendingCounts {
    /// Total number of queued frames.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.reply + self.data + self.event
    }
}

/// One FIFO per [`Category`].
#[derive(Debug, Default)]
pub(crate) struct CategoryQueues {
    reply: VecDeque<Frame>,
    data: VecDeque<Frame>,
    event: VecDeque<Frame>,
}

impl CategoryQueues {
    /// Appends `frame` to the tail of its category's queue.
    ///
    /// Delivery of queued categories is best effort: if the queue cannot grow
    /// the frame is dropped with a warning and `false` is returned.
    pub(crate) fn enqueue(&mut self, category: Category, frame: Frame) -> bool {
        let queue = self.queue_mut(category);
        if queue.try_reserve(1).is_err() {
            warn!(
                target: DISPATCH_TARGET,
                %category,
                command = %frame.command(),
                "queue allocation failed; frame dropped"
            );
            return false;
        }
        queue.push_back(frame);
        true
    }

    /// Removes the oldest frame in `category`.
    pub(crate) fn dequeue(&mut self, category: Category) -> Option<Frame> {
        self.queue_mut(category).pop_front()
    }

    /// Removes the head of the highest-priority queue not suppressed by
    /// `mode`.
    pub(crate) fn next_ready(&mut self, mode: DispatchMode) -> Option<(Category, Frame)> {
        Category::PRIORITY
            .into_iter()
            .filter(|category| !mode.suppresses(*category))
            .find_map(|category| self.dequeue(category).map(|frame| (category, frame)))
    }

    pub(crate) fn len(&self, category: Category) -> usize {
        self.queue(category).len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        Category::PRIORITY
            .into_iter()
            .all(|category| self.queue(category).is_empty())
    }

    pub(crate) fn counts(&self) -> PendingCounts {
        PendingCounts {
            reply: self.len(Category::Reply),
            data: self.len(Category::Data),
            event: self.len(Category::Event),
        }
    }

    /// Discards the frames queued in `category` and reports how many there
    /// were.
    pub(crate) fn discard(&mut self, category: Category) -> usize {
        let queue = self.queue_mut(category);
        let discarded = queue.len();
        queue.clear();
        discarded
    }

    /// Discards every queued frame and reports how many were dropped.
    pub(crate) fn clear(&mut self) -> PendingCounts {
        let counts = self.counts();
        self.reply.clear();
        self.data.clear();
        self.event.clear();
        counts
    }

    const fn queue(&self, category: Category) -> &VecDeque<Frame> {
        match category {
            Category::Reply => &self.reply,
            Category::Data => &self.data,
            Category::Event => &self.event,
        }
    }

    const fn queue_mut(&mut self, category: Category) -> &mut VecDeque<Frame> {
        match category {
            Category::Reply => &mut self.reply,
            Category::Data => &mut self.data,
            Category::Event => &mut self.event,
        }
    }
}
