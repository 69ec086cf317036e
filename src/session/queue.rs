//! Bounded per-session outbound queue.
//!
//! Many producers (any handler notifying a character), one consumer (the
//! session's drain task). `push` never blocks; when the queue is full the
//! configured [`OverflowPolicy`] decides which message is lost, and the loss
//! is logged and counted.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::metrics;
use crate::world::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued message to make room.
    #[default]
    DropOldest,
    /// Keep the queue as is and refuse the new message.
    RejectNew,
}

/// Result of a single [`OutboundQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Queued after evicting the oldest message.
    DroppedOldest,
    /// Refused because the queue was full.
    Rejected,
    /// Refused because the queue (or the session) is gone.
    Closed,
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Queued | SendOutcome::DroppedOldest)
    }
}

#[derive(Debug)]
struct QueueState {
    messages: VecDeque<String>,
    closed: bool,
}

#[derive(Debug)]
pub struct OutboundQueue {
    label: String,
    capacity: usize,
    policy: OverflowPolicy,
    state: Mutex<QueueState>,
    ready: Notify,
    dropped: AtomicU64,
}

impl OutboundQueue {
    /// `label` identifies the owning session in overflow logs.
    pub fn new(label: impl Into<String>, capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            label: label.into(),
            capacity,
            policy,
            state: Mutex::new(QueueState {
                messages: VecDeque::with_capacity(capacity.min(64)),
                closed: false,
            }),
            ready: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, message: impl Into<String>) -> SendOutcome {
        let outcome = {
            let mut state = lock(&self.state);
            if state.closed {
                return SendOutcome::Closed;
            }
            if state.messages.len() < self.capacity {
                state.messages.push_back(message.into());
                SendOutcome::Queued
            } else {
                match self.policy {
                    OverflowPolicy::DropOldest => {
                        state.messages.pop_front();
                        state.messages.push_back(message.into());
                        SendOutcome::DroppedOldest
                    }
                    OverflowPolicy::RejectNew => SendOutcome::Rejected,
                }
            }
        };
        match outcome {
            SendOutcome::Queued => metrics::inc_messages_enqueued(),
            SendOutcome::DroppedOldest => {
                metrics::inc_messages_enqueued();
                self.record_drop();
            }
            SendOutcome::Rejected => self.record_drop(),
            SendOutcome::Closed => {}
        }
        if outcome.is_delivered() {
            self.ready.notify_one();
        }
        outcome
    }

    fn record_drop(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::inc_messages_dropped();
        log::warn!(
            target: "mushcore::sessions",
            "queue.overflow session={} policy={:?} capacity={} dropped_total={}",
            self.label,
            self.policy,
            self.capacity,
            total
        );
    }

    pub fn try_recv(&self) -> Option<String> {
        lock(&self.state).messages.pop_front()
    }

    /// Wait for the next message. After [`close`](Self::close) the remaining
    /// messages are still handed out, then `None`.
    pub async fn recv(&self) -> Option<String> {
        loop {
            let notified = self.ready.notified();
            {
                let mut state = lock(&self.state);
                if let Some(message) = state.messages.pop_front() {
                    return Some(message);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.ready.notify_waiters();
        // A consumer between its check and `notified.await` gets the stored
        // permit instead.
        self.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn len(&self) -> usize {
        lock(&self.state).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Messages lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn fifo_order_within_capacity() {
        let q = OutboundQueue::new("t", 3, OverflowPolicy::DropOldest);
        assert_eq!(q.push("a"), SendOutcome::Queued);
        assert_eq!(q.push("b"), SendOutcome::Queued);
        assert_eq!(q.try_recv().as_deref(), Some("a"));
        assert_eq!(q.try_recv().as_deref(), Some("b"));
        assert_eq!(q.try_recv(), None);
    }

    #[test]
    fn drop_oldest_evicts_front() {
        let q = OutboundQueue::new("t", 2, OverflowPolicy::DropOldest);
        q.push("1");
        q.push("2");
        assert_eq!(q.push("3"), SendOutcome::DroppedOldest);
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.try_recv().as_deref(), Some("2"));
        assert_eq!(q.try_recv().as_deref(), Some("3"));
    }

    #[test]
    fn reject_new_keeps_existing() {
        let q = OutboundQueue::new("t", 2, OverflowPolicy::RejectNew);
        q.push("1");
        q.push("2");
        assert_eq!(q.push("3"), SendOutcome::Rejected);
        assert_eq!(q.len(), 2);
        assert_eq!(q.try_recv().as_deref(), Some("1"));
    }

    #[test]
    fn closed_queue_refuses_and_drains() {
        let q = OutboundQueue::new("t", 4, OverflowPolicy::DropOldest);
        q.push("last words");
        q.close();
        assert_eq!(q.push("too late"), SendOutcome::Closed);
        assert_eq!(q.try_recv().as_deref(), Some("last words"));
        assert!(q.is_empty());
    }

    #[test]
    fn recv_wakes_on_push_and_ends_on_close() {
        let q = OutboundQueue::new("t", 4, OverflowPolicy::DropOldest);
        {
            let mut recv = task::spawn(q.recv());
            assert_pending!(recv.poll());
            q.push("hello");
            assert!(recv.is_woken());
            assert_eq!(assert_ready!(recv.poll()).as_deref(), Some("hello"));
        }
        let mut recv = task::spawn(q.recv());
        assert_pending!(recv.poll());
        q.close();
        assert!(recv.is_woken());
        assert_eq!(assert_ready!(recv.poll()), None);
    }
}
