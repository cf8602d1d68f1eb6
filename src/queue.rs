//! C1: the outbound message queue.
//!
//! An ordered sequence of pending messages plus two running counters (message
//! count, byte count). Mutators assume the caller already holds whatever lock
//! encloses the queue (typically a `Partition`'s mutex, see `partition.rs`) —
//! the queue itself carries no lock of its own, exactly as
//! `rd_kafka_msgq_t` does not in the original.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::partition::PartitionId;

static NEXT_MSG_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque queued record. Message-body allocation, compression, and the
/// wire format are the codec's concern; this core only moves `Message`s
/// around and counts them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    id: u64,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    /// The partition the caller asked for, if any; `None` means "let the
    /// partitioner decide".
    pub partition_hint: Option<PartitionId>,
    pub timestamp: i64,
}

impl Message {
    pub fn new(key: Option<Bytes>, value: Option<Bytes>) -> Self {
        Message {
            id: NEXT_MSG_ID.fetch_add(1, Ordering::Relaxed),
            key,
            value,
            partition_hint: None,
            timestamp: 0,
        }
    }

    pub fn with_partition_hint(mut self, partition: PartitionId) -> Self {
        self.partition_hint = Some(partition);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn len(&self) -> usize {
        self.key.as_ref().map_or(0, Bytes::len) + self.value.as_ref().map_or(0, Bytes::len)
    }
}

/// A hook invoked once per message during `purge`, e.g. to fail a delivery
/// future or free an external buffer. The core never inspects message
/// contents itself; releasing them is always the caller's business.
pub trait ReleaseHook {
    fn release(&mut self, msg: Message);
}

impl<F: FnMut(Message)> ReleaseHook for F {
    fn release(&mut self, msg: Message) {
        (self)(msg)
    }
}

/// Ordered message queue with O(1) splice. Mirrors `rd_kafka_msgq_t`.
#[derive(Debug, Default)]
pub struct MsgQueue {
    messages: VecDeque<Message>,
    msg_cnt: usize,
    msg_bytes: usize,
}

impl MsgQueue {
    pub fn new() -> Self {
        MsgQueue::default()
    }

    pub fn len(&self) -> usize {
        self.msg_cnt
    }

    pub fn is_empty(&self) -> bool {
        self.msg_cnt == 0
    }

    pub fn bytes(&self) -> usize {
        self.msg_bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Append at the tail. Used for ordinary produce traffic.
    pub fn enqueue(&mut self, msg: Message) {
        self.msg_bytes += msg.len();
        self.msg_cnt += 1;
        self.messages.push_back(msg);
    }

    /// Place at the head. Reserved for control/flash messages that must
    /// precede any queued data.
    pub fn insert(&mut self, msg: Message) {
        self.msg_bytes += msg.len();
        self.msg_cnt += 1;
        self.messages.push_front(msg);
    }

    /// Remove a specific message. The caller guarantees membership.
    pub fn dequeue(&mut self, msg: &Message) {
        if let Some(pos) = self.messages.iter().position(|m| m.id == msg.id) {
            let removed = self.messages.remove(pos).expect("position was just found");
            self.msg_bytes -= removed.len();
            self.msg_cnt -= 1;
        }
    }

    /// Move all of `other`'s messages onto the tail of `self` in O(1),
    /// leaving `other` empty. The counters are added, not recomputed.
    pub fn concat(&mut self, other: &mut MsgQueue) {
        self.messages.append(&mut other.messages);
        self.msg_cnt += other.msg_cnt;
        self.msg_bytes += other.msg_bytes;
        other.msg_cnt = 0;
        other.msg_bytes = 0;
    }

    /// Replace `self`'s contents with `other`'s, leaving `other` empty.
    pub fn move_assign(&mut self, other: &mut MsgQueue) {
        self.messages = std::mem::take(&mut other.messages);
        self.msg_cnt = other.msg_cnt;
        self.msg_bytes = other.msg_bytes;
        other.msg_cnt = 0;
        other.msg_bytes = 0;
    }

    /// Release every message, head to tail, via `hook`, and empty the queue.
    pub fn purge<H: ReleaseHook>(&mut self, mut hook: H) {
        self.msg_cnt = 0;
        self.msg_bytes = 0;
        for msg in self.messages.drain(..) {
            hook.release(msg);
        }
    }
}
