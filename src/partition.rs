//! C2: per-partition state.
//!
//! A `Partition` is reference-counted like everything else in this core, but
//! unlike the original C `rd_kafka_toppar_t`, its back-reference to the
//! owning topic is a non-owning `Weak` handle (§9 design notes: "model the
//! back-pointer as a non-owning handle and make `parts[i]` the single strong
//! owner"). That turns the topic↔partition relationship into a tree instead
//! of the original's reference-counted cycle.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, Weak};

use crate::broker::Broker;
use crate::queue::{Message, MsgQueue, ReleaseHook};
use crate::topic::TopicInner;

pub type PartitionId = i32;

/// The sentinel partition id for the "unassigned" slot: messages awaiting
/// partition resolution. Matches `RD_KAFKA_PARTITION_UA` in the original.
pub const UNASSIGNED_PARTITION: PartitionId = -1;

/// Only `None` is exercised by this core; richer fetch states belong to the
/// consumer path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    None,
    Active,
}

impl Default for FetchState {
    fn default() -> Self {
        FetchState::None
    }
}

/// `{DESIRED, UNKNOWN}`, carried as two plain booleans rather than a bitmask
/// — both live inside the same mutex as the rest of the partition's mutable
/// state, so there's no separate-synchronization reason to pack them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartitionFlags {
    pub desired: bool,
    pub unknown: bool,
}

/// A notification destined for the consumer-side fetch path. Present on the
/// struct because the spec lists `fetch_queue` as an attribute, but nothing
/// in this core ever pushes to it.
#[derive(Debug, Clone)]
pub struct FetchEvent;

struct PartitionState {
    msg_queue: MsgQueue,
    xmit_queue: MsgQueue,
    fetch_state: FetchState,
    leader: Option<Broker>,
    flags: PartitionFlags,
    fetch_queue: Vec<FetchEvent>,
}

struct PartitionInner {
    partition_id: PartitionId,
    parent: Weak<TopicInner>,
    state: Mutex<PartitionState>,
}

/// Handle to a partition's shared state. Cloning bumps the `Arc` strong
/// count, i.e. `keep()`; dropping the last clone tears it down, i.e. the
/// effect of `release()`.
#[derive(Clone)]
pub struct Partition {
    inner: Arc<PartitionInner>,
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition").field("partition_id", &self.partition_id()).finish()
    }
}

impl PartialEq for Partition {
    fn eq(&self, other: &Partition) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Partition {}

impl Hash for Partition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl Partition {
    pub fn new(partition_id: PartitionId, parent: Weak<TopicInner>) -> Self {
        Partition {
            inner: Arc::new(PartitionInner {
                partition_id,
                parent,
                state: Mutex::new(PartitionState {
                    msg_queue: MsgQueue::new(),
                    xmit_queue: MsgQueue::new(),
                    fetch_state: FetchState::None,
                    leader: None,
                    flags: PartitionFlags::default(),
                    fetch_queue: Vec::new(),
                }),
            }),
        }
    }

    /// A partition with no owning topic, useful for isolated unit tests.
    #[cfg(test)]
    pub fn new_orphan(partition_id: PartitionId) -> Self {
        Partition::new(partition_id, Weak::new())
    }

    pub fn partition_id(&self) -> PartitionId {
        self.inner.partition_id
    }

    pub fn is_unassigned(&self) -> bool {
        self.inner.partition_id == UNASSIGNED_PARTITION
    }

    pub fn parent(&self) -> Option<Arc<TopicInner>> {
        self.inner.parent.upgrade()
    }

    /// Bump the reference count. Named to match the spec's explicit
    /// keep/release vocabulary even though it's just `Arc::clone`.
    pub fn keep(&self) -> Partition {
        Partition { inner: Arc::clone(&self.inner) }
    }

    pub fn release(self) {
        drop(self)
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn fetch_state(&self) -> FetchState {
        self.inner.state.lock().unwrap().fetch_state
    }

    pub fn flags(&self) -> PartitionFlags {
        self.inner.state.lock().unwrap().flags
    }

    pub fn set_desired(&self, desired: bool) {
        self.inner.state.lock().unwrap().flags.desired = desired;
    }

    pub fn set_unknown(&self, unknown: bool) {
        self.inner.state.lock().unwrap().flags.unknown = unknown;
    }

    pub fn leader(&self) -> Option<Broker> {
        self.inner.state.lock().unwrap().leader.clone()
    }

    pub fn msg_queue_len(&self) -> usize {
        self.inner.state.lock().unwrap().msg_queue.len()
    }

    pub fn msg_queue_snapshot(&self) -> Vec<Message> {
        self.inner.state.lock().unwrap().msg_queue.iter().cloned().collect()
    }

    /// Place `msg` at the head of the message queue. Reserved for
    /// control/flash messages that must precede any queued data.
    pub fn insert_msg(&self, msg: Message) {
        self.inner.state.lock().unwrap().msg_queue.insert(msg);
    }

    /// Place `msg` at the tail of the message queue.
    pub fn enq_msg(&self, msg: Message) {
        self.inner.state.lock().unwrap().msg_queue.enqueue(msg);
    }

    /// Remove `msg`; caller guarantees it is a member of the queue.
    pub fn deq_msg(&self, msg: &Message) {
        self.inner.state.lock().unwrap().msg_queue.dequeue(msg);
    }

    /// Prepend the contents of `q` to the message queue, leaving `q` empty.
    /// Implemented as: concat the partition's queue onto `q` (so `q` now
    /// holds "old head ... old tail"), then move-assign `q` back in.
    pub fn insert_queue(&self, q: &mut MsgQueue) {
        let mut state = self.inner.state.lock().unwrap();
        q.concat(&mut state.msg_queue);
        state.msg_queue.move_assign(q);
    }

    /// Concat `src`'s queue onto `dst`'s. The caller must already hold
    /// whatever external serialization both partitions require (e.g. the
    /// owning topic's write lock) — this only takes the two partition locks.
    pub fn move_msgs(dst: &Partition, src: &Partition) {
        if Arc::ptr_eq(&dst.inner, &src.inner) {
            return;
        }
        let mut dst_state = dst.inner.state.lock().unwrap();
        let mut src_state = src.inner.state.lock().unwrap();
        dst_state.msg_queue.concat(&mut src_state.msg_queue);
    }

    pub fn purge_msg_queue<H: ReleaseHook>(&self, hook: H) {
        self.inner.state.lock().unwrap().msg_queue.purge(hook);
    }

    /// Move this partition's queue out into a fresh, empty queue, leaving
    /// this partition's own queue empty. Used by the UA drain, which needs a
    /// private snapshot to hand to the partitioner outside the partition
    /// lock.
    pub(crate) fn take_msg_queue(&self) -> MsgQueue {
        let mut state = self.inner.state.lock().unwrap();
        let mut out = MsgQueue::new();
        out.move_assign(&mut state.msg_queue);
        out
    }

    /// Delegate `target` as leader for this partition, or clear the leader
    /// if `target` is `None`. Caller must hold the owning topic's write
    /// lock; the broker's partition-list rwlock is taken here, nested inside
    /// the partition's own lock, matching the required lock order
    /// `topic_rw -> partition_lock -> broker_parts_rw`.
    pub fn broker_delegate(&self, target: Option<Broker>) {
        let mut state = self.inner.state.lock().unwrap();

        if state.leader.as_ref() == target.as_ref() {
            debug!("partition {}: leader unchanged, no-op", self.partition_id);
            return;
        }

        if let Some(old) = state.leader.take() {
            old.unlink(self);
            old.release();
        }

        if let Some(new) = target {
            new.link(self.keep());
            state.leader = Some(new);
        }
    }
}
