//! C3: a named, partitioned topic.
//!
//! Holds the dense `parts` array, the "desired but unseen" list, and the UA
//! slot, all behind a single rwlock exactly as `rd_kafka_topic_t`'s
//! `rkt_lock` guards `rkt_p`, `rkt_partition_cnt`, `rkt_desp`, and `rkt_ua`
//! together. The back-reference to the owning client is a non-owning `Weak`.

use std::sync::{Arc, RwLock, Weak};

use crate::broker::Broker;
use crate::client::ClientInner;
use crate::config::TopicConfig;
use crate::error::{ErrorKind, Result};
use crate::partition::{Partition, PartitionId, UNASSIGNED_PARTITION};
use crate::queue::{Message, MsgQueue};

struct TopicState {
    parts: Vec<Partition>,
    partition_count: usize,
    ua: Option<Partition>,
    desired_unseen: Vec<Partition>,
}

pub struct TopicInner {
    name: String,
    client: Weak<ClientInner>,
    config: TopicConfig,
    state: RwLock<TopicState>,
}

/// Handle to a topic's shared state. Cloning is `keep()`; dropping the last
/// clone is `release()`.
#[derive(Clone)]
pub struct Topic {
    inner: Arc<TopicInner>,
}

impl PartialEq for Topic {
    fn eq(&self, other: &Topic) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Topic {}

impl Topic {
    /// Validate config and construct a brand-new topic, detached from any
    /// client registry. Used by `Client::topic` (which additionally handles
    /// idempotent lookup and registry linkage) and by tests that don't need
    /// a full `Client`.
    pub(crate) fn construct(name: &str, client: Weak<ClientInner>, config: TopicConfig) -> Result<Topic> {
        if name.is_empty() {
            return Err(ErrorKind::InvalidConfig("topic name must not be empty").into());
        }
        if config.message_timeout_ms <= 0 {
            return Err(ErrorKind::InvalidConfig("message_timeout_ms must be positive").into());
        }
        if config.request_timeout_ms <= 0 {
            return Err(ErrorKind::InvalidConfig("request_timeout_ms must be positive").into());
        }

        let inner = Arc::new(TopicInner {
            name: name.to_owned(),
            client,
            config,
            state: RwLock::new(TopicState {
                parts: Vec::new(),
                partition_count: 0,
                ua: None,
                desired_unseen: Vec::new(),
            }),
        });

        let ua = Partition::new(UNASSIGNED_PARTITION, Arc::downgrade(&inner));
        inner.state.write().unwrap().ua = Some(ua);

        trace!("new local topic: {}", name);

        Ok(Topic { inner })
    }

    #[cfg(test)]
    pub fn new_for_test(name: &str, config: TopicConfig) -> Topic {
        Topic::construct(name, Weak::new(), config).expect("valid test config")
    }

    #[cfg(test)]
    pub(crate) fn desired_unseen_count(&self, id: PartitionId) -> usize {
        self.inner.state.read().unwrap().desired_unseen.iter().filter(|p| p.partition_id() == id).count()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &TopicConfig {
        &self.inner.config
    }

    pub fn partition_count(&self) -> usize {
        self.inner.state.read().unwrap().partition_count
    }

    pub fn keep(&self) -> Topic {
        Topic { inner: Arc::clone(&self.inner) }
    }

    pub fn release(self) {
        drop(self)
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// If `0 <= id < partition_count`, return `parts[id]` (kept). Else, if
    /// `ua_on_miss`, return the UA partition (kept). Else `None`. Lock-free:
    /// operates on a `TopicState` the caller already holds a read or write
    /// guard on, so composite operations (`desired_add`, `desired_del`,
    /// `delegate_leader`) can chain several such lookups under one acquired
    /// lock instead of racing across several independent ones.
    fn lookup_partition_locked(state: &TopicState, id: PartitionId, ua_on_miss: bool) -> Option<Partition> {
        if id >= 0 && (id as usize) < state.partition_count {
            Some(state.parts[id as usize].keep())
        } else if ua_on_miss {
            state.ua.as_ref().map(Partition::keep)
        } else {
            None
        }
    }

    /// Linear scan of the desired-but-unseen list for `partition_id == id`.
    /// Lock-free counterpart of `desired_get`; see `lookup_partition_locked`.
    fn desired_get_locked(state: &TopicState, id: PartitionId) -> Option<Partition> {
        state.desired_unseen.iter().find(|p| p.partition_id() == id).map(Partition::keep)
    }

    pub fn lookup_partition(&self, id: PartitionId, ua_on_miss: bool) -> Option<Partition> {
        let state = self.inner.state.read().unwrap();
        Self::lookup_partition_locked(&state, id, ua_on_miss)
    }

    pub fn desired_get(&self, id: PartitionId) -> Option<Partition> {
        let state = self.inner.state.read().unwrap();
        Self::desired_get_locked(&state, id)
    }

    /// Add `id` as a desired partition, or mark an existing one desired.
    /// Order of attempts, per the original `rd_kafka_toppar_desired_add`:
    /// (1) already a real partition — just flag it; (2) already desired —
    /// return unchanged; (3) brand new — create and append to the list. All
    /// three attempts run under one held write-lock guard so two concurrent
    /// callers for the same `id` can't both miss and both push a duplicate
    /// entry onto `desired_unseen` (§3(2)/§4.3 "caller holds the topic write
    /// lock").
    pub fn desired_add(&self, id: PartitionId) -> Partition {
        let mut state = self.inner.state.write().unwrap();

        if let Some(part) = Self::lookup_partition_locked(&state, id, false) {
            part.set_desired(true);
            debug!("topic {}: partition {} marked desired", self.name(), id);
            return part;
        }

        if let Some(part) = Self::desired_get_locked(&state, id) {
            return part;
        }

        let part = Partition::new(id, Arc::downgrade(&self.inner));
        part.set_desired(true);
        part.set_unknown(true);

        debug!("topic {}: adding desired partition {}", self.name(), id);

        state.desired_unseen.push(part.keep());
        part
    }

    /// Unmark `part` as desired. The reference is tied strictly to list
    /// membership (§12): a reference is released if and only if `part` was
    /// actually removed from `desired_unseen`. The flag reads/writes and the
    /// list removal all happen under one held topic write-lock guard, so a
    /// concurrent `desired_add`/`update_partition_count` can't observe (or
    /// produce) a half-finished transition; per the lock order in §5, the
    /// topic write lock is acquired first and the partition's own mutex
    /// (inside `flags`/`set_desired`/`set_unknown`) is taken nested within it.
    pub fn desired_del(&self, part: &Partition) {
        let mut state = self.inner.state.write().unwrap();

        let had_desired = part.flags().desired;
        if !had_desired {
            return;
        }

        part.set_desired(false);

        let was_unknown = part.flags().unknown;
        if was_unknown {
            part.set_unknown(false);

            if let Some(pos) = state.desired_unseen.iter().position(|p| p == part) {
                let removed = state.desired_unseen.remove(pos);
                drop(state);
                removed.release();
            }
        }

        debug!("topic {}: partition {} no longer desired", self.name(), part.partition_id());
    }

    /// Look up the named partition (real or desired-but-unseen) and delegate
    /// it to `leader` — or clear its leader if `leader` is `None` — all under
    /// a single held topic write-lock guard. `None` if this topic has no
    /// partition (real or desired) with this id.
    ///
    /// This is the composite operation §4.4.1 step 3 and §4.5 require: "Under
    /// the topic write lock, lookup_partition(...)" followed immediately by
    /// `broker_delegate`, with no window in between where a concurrent
    /// `update_partition_count`/`partitions_remove` (which also take this
    /// write lock) could remove the partition from `parts` after it was
    /// looked up but before it was bound to a broker.
    pub fn delegate_leader(&self, id: PartitionId, leader: Option<Broker>) -> Option<Partition> {
        let state = self.inner.state.write().unwrap();

        let part = Self::lookup_partition_locked(&state, id, false).or_else(|| Self::desired_get_locked(&state, id));

        if let Some(ref part) = part {
            part.broker_delegate(leader);
        }

        part
    }

    /// Move `q`'s contents into the UA partition's queue. `NotFound` if the
    /// UA slot has already been torn down (mid-teardown).
    pub fn ua_move(&self, q: &mut MsgQueue) -> Result<()> {
        let ua = self.inner.state.read().unwrap().ua.clone();
        match ua {
            Some(ua) => {
                ua.insert_queue(q);
                Ok(())
            }
            None => Err(ErrorKind::NotFound("UA partition").into()),
        }
    }

    /// Replace the partition array, absorbing desired partitions that are
    /// now known and moving excess partitions' messages into the UA slot
    /// (or, absent a UA slot, purging them). Returns `0` if `new_count`
    /// equals the current count (no-op) or `1` if it changed.
    pub fn update_partition_count(&self, new_count: usize) -> i32 {
        let mut state = self.inner.state.write().unwrap();

        if state.partition_count == new_count {
            debug!("topic {}: no change in partition count", self.name());
            return 0;
        }

        if state.partition_count != 0 {
            warn!(
                "topic {} partition count changed from {} to {}",
                self.name(),
                state.partition_count,
                new_count
            );
        } else {
            debug!("topic {} partition count changed from {} to {}", self.name(), state.partition_count, new_count);
        }

        let old_count = state.partition_count;
        let mut new_parts = Vec::with_capacity(new_count);

        for i in 0..new_count {
            if i < old_count {
                new_parts.push(state.parts[i].keep());
            } else {
                let id = i as PartitionId;
                if let Some(pos) = state.desired_unseen.iter().position(|p| p.partition_id() == id) {
                    let part = state.desired_unseen.remove(pos);
                    part.set_unknown(false);
                    new_parts.push(part);
                } else {
                    new_parts.push(Partition::new(id, Arc::downgrade(&self.inner)));
                }
            }
        }

        let ua = state.ua.clone();

        for i in new_count..old_count {
            let part = state.parts[i].keep();

            match ua.as_ref() {
                Some(ua) => Partition::move_msgs(ua, &part),
                None => part.purge_msg_queue(|_msg: Message| {}),
            }

            if part.flags().desired {
                debug_assert!(!part.flags().unknown, "desired partition re-entering desp list must not already be unknown");
                part.set_unknown(true);
                state.desired_unseen.push(part.keep());
            }

            part.release();
        }

        state.parts = new_parts;
        state.partition_count = new_count;

        1
    }

    /// Move all known partitions' and the UA partition's messages out
    /// (purging them) and tear the partition array down. The topic itself
    /// survives — per §9, destruction is deferred to `Arc`'s own refcount,
    /// not forced here.
    pub fn partitions_remove(&self) {
        let mut state = self.inner.state.write().unwrap();

        for part in state.parts.drain(..) {
            part.purge_msg_queue(|_msg: Message| {});
            part.release();
        }
        state.partition_count = 0;

        if let Some(ua) = state.ua.take() {
            ua.purge_msg_queue(|_msg: Message| {});
            ua.release();
        }
    }

    /// Drain the UA queue and resolve each message to a partition: a message
    /// carrying an explicit `partition_hint` other than the UA sentinel uses
    /// that partition directly; everything else goes through the
    /// partitioner. Messages that still can't be placed (unknown hint
    /// partition, or the partitioner declining) are shunted back onto the UA
    /// queue, in their original relative order, preserving overall message
    /// order for the subset that's still waiting (P5).
    pub fn assign_uas(&self) {
        let ua = match self.inner.state.read().unwrap().ua.clone() {
            Some(ua) => ua,
            None => {
                debug!("topic {}: no UA partition available", self.name());
                return;
            }
        };

        let mut uas = ua.take_msg_queue();
        let mut msgs = Vec::with_capacity(uas.len());
        uas.purge(|m: Message| msgs.push(m));
        let total = msgs.len();

        let mut failed = MsgQueue::new();
        for msg in msgs {
            let partition_id = match msg.partition_hint {
                Some(id) if id != UNASSIGNED_PARTITION => Ok(id),
                _ => self.inner.config.partitioner.partition(self, msg.key.as_deref(), &msg),
            };

            match partition_id.ok().and_then(|id| self.lookup_partition(id, false)) {
                Some(part) => part.enq_msg(msg),
                None => failed.enqueue(msg),
            }
        }

        debug!("topic {}: {}/{} messages were partitioned", self.name(), total - failed.len(), total);

        if !failed.is_empty() {
            ua.insert_queue(&mut failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Message;
    use bytes::Bytes;

    fn topic() -> Topic {
        Topic::new_for_test("orders", TopicConfig::default())
    }

    #[test]
    fn idempotent_desired_add_roundtrip() {
        let t = topic();
        let part = t.desired_add(3);
        assert!(part.flags().desired);
        assert!(part.flags().unknown);
        assert!(t.desired_get(3).is_some());
        assert!(t.lookup_partition(3, false).is_none());
    }

    /// Two threads racing `desired_add` for the same id must not each create
    /// their own `Part` and push a duplicate onto `desired_unseen` (§3(2)):
    /// the lookup-then-push sequence runs under one held write-lock guard,
    /// so whichever thread loses the race observes the winner's entry
    /// instead of missing it and creating a second one.
    #[test]
    fn concurrent_desired_add_for_same_id_does_not_duplicate() {
        let t = topic();
        let other = t.keep();

        let handle = std::thread::spawn(move || other.desired_add(3));
        let here = t.desired_add(3);
        let there = handle.join().unwrap();

        assert!(here == there, "both callers must observe the same Part, not two duplicates");
        assert_eq!(t.desired_unseen_count(3), 1);
    }

    #[test]
    fn partition_count_growth_absorbs_desired() {
        let t = topic();
        let desired = t.desired_add(3);

        let changed = t.update_partition_count(5);
        assert_eq!(changed, 1);

        assert!(t.desired_get(3).is_none());
        let p3 = t.lookup_partition(3, false).expect("partition 3 now known");
        assert!(p3 == desired);
        assert!(p3.flags().desired);
        assert!(!p3.flags().unknown);

        for id in [0, 1, 2, 4] {
            let p = t.lookup_partition(id, false).expect("newly minted partition");
            assert!(!p.flags().desired);
        }
    }

    #[test]
    fn partition_count_shrink_preserves_messages_in_ua() {
        let t = topic();
        t.update_partition_count(3);

        let p2 = t.lookup_partition(2, false).unwrap();
        p2.enq_msg(Message::new(None, Some(Bytes::from_static(b"a"))));
        p2.enq_msg(Message::new(None, Some(Bytes::from_static(b"b"))));

        let changed = t.update_partition_count(2);
        assert_eq!(changed, 1);
        assert_eq!(t.partition_count(), 2);
        assert!(t.lookup_partition(2, false).is_none());

        let ua = t.lookup_partition(UNASSIGNED_PARTITION, true).unwrap();
        let snapshot = ua.msg_queue_snapshot();
        let values: Vec<&[u8]> = snapshot.iter().map(|m| m.value.as_ref().unwrap().as_ref()).collect();
        assert_eq!(values, vec![b"a" as &[u8], b"b"]);
    }

    #[test]
    fn desired_del_releases_only_when_removed_from_list() {
        let t = topic();
        let part = t.desired_add(7);
        assert_eq!(part.strong_count(), 2); // caller's handle + the list's

        t.desired_del(&part);
        assert!(t.desired_get(7).is_none());
        assert!(!part.flags().desired);
        assert_eq!(part.strong_count(), 1);
    }

    #[test]
    fn desired_del_on_promoted_partition_does_not_release() {
        let t = topic();
        t.desired_add(3);
        t.update_partition_count(5);

        let part = t.lookup_partition(3, false).unwrap();
        let count_before = part.strong_count();

        t.desired_del(&part);

        assert!(!part.flags().desired);
        assert_eq!(part.strong_count(), count_before);
    }

    #[test]
    fn ua_drain_partial_failure_preserves_order() {
        let t = topic();
        t.update_partition_count(2);

        let ua = t.lookup_partition(UNASSIGNED_PARTITION, true).unwrap();
        ua.enq_msg(Message::new(None, Some(Bytes::from_static(b"m1"))).with_partition_hint(0));
        ua.enq_msg(Message::new(None, Some(Bytes::from_static(b"m2"))).with_partition_hint(5));
        ua.enq_msg(Message::new(None, Some(Bytes::from_static(b"m3"))).with_partition_hint(1));

        t.assign_uas();

        let remaining = ua.msg_queue_snapshot();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].value.as_ref().unwrap().as_ref(), b"m2" as &[u8]);

        let p0 = t.lookup_partition(0, false).unwrap();
        assert_eq!(p0.msg_queue_snapshot()[0].value.as_ref().unwrap().as_ref(), b"m1" as &[u8]);
        let p1 = t.lookup_partition(1, false).unwrap();
        assert_eq!(p1.msg_queue_snapshot()[0].value.as_ref().unwrap().as_ref(), b"m3" as &[u8]);
    }

    #[test]
    fn partitions_remove_empties_topic() {
        let t = topic();
        t.update_partition_count(3);
        assert_eq!(t.partition_count(), 3);

        t.partitions_remove();

        assert_eq!(t.partition_count(), 0);
        assert!(t.lookup_partition(0, false).is_none());
        assert!(t.lookup_partition(UNASSIGNED_PARTITION, true).is_none());
    }
}
