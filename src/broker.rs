//! External collaborator: the broker connection state machine and its wire
//! I/O pipeline are out of scope (§1). What the topology updater (C5) needs
//! from a broker is narrow enough to model directly: an identity, a name for
//! diagnostics, and the rwlock-guarded set of partitions it currently leads.
//! This is the minimal stand-in the spec's §6 "Consumed from external
//! collaborators" section describes, not a connection.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::partition::Partition;

/// A lightweight, copyable identifier for a broker node, independent of
/// whether the broker is currently known. Modeled after the teacher's own
/// `BrokerRef` (see `client/cluster.rs` in the surrounding examples).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BrokerRef(pub i32);

impl BrokerRef {
    pub fn node_id(&self) -> i32 {
        self.0
    }
}

struct BrokerInner {
    node_id: i32,
    host: String,
    port: u16,
    partitions: RwLock<HashSet<Partition>>,
}

/// A broker node in the cluster, known to this client only as the target of
/// leader delegation. `Broker` is reference-counted the same way `Partition`
/// and `Topic` are; `keep`/`release` are `Arc::clone`/`drop`.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker").field("name", &self.name()).finish()
    }
}

impl PartialEq for Broker {
    fn eq(&self, other: &Broker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Broker {}

impl Broker {
    pub fn new(node_id: i32, host: impl Into<String>, port: u16) -> Self {
        Broker {
            inner: Arc::new(BrokerInner {
                node_id,
                host: host.into(),
                port,
                partitions: RwLock::new(HashSet::new()),
            }),
        }
    }

    pub fn node_id(&self) -> i32 {
        self.inner.node_id
    }

    pub fn as_ref(&self) -> BrokerRef {
        BrokerRef(self.inner.node_id)
    }

    /// `host:port`, used only for log lines.
    pub fn name(&self) -> String {
        format!("{}:{}", self.inner.host, self.inner.port)
    }

    pub fn keep(&self) -> Broker {
        Broker { inner: Arc::clone(&self.inner) }
    }

    pub fn release(self) {
        drop(self)
    }

    /// Number of partitions currently led by this broker.
    pub fn part_count(&self) -> usize {
        self.inner.partitions.read().unwrap().len()
    }

    /// Link `part` into this broker's partition list. Takes the broker's
    /// rwlock for writing, as `parts_wrlock`/`parts_unlock` do in the spec.
    pub(crate) fn link(&self, part: Partition) {
        self.inner.partitions.write().unwrap().insert(part);
    }

    /// Unlink `part` from this broker's partition list.
    pub(crate) fn unlink(&self, part: &Partition) {
        self.inner.partitions.write().unwrap().remove(part);
    }

    pub fn contains(&self, part: &Partition) -> bool {
        self.inner.partitions.read().unwrap().contains(part)
    }
}

/// Process-wide table of known brokers, owned by the client handle.
/// Keyed by node id, mirroring `rd_kafka_broker_find_by_nodeid`.
#[derive(Default)]
pub struct BrokerTable {
    brokers: RwLock<std::collections::HashMap<i32, Broker>>,
}

impl BrokerTable {
    pub fn new() -> Self {
        BrokerTable { brokers: RwLock::new(std::collections::HashMap::new()) }
    }

    pub fn add(&self, broker: Broker) {
        self.brokers.write().unwrap().insert(broker.node_id(), broker);
    }

    /// Find the broker by node id. Returns a kept (cloned) handle on hit.
    pub fn find_by_node_id(&self, node_id: i32) -> Option<Broker> {
        self.brokers.read().unwrap().get(&node_id).map(Broker::keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Partition;

    #[test]
    fn link_and_unlink_round_trip() {
        let broker = Broker::new(1, "localhost", 9092);
        let part = Partition::new_orphan(0);

        broker.link(part.keep());
        assert_eq!(broker.part_count(), 1);
        assert!(broker.contains(&part));

        broker.unlink(&part);
        assert_eq!(broker.part_count(), 0);
        assert!(!broker.contains(&part));
    }

    #[test]
    fn find_by_node_id_bumps_refcount() {
        let table = BrokerTable::new();
        let broker = Broker::new(7, "host", 9092);
        table.add(broker.keep());

        let found = table.find_by_node_id(7).expect("broker present");
        assert_eq!(found.node_id(), 7);
        assert!(table.find_by_node_id(99).is_none());
    }
}
