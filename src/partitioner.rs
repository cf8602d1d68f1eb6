//! The partitioner decides which partition a message headed for the UA
//! (unassigned) slot should land on. Modeled as a trait with a single method,
//! per §9's design note ("the partitioner is a function reference stored on
//! the topic... model as an interface with a single method"); the default
//! implementation mirrors `rd_kafka_msg_partitioner_random`.

use std::fmt;

use rand::Rng;

use crate::partition::PartitionId;
use crate::queue::Message;
use crate::topic::Topic;

/// Returned when a partitioner cannot place a message — e.g. the topic
/// currently has no known partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unavailable;

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no partition available")
    }
}

impl std::error::Error for Unavailable {}

pub trait Partitioner: Send + Sync {
    fn partition(&self, topic: &Topic, key: Option<&[u8]>, msg: &Message) -> Result<PartitionId, Unavailable>;
}

/// Picks uniformly at random among the topic's known partitions, ignoring
/// the key. This is the default when no partitioner is configured, exactly
/// as `rd_kafka_topic_new` falls back to `rd_kafka_msg_partitioner_random`
/// when `rkt_conf.partitioner` is unset.
#[derive(Default)]
pub struct RandomPartitioner;

impl Partitioner for RandomPartitioner {
    fn partition(&self, topic: &Topic, _key: Option<&[u8]>, _msg: &Message) -> Result<PartitionId, Unavailable> {
        let count = topic.partition_count();
        if count == 0 {
            return Err(Unavailable);
        }
        let idx = rand::thread_rng().gen_range(0, count);
        Ok(idx as PartitionId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicConfig;

    #[test]
    fn random_partitioner_rejects_when_no_partitions() {
        let topic = Topic::new_for_test("orders", TopicConfig::default());
        let partitioner = RandomPartitioner::default();
        let msg = Message::new(None, None);
        assert_eq!(partitioner.partition(&topic, None, &msg), Err(Unavailable));
    }

    #[test]
    fn random_partitioner_stays_in_range() {
        let topic = Topic::new_for_test("orders", TopicConfig::default());
        topic.update_partition_count(4);
        let partitioner = RandomPartitioner::default();
        let msg = Message::new(None, None);
        for _ in 0..50 {
            let p = partitioner.partition(&topic, None, &msg).unwrap();
            assert!(p >= 0 && p < 4);
        }
    }
}
