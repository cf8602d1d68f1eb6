//! Error kinds reported by the topic/partition state core.
//!
//! These are distinct from `KafkaCode`, the numeric error codes a broker
//! returns in a protocol response body — that translation lives in the wire
//! codec, which this crate does not implement. The errors here describe
//! failures of the in-memory model itself: bad configuration, lookup misses,
//! and metadata that is inconsistent with what the client already knows.

use crate::partition::PartitionId;

error_chain! {
    errors {
        /// `Topic::new` was given an empty name or a non-positive timeout.
        InvalidConfig(reason: &'static str) {
            description("invalid topic configuration")
            display("invalid topic configuration: {}", reason)
        }

        /// A lookup (topic, partition, broker, or the UA slot) came up empty.
        NotFound(what: &'static str) {
            description("not found")
            display("{} not found", what)
        }

        /// A metadata event named a partition id the topic does not know
        /// about. This means the client's view of the cluster and the
        /// cluster itself have diverged; the caller must not paper over it
        /// by silently creating the missing partition.
        InconsistentState(topic: String, partition: PartitionId) {
            description("inconsistent topic/partition state")
            display("topic {} has no partition {}, but metadata named it", topic, partition)
        }
    }
}
