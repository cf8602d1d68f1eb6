//! Ambient configuration. Modeled after the teacher's own `ClientConfig`
//! builder (`client/mod.rs`): plain structs with `Default` impls supplying
//! the same constants the original ships, plus a fluent builder for the
//! knobs this core actually reads.

use std::sync::Arc;

use crate::partitioner::{Partitioner, RandomPartitioner};

/// Per-topic configuration. Validated by `Topic::construct`; invalid values
/// surface as `ErrorKind::InvalidConfig`.
#[derive(Clone)]
pub struct TopicConfig {
    /// How long a produced message may sit in a partition's queue before
    /// it's considered expired. Out of scope for this core to act on
    /// (delivery timeout enforcement lives with the transmit path) but
    /// carried here since topics are created with it.
    pub message_timeout_ms: i64,
    /// Upper bound for a single broker request/response round trip.
    pub request_timeout_ms: i64,
    /// Resolves UA messages to a concrete partition. Defaults to
    /// `RandomPartitioner`, matching `rd_kafka_topic_new`'s fallback when no
    /// partitioner is configured.
    pub partitioner: Arc<dyn Partitioner>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        TopicConfig {
            message_timeout_ms: 300_000,
            request_timeout_ms: 30_000,
            partitioner: Arc::new(RandomPartitioner::default()),
        }
    }
}

impl TopicConfig {
    pub fn with_partitioner(mut self, partitioner: impl Partitioner + 'static) -> Self {
        self.partitioner = Arc::new(partitioner);
        self
    }

    pub fn with_message_timeout_ms(mut self, ms: i64) -> Self {
        self.message_timeout_ms = ms;
        self
    }

    pub fn with_request_timeout_ms(mut self, ms: i64) -> Self {
        self.request_timeout_ms = ms;
        self
    }
}

/// Client-wide configuration. Narrow by design (§1 out-of-scope: connection
/// pooling, wire protocol negotiation, SASL/TLS) — this core only needs a
/// default topic config template and a client id for log lines.
#[derive(Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub default_topic_config: TopicConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig { client_id: "rdkafka-rs".to_owned(), default_topic_config: TopicConfig::default() }
    }
}
