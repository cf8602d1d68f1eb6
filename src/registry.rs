//! C4: the client-wide topic registry.
//!
//! A name-keyed table of `Topic` handles, guarded by the client lock (see
//! `client.rs`). Mirrors `rkb_rk->rk_topics` and the linear
//! `rd_kafka_topic_find0` scan, just backed by a hash map instead of a
//! `TAILQ` since nothing here depends on insertion order.

use std::collections::HashMap;

use crate::topic::Topic;

#[derive(Default)]
pub struct TopicRegistry {
    topics: HashMap<String, Topic>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        TopicRegistry { topics: HashMap::new() }
    }

    /// `rd_kafka_topic_find0`: look up by exact name, returning a kept handle.
    pub fn find(&self, name: &str) -> Option<Topic> {
        self.topics.get(name).map(Topic::keep)
    }

    /// Register a newly constructed topic under `name`. Callers are
    /// expected to have already checked `find` while holding the same lock;
    /// this silently replaces any prior entry under the same name, which
    /// should never happen given that contract.
    pub fn insert(&mut self, name: String, topic: Topic) {
        self.topics.insert(name, topic);
    }

    pub fn remove(&mut self, name: &str) -> Option<Topic> {
        self.topics.remove(name)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Topic)> {
        self.topics.iter().map(|(k, v)| (k.as_str(), v))
    }
}
