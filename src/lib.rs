#![recursion_limit = "128"]
#![allow(dead_code)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;

mod broker;
mod client;
mod config;
mod error;
mod partition;
mod partitioner;
mod queue;
mod registry;
mod topic;
mod topology;

pub use crate::broker::{Broker, BrokerRef, BrokerTable};
pub use crate::client::{Client, LeaderQuery, NoopLeaderQuery};
pub use crate::config::{ClientConfig, TopicConfig};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::partition::{FetchState, Partition, PartitionFlags, PartitionId, UNASSIGNED_PARTITION};
pub use crate::partitioner::{Partitioner, RandomPartitioner, Unavailable};
pub use crate::queue::{Message, MsgQueue, ReleaseHook};
pub use crate::topic::Topic;
pub use crate::topology::{topic_assign_uas, topic_partition_cnt_update, topic_partitions_remove, topic_update, PartitionLeader};
