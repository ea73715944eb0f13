//! Counting workload: every entity worker counts the messages it received
//! and replies with the running count.
//!
//! A flow of `total` messages therefore expects its final reply to report a
//! multiple of `total`: exactly `total` on the first iteration, `2 * total`
//! on the second, and so on.

use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::BenchmarkConfig;
use crate::error::{ActorError, ConfigError};
use crate::flow::RoundTripFlow;
use crate::router::{HashCodeMessageExtractor, MessageExtractor, WithEntityId};
use crate::runtime::{ActorContext, ReplyTo, Worker};
use crate::topology::TopologyConfigurator;

/// Messages each entity receives per iteration in the reference scenarios.
pub const MESSAGES_PER_ENTITY: usize = 10;

/// Entities exercised in the reference scenarios.
pub const DEFAULT_ENTITY_COUNT: usize = 100;

/// Shards per host used to size the extractor.
pub const SHARDS_PER_INSTANCE: usize = 10;

/// Request addressed to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMessage {
    /// Target entity.
    pub entity_id: String,
}

impl EntityMessage {
    /// Message for `entity_id`.
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
        }
    }
}

impl WithEntityId for EntityMessage {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }
}

/// Reply carrying the worker's running message count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReply {
    /// Entity that replied.
    pub entity_id: String,
    /// Messages processed so far, including the one being answered.
    pub processed: u64,
}

impl WithEntityId for EntityReply {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }
}

/// Worker counting the messages of one entity.
#[derive(Debug, Default)]
pub struct CountingWorker {
    entity_id: String,
    processed: u64,
}

impl CountingWorker {
    /// Worker for `entity_id`, nothing processed yet.
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            processed: 0,
        }
    }

    /// Messages processed so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

#[async_trait(?Send)]
impl Worker for CountingWorker {
    type Message = EntityMessage;
    type Reply = EntityReply;

    async fn receive(
        &mut self,
        _ctx: &ActorContext,
        message: EntityMessage,
        sender: ReplyTo<EntityReply>,
    ) -> Result<(), ActorError> {
        self.processed += 1;
        sender.reply(EntityReply {
            entity_id: message.entity_id,
            processed: self.processed,
        });
        Ok(())
    }
}

/// `actor-0` .. `actor-{count - 1}`.
pub fn entity_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("actor-{i}")).collect()
}

/// Check a final reply for `entity_id` after a flow of `total` messages.
pub fn verify_reply(entity_id: &str, reply: &EntityReply, total: usize) -> Result<(), String> {
    if reply.entity_id != entity_id {
        return Err(format!(
            "reply for '{}' came from '{}'",
            entity_id, reply.entity_id
        ));
    }
    let total = total as u64;
    if total == 0 || reply.processed == 0 || reply.processed % total != 0 {
        return Err(format!(
            "entity '{}' processed {} messages, expected a multiple of {}",
            entity_id, reply.processed, total
        ));
    }
    Ok(())
}

/// Flow of `total` messages per entity, verifying the final count.
pub fn counting_flow(total: usize) -> RoundTripFlow<CountingWorker> {
    RoundTripFlow::new(total, |entity_id: &str| EntityMessage::new(entity_id))
        .with_verifier(move |entity_id, reply: &EntityReply| verify_reply(entity_id, reply, total))
}

/// Entity-router topology over [`CountingWorker`]s for `entity_count`
/// entities, sharded `SHARDS_PER_INSTANCE` per host.
pub fn counting_topology(entity_count: usize) -> TopologyConfigurator<CountingWorker> {
    TopologyConfigurator::entity_router(
        |config: &BenchmarkConfig| {
            let shards = config.instance_count().saturating_mul(SHARDS_PER_INSTANCE);
            let shards = u32::try_from(shards).unwrap_or(u32::MAX);
            Rc::new(HashCodeMessageExtractor::<EntityMessage>::for_entities(shards))
                as Rc<dyn MessageExtractor<EntityMessage>>
        },
        |entity_id: &str| CountingWorker::new(entity_id),
        move |_: &BenchmarkConfig| entity_ids(entity_count),
    )
}

/// Three hosts named `ClusterSys-<n>`, joined into one cluster after start.
pub fn clustered_config() -> Result<BenchmarkConfig, ConfigError> {
    BenchmarkConfig::builder("Clustered (3 nodes)")
        .instances(3)
        .instance_name("ClusterSys")
        .clustered()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids() {
        assert_eq!(entity_ids(3), vec!["actor-0", "actor-1", "actor-2"]);
        assert!(entity_ids(0).is_empty());
    }

    #[test]
    fn test_verify_reply() {
        let reply = |id: &str, processed| EntityReply {
            entity_id: id.to_string(),
            processed,
        };
        assert!(verify_reply("actor-1", &reply("actor-1", 10), 10).is_ok());
        assert!(verify_reply("actor-1", &reply("actor-1", 20), 10).is_ok());
        assert!(verify_reply("actor-1", &reply("actor-1", 9), 10).is_err());
        assert!(verify_reply("actor-1", &reply("actor-2", 10), 10).is_err());
        assert!(verify_reply("actor-1", &reply("actor-1", 0), 10).is_err());
    }

    #[test]
    fn test_clustered_config() {
        let config = clustered_config().expect("valid");
        assert_eq!(config.instance_count(), 3);
        assert_eq!(config.host_name(0), "ClusterSys-0");
    }
}
