//! Message extractors: how a router learns which entity a message is for.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Pulls the entity identifier (and the payload to deliver) out of a message.
pub trait MessageExtractor<M>: 'static {
    /// Entity the message is addressed to.
    ///
    /// `None` or an empty string marks the message as unroutable.
    fn entity_id(&self, message: &M) -> Option<String>;

    /// The payload handed to the entity worker. Defaults to the message.
    fn entity_message(&self, message: M) -> M {
        message
    }

    /// Shard owning `entity_id`. Equal ids always map to the same shard.
    fn shard_id(&self, entity_id: &str) -> u32;
}

/// Messages that name the entity they target.
pub trait WithEntityId {
    /// Identifier of the target entity.
    fn entity_id(&self) -> &str;
}

/// Extractor driven by a closure, with shards assigned by hashing the
/// entity identifier modulo `max_shards`.
pub struct HashCodeMessageExtractor<M> {
    extract: Box<dyn Fn(&M) -> Option<String>>,
    max_shards: u32,
}

impl<M: 'static> HashCodeMessageExtractor<M> {
    /// Extractor using `extract` to read the identifier.
    ///
    /// A `max_shards` of zero is treated as one shard.
    pub fn new<F>(max_shards: u32, extract: F) -> Self
    where
        F: Fn(&M) -> Option<String> + 'static,
    {
        Self {
            extract: Box::new(extract),
            max_shards: max_shards.max(1),
        }
    }

    /// Number of shards identifiers are spread over.
    pub fn max_shards(&self) -> u32 {
        self.max_shards
    }
}

impl<M: WithEntityId + 'static> HashCodeMessageExtractor<M> {
    /// Extractor for messages implementing [`WithEntityId`].
    pub fn for_entities(max_shards: u32) -> Self {
        Self::new(max_shards, |message: &M| {
            Some(message.entity_id().to_string())
        })
    }
}

impl<M: 'static> MessageExtractor<M> for HashCodeMessageExtractor<M> {
    fn entity_id(&self, message: &M) -> Option<String> {
        (self.extract)(message)
    }

    fn shard_id(&self, entity_id: &str) -> u32 {
        // DefaultHasher::new() uses fixed keys, so shards are stable across hosts.
        let mut hasher = DefaultHasher::new();
        entity_id.hash(&mut hasher);
        (hasher.finish() % u64::from(self.max_shards)) as u32
    }
}
