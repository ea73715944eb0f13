//! Entity router: one lazily created worker per entity identifier.
//!
//! The router is itself a [`Worker`]. Its table of entity workers is only
//! touched from its own mailbox loop, so concurrent first messages for the
//! same new identifier are serialized and create a single worker.
//!
//! Messages are forwarded with the original [`ReplyTo`], so the entity
//! worker answers the caller directly.
//!
//! When the host belongs to a [`Cluster`](crate::cluster::Cluster), each
//! identifier's shard is owned by one member; messages for a shard owned
//! elsewhere are forwarded to the owner's router.

mod extractor;
mod stats;

use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;

use crate::error::ActorError;
use crate::runtime::{ActorContext, ReplyTo, Worker, WorkerRef};

pub use extractor::{HashCodeMessageExtractor, MessageExtractor, WithEntityId};
pub use stats::{RouterSnapshot, RouterStats};

/// Creates the worker for a new entity identifier.
pub type WorkerFactory<W> = Rc<dyn Fn(&str) -> W>;

/// Observer called with each message the router drops as unroutable.
pub type DropObserver<M> = Rc<dyn Fn(&M)>;

/// Routes messages to per-entity workers of type `W`.
pub struct EntityRouter<W: Worker> {
    extractor: Rc<dyn MessageExtractor<W::Message>>,
    factory: WorkerFactory<W>,
    workers: HashMap<String, WorkerRef<W>>,
    stats: RouterStats,
    on_unroutable: Option<DropObserver<W::Message>>,
}

impl<W: Worker> EntityRouter<W> {
    /// Router reading identifiers with `extractor` and creating workers
    /// with `factory`.
    pub fn new(
        extractor: Rc<dyn MessageExtractor<W::Message>>,
        factory: WorkerFactory<W>,
    ) -> Self {
        Self {
            extractor,
            factory,
            workers: HashMap::new(),
            stats: RouterStats::new(),
            on_unroutable: None,
        }
    }

    /// Report into `stats` instead of private counters.
    pub fn with_stats(mut self, stats: RouterStats) -> Self {
        self.stats = stats;
        self
    }

    /// Call `observer` with every dropped message.
    pub fn on_unroutable(mut self, observer: DropObserver<W::Message>) -> Self {
        self.on_unroutable = Some(observer);
        self
    }

    /// The router's counters.
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    fn drop_unroutable(&self, ctx: &ActorContext, message: &W::Message) {
        self.stats.record_dropped();
        tracing::debug!(router = %ctx.path(), "dropping message without entity identifier");
        if let Some(observer) = &self.on_unroutable {
            observer(message);
        }
    }

    /// Router of the cluster member owning `entity_id`, if that is not us.
    fn remote_owner(
        &self,
        ctx: &ActorContext,
        entity_id: &str,
    ) -> Result<Option<WorkerRef<W>>, ActorError> {
        let Some(cluster) = ctx.host().cluster() else {
            return Ok(None);
        };
        let shard = self.extractor.shard_id(entity_id);
        match cluster.owner_of(shard) {
            Some(owner) if owner.index() != ctx.host().index() => owner
                .registry()
                .get::<W>()
                .map(Some)
                .ok_or_else(|| {
                    ActorError::Unroutable(format!(
                        "no router on '{}' for entity '{}'",
                        owner.name(),
                        entity_id
                    ))
                }),
            _ => Ok(None),
        }
    }

    fn local_worker(
        &mut self,
        ctx: &ActorContext,
        entity_id: &str,
    ) -> Result<WorkerRef<W>, ActorError> {
        if let Some(worker) = self.workers.get(entity_id) {
            return Ok(worker.clone());
        }

        let worker = ctx
            .spawn_child(entity_id, (self.factory)(entity_id))
            .map_err(|e| ActorError::Handler(e.to_string()))?;
        self.stats.record_worker_created();
        tracing::trace!(router = %ctx.path(), entity_id, "entity worker created");
        self.workers.insert(entity_id.to_string(), worker.clone());
        Ok(worker)
    }
}

#[async_trait(?Send)]
impl<W: Worker> Worker for EntityRouter<W> {
    type Message = W::Message;
    type Reply = W::Reply;

    async fn receive(
        &mut self,
        ctx: &ActorContext,
        message: W::Message,
        sender: ReplyTo<W::Reply>,
    ) -> Result<(), ActorError> {
        let entity_id = match self.extractor.entity_id(&message) {
            Some(id) if !id.is_empty() => id,
            _ => {
                self.drop_unroutable(ctx, &message);
                return Ok(());
            }
        };
        if let Some(owner) = self.remote_owner(ctx, &entity_id)? {
            self.stats.record_forwarded();
            return owner.forward(message, sender);
        }

        let worker = self.local_worker(ctx, &entity_id)?;
        self.stats.record_routed();
        worker.forward(self.extractor.entity_message(message), sender)
    }
}
