//! Workload flows: the fixed message sequence run against one entity.

use std::rc::Rc;

use async_trait::async_trait;

use crate::deadline::Deadline;
use crate::error::ActorError;
use crate::runtime::{Worker, WorkerRef};

/// The exchange performed against a single entity during Run.
///
/// `total_messages` is fixed for the lifetime of the flow and must be
/// positive. `execute` is called once per entity identifier per iteration,
/// concurrently for all entities.
#[async_trait(?Send)]
pub trait WorkloadFlow: 'static {
    /// Worker type the flow exercises.
    type Worker: Worker;

    /// Messages sent to each entity per execution.
    fn total_messages(&self) -> usize;

    /// Run the flow for `entity_id` through `root`, the head reference.
    async fn execute(
        &self,
        root: &WorkerRef<Self::Worker>,
        entity_id: &str,
        deadline: &Deadline,
    ) -> Result<(), ActorError>;
}

type MessageFactory<M> = Rc<dyn Fn(&str) -> M>;
type ReplyCheck<R> = Rc<dyn Fn(&str, &R) -> Result<(), String>>;

/// `total - 1` tells followed by one ask, all for the same entity.
pub struct RoundTripFlow<W: Worker> {
    total: usize,
    message: MessageFactory<W::Message>,
    verify: Option<ReplyCheck<W::Reply>>,
}

impl<W: Worker> Clone for RoundTripFlow<W> {
    fn clone(&self) -> Self {
        Self {
            total: self.total,
            message: self.message.clone(),
            verify: self.verify.clone(),
        }
    }
}

impl<W: Worker> RoundTripFlow<W> {
    /// Flow of `total` messages built by `message` from the entity id.
    pub fn new<F>(total: usize, message: F) -> Self
    where
        F: Fn(&str) -> W::Message + 'static,
    {
        Self {
            total,
            message: Rc::new(message),
            verify: None,
        }
    }

    /// Check the final reply; an `Err` fails the flow with
    /// [`ActorError::UnexpectedReply`].
    pub fn with_verifier<F>(mut self, verify: F) -> Self
    where
        F: Fn(&str, &W::Reply) -> Result<(), String> + 'static,
    {
        self.verify = Some(Rc::new(verify));
        self
    }
}

#[async_trait(?Send)]
impl<W: Worker> WorkloadFlow for RoundTripFlow<W> {
    type Worker = W;

    fn total_messages(&self) -> usize {
        self.total
    }

    async fn execute(
        &self,
        root: &WorkerRef<W>,
        entity_id: &str,
        deadline: &Deadline,
    ) -> Result<(), ActorError> {
        for _ in 1..self.total {
            root.tell((self.message)(entity_id))?;
        }

        let reply = root.ask((self.message)(entity_id), deadline).await?;
        if let Some(verify) = &self.verify {
            verify(entity_id, &reply).map_err(ActorError::UnexpectedReply)?;
        }
        tracing::trace!(entity_id, total = self.total, "flow completed");
        Ok(())
    }
}
