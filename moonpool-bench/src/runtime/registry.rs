//! Per-host registry of head actors.
//!
//! The wiring installed on a host registers the entry point of the workload
//! (usually an entity router) under the worker type it fronts. The
//! orchestrator later resolves it by the same type, waiting until it shows
//! up or the deadline expires.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

use tokio::sync::Notify;

use crate::deadline::{Deadline, DeadlineExceeded};

use super::worker::{Worker, WorkerRef};

/// Type-keyed lookup of actor references.
#[derive(Default)]
pub struct ActorRegistry {
    entries: RefCell<HashMap<TypeId, Box<dyn Any>>>,
    registered: Notify,
}

impl ActorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `actor` as the entry point for worker type `W`.
    ///
    /// Returns `false` if an earlier registration was replaced.
    pub fn register<W: Worker>(&self, actor: WorkerRef<W>) -> bool {
        let previous = self
            .entries
            .borrow_mut()
            .insert(TypeId::of::<W>(), Box::new(actor));
        self.registered.notify_waiters();
        previous.is_none()
    }

    /// The entry point registered for `W`, if any.
    pub fn get<W: Worker>(&self) -> Option<WorkerRef<W>> {
        self.entries
            .borrow()
            .get(&TypeId::of::<W>())
            .and_then(|entry| entry.downcast_ref::<WorkerRef<W>>())
            .cloned()
    }

    /// Whether something is registered for `W`.
    pub fn contains<W: Worker>(&self) -> bool {
        self.entries.borrow().contains_key(&TypeId::of::<W>())
    }

    /// Wait until `W` is registered, or fail when `deadline` expires.
    pub async fn resolve<W: Worker>(
        &self,
        deadline: &Deadline,
    ) -> Result<WorkerRef<W>, DeadlineExceeded> {
        loop {
            // Created before the lookup so a registration in between is not missed.
            let registered = self.registered.notified();
            if let Some(actor) = self.get::<W>() {
                return Ok(actor);
            }
            deadline.run(registered).await?;
        }
    }

    /// Number of registered entry points.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
