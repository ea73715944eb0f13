//! Host: one running instance of the in-process actor runtime.
//!
//! A host owns the mailbox loops of every actor spawned on it, a registry
//! of head actors, and optionally a cluster membership. Its bootstrap
//! closure (the wiring installed by a topology configurator) runs once when
//! the host starts.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──start()──► Running ──stop()──► Stopped
//!    │                    │
//!    │            bootstrap error
//!    │                    ▼
//!    └──stop()──►      Failed ──stop()──► Stopped
//! ```
//!
//! All mailbox loops are `spawn_local` tasks: hosts must be driven from
//! inside a `tokio::task::LocalSet`, and must be stopped to release their
//! actors.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cluster::Cluster;
use crate::deadline::Deadline;
use crate::error::{ClusterError, HostError};

use super::actor_ref::ActorRef;
use super::registry::ActorRegistry;
use super::worker::{run_mailbox, ActorContext, Worker, WorkerRef};

/// Lifecycle state of a [`Host`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Built, not started.
    Created,
    /// Started; actors may be spawned.
    Running,
    /// Bootstrap failed; must still be stopped.
    Failed,
    /// Stopped; terminal.
    Stopped,
}

type Bootstrap = Box<dyn FnOnce(&Host) -> Result<(), HostError>>;

struct HostInner {
    name: String,
    index: usize,
    state: Cell<HostState>,
    shutdown: CancellationToken,
    tasks: RefCell<Vec<JoinHandle<()>>>,
    registry: ActorRegistry,
    cluster: RefCell<Option<Cluster>>,
    bootstrap: RefCell<Option<Bootstrap>>,
}

/// Handle to one runtime instance. Cloning shares the instance.
#[derive(Clone)]
pub struct Host {
    inner: Rc<HostInner>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.inner.name)
            .field("index", &self.inner.index)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

impl Host {
    /// Create a host with no bootstrap wiring.
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            inner: Rc::new(HostInner {
                name: name.into(),
                index,
                state: Cell::new(HostState::Created),
                shutdown: CancellationToken::new(),
                tasks: RefCell::new(Vec::new()),
                registry: ActorRegistry::new(),
                cluster: RefCell::new(None),
                bootstrap: RefCell::new(None),
            }),
        }
    }

    /// Create a host whose `bootstrap` runs when it starts.
    pub fn with_bootstrap<F>(name: impl Into<String>, index: usize, bootstrap: F) -> Self
    where
        F: FnOnce(&Host) -> Result<(), HostError> + 'static,
    {
        let host = Self::new(name, index);
        *host.inner.bootstrap.borrow_mut() = Some(Box::new(bootstrap));
        host
    }

    /// Host name, `<instance name>-<index>`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Position of this host among the instances of its configuration.
    pub fn index(&self) -> usize {
        self.inner.index
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HostState {
        self.inner.state.get()
    }

    /// Whether actors can be spawned.
    pub fn is_running(&self) -> bool {
        self.state() == HostState::Running
    }

    /// The head-actor registry.
    pub fn registry(&self) -> &ActorRegistry {
        &self.inner.registry
    }

    /// The cluster this host joined, if any.
    pub fn cluster(&self) -> Option<Cluster> {
        self.inner.cluster.borrow().clone()
    }

    /// Number of mailbox loops spawned on this host and not yet stopped.
    pub fn actor_count(&self) -> usize {
        self.inner
            .tasks
            .borrow()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    pub(crate) fn join_cluster(&self, cluster: Cluster) -> Result<(), ClusterError> {
        if !self.is_running() {
            return Err(ClusterError::NotRunning(self.inner.name.clone()));
        }
        let mut slot = self.inner.cluster.borrow_mut();
        if slot.is_some() {
            return Err(ClusterError::AlreadyMember(self.inner.name.clone()));
        }
        *slot = Some(cluster);
        Ok(())
    }

    pub(crate) fn downgrade(&self) -> WeakHost {
        WeakHost(Rc::downgrade(&self.inner))
    }

    /// Start the host and run its bootstrap wiring.
    pub async fn start(&self, deadline: &Deadline) -> Result<(), HostError> {
        if self.state() != HostState::Created {
            return Err(HostError::AlreadyStarted(self.inner.name.clone()));
        }
        deadline.check().map_err(|source| HostError::StartTimeout {
            host: self.inner.name.clone(),
            source,
        })?;

        self.inner.state.set(HostState::Running);

        let bootstrap = self.inner.bootstrap.borrow_mut().take();
        if let Some(bootstrap) = bootstrap {
            if let Err(e) = bootstrap(self) {
                self.inner.state.set(HostState::Failed);
                tracing::error!(host = %self.inner.name, error = %e, "host bootstrap failed");
                return Err(match e {
                    e @ HostError::StartFailed { .. } => e,
                    other => HostError::StartFailed {
                        host: self.inner.name.clone(),
                        reason: other.to_string(),
                    },
                });
            }
        }

        // Give freshly spawned mailbox loops their first turn.
        deadline
            .run(tokio::task::yield_now())
            .await
            .map_err(|source| HostError::StartTimeout {
                host: self.inner.name.clone(),
                source,
            })?;

        tracing::debug!(
            host = %self.inner.name,
            actors = self.actor_count(),
            "host started"
        );
        Ok(())
    }

    /// Stop every actor on this host.
    ///
    /// Waits for the mailbox loops to exit until `deadline`; loops still
    /// running at that point are aborted and reported as
    /// [`HostError::StopTimeout`]. A host is stopped once: a second call
    /// returns [`HostError::NotRunning`].
    pub async fn stop(&self, deadline: &Deadline) -> Result<(), HostError> {
        match self.state() {
            HostState::Stopped => return Err(HostError::NotRunning(self.inner.name.clone())),
            HostState::Created => {
                self.inner.state.set(HostState::Stopped);
                return Ok(());
            }
            HostState::Running | HostState::Failed => {}
        }

        self.inner.state.set(HostState::Stopped);
        self.inner.shutdown.cancel();
        if let Some(cluster) = self.inner.cluster.borrow_mut().take() {
            cluster.leave(self.inner.index);
        }

        let mut tasks: Vec<JoinHandle<()>> = self.inner.tasks.borrow_mut().drain(..).collect();
        let total = tasks.len();

        let drained = deadline
            .run(async {
                for task in tasks.iter_mut() {
                    if let Err(e) = task.await {
                        if e.is_panic() {
                            tracing::warn!(host = %self.inner.name, "actor panicked");
                        }
                    }
                }
            })
            .await;

        match drained {
            Ok(()) => {
                tracing::debug!(host = %self.inner.name, actors = total, "host stopped");
                Ok(())
            }
            Err(_) => {
                let pending = tasks.iter().filter(|task| !task.is_finished()).count();
                for task in &tasks {
                    task.abort();
                }
                Err(HostError::StopTimeout {
                    host: self.inner.name.clone(),
                    pending,
                })
            }
        }
    }

    /// Spawn `worker` at `<host>/user/<name>`.
    pub fn spawn<W: Worker>(&self, name: &str, worker: W) -> Result<WorkerRef<W>, HostError> {
        self.spawn_at(Rc::from(format!("{}/user/{}", self.inner.name, name)), worker)
    }

    pub(crate) fn spawn_at<W: Worker>(
        &self,
        path: Rc<str>,
        worker: W,
    ) -> Result<WorkerRef<W>, HostError> {
        if !self.is_running() {
            return Err(HostError::NotRunning(self.inner.name.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = ActorContext::new(path.clone(), self.clone());
        let task = tokio::task::spawn_local(run_mailbox(
            worker,
            ctx,
            rx,
            self.inner.shutdown.clone(),
        ));
        self.inner.tasks.borrow_mut().push(task);

        tracing::trace!(actor = %path, "actor spawned");
        Ok(ActorRef::new(path, tx))
    }
}

/// Non-owning handle to a host, held by cluster membership.
#[derive(Clone)]
pub(crate) struct WeakHost(Weak<HostInner>);

impl WeakHost {
    pub(crate) fn upgrade(&self) -> Option<Host> {
        self.0.upgrade().map(|inner| Host { inner })
    }
}
