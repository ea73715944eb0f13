//! Worker trait and the per-actor mailbox loop.
//!
//! # Turn-Based Concurrency
//!
//! Each spawned worker owns one mailbox and one processing loop. The loop
//! dequeues a message, awaits `receive()`, then dequeues the next one, so a
//! worker's state is only ever touched by its own loop and needs no lock.

use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{ActorError, HostError};

use super::actor_ref::{ActorRef, Envelope, ReplyTo};
use super::host::Host;

/// Reference to the mailbox of a worker type.
pub type WorkerRef<W> = ActorRef<<W as Worker>::Message, <W as Worker>::Reply>;

/// An actor: state plus a handler invoked one message at a time.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Counter { seen: u64 }
///
/// #[async_trait(?Send)]
/// impl Worker for Counter {
///     type Message = Ping;
///     type Reply = u64;
///
///     async fn receive(
///         &mut self,
///         _ctx: &ActorContext,
///         _message: Ping,
///         sender: ReplyTo<u64>,
///     ) -> Result<(), ActorError> {
///         self.seen += 1;
///         sender.reply(self.seen);
///         Ok(())
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait Worker: 'static {
    /// Messages this worker accepts.
    type Message: 'static;

    /// Replies this worker sends back to askers.
    type Reply: 'static;

    /// Handle one message. `sender` is the original caller.
    ///
    /// An error is logged and the worker keeps processing; the sender, if
    /// still owned, is dropped and its asker sees a broken promise.
    async fn receive(
        &mut self,
        ctx: &ActorContext,
        message: Self::Message,
        sender: ReplyTo<Self::Reply>,
    ) -> Result<(), ActorError>;
}

/// Context handed to a worker on every invocation.
pub struct ActorContext {
    path: Rc<str>,
    host: Host,
}

impl ActorContext {
    pub(crate) fn new(path: Rc<str>, host: Host) -> Self {
        Self { path, host }
    }

    /// Path of the running actor.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The host running this actor.
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Spawn a child worker at `<own path>/<name>`.
    pub fn spawn_child<W: Worker>(
        &self,
        name: &str,
        worker: W,
    ) -> Result<WorkerRef<W>, HostError> {
        self.host
            .spawn_at(Rc::from(format!("{}/{}", self.path, name)), worker)
    }
}

/// Processing loop for one actor.
///
/// Runs until the host's shutdown token fires or every [`ActorRef`] to the
/// mailbox is dropped.
pub(crate) async fn run_mailbox<W: Worker>(
    mut worker: W,
    ctx: ActorContext,
    mut mailbox: mpsc::UnboundedReceiver<Envelope<W::Message, W::Reply>>,
    shutdown: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = mailbox.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };

        if let Err(e) = worker
            .receive(&ctx, envelope.message, envelope.sender)
            .await
        {
            tracing::warn!(actor = %ctx.path(), error = %e, "worker failed to handle message");
        }
    }

    mailbox.close();
    tracing::trace!(actor = %ctx.path(), "mailbox loop stopped");
}
