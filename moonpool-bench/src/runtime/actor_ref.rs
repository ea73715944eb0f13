//! Actor references and reply channels.
//!
//! An [`ActorRef`] is the sending half of an actor's mailbox. Every message
//! travels in an envelope together with a [`ReplyTo`], the identity of the
//! original sender. Forwarding moves the envelope's `ReplyTo` along, so the
//! final recipient answers the original caller directly.

use std::fmt;
use std::rc::Rc;

use tokio::sync::{mpsc, oneshot};

use crate::deadline::Deadline;
use crate::error::ActorError;

/// A message plus the identity of whoever should receive the reply.
pub(crate) struct Envelope<M, R> {
    pub(crate) message: M,
    pub(crate) sender: ReplyTo<R>,
}

/// The reply channel of the original sender.
///
/// Fire-and-forget messages carry an empty `ReplyTo`; replying to it is a
/// no-op (the reply goes to dead letters). A `ReplyTo` obtained from an
/// [`ActorRef::ask`] that is dropped without a reply fails the asker with
/// [`ActorError::BrokenPromise`].
pub struct ReplyTo<R> {
    inner: Option<oneshot::Sender<R>>,
}

impl<R> ReplyTo<R> {
    /// A reply channel that discards replies.
    pub fn none() -> Self {
        Self { inner: None }
    }

    fn new(sender: oneshot::Sender<R>) -> Self {
        Self {
            inner: Some(sender),
        }
    }

    /// Whether someone is waiting for a reply.
    pub fn expects_reply(&self) -> bool {
        self.inner.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Send the reply. Returns `false` when nobody was listening.
    pub fn reply(self, value: R) -> bool {
        match self.inner {
            Some(tx) => tx.send(value).is_ok(),
            None => {
                tracing::trace!("reply to a fire-and-forget message dropped");
                false
            }
        }
    }
}

impl<R> fmt::Debug for ReplyTo<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyTo")
            .field("expects_reply", &self.expects_reply())
            .finish()
    }
}

/// Handle for sending `M` messages to an actor that replies with `R`.
pub struct ActorRef<M, R> {
    path: Rc<str>,
    tx: mpsc::UnboundedSender<Envelope<M, R>>,
}

impl<M, R> Clone for ActorRef<M, R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M, R> fmt::Debug for ActorRef<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef").field("path", &self.path).finish()
    }
}

impl<M: 'static, R: 'static> ActorRef<M, R> {
    pub(crate) fn new(path: Rc<str>, tx: mpsc::UnboundedSender<Envelope<M, R>>) -> Self {
        Self { path, tx }
    }

    /// Path of the actor, `<host>/user/<name>[/<child>...]`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the actor's mailbox loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Send without expecting a reply.
    pub fn tell(&self, message: M) -> Result<(), ActorError> {
        self.forward(message, ReplyTo::none())
    }

    /// Send on behalf of `sender`, so the recipient replies to it directly.
    pub fn forward(&self, message: M, sender: ReplyTo<R>) -> Result<(), ActorError> {
        self.tx
            .send(Envelope { message, sender })
            .map_err(|_| ActorError::MailboxClosed(self.path.to_string()))
    }

    /// Send and wait for the reply until `deadline`.
    pub async fn ask(&self, message: M, deadline: &Deadline) -> Result<R, ActorError> {
        deadline.check()?;
        let (tx, rx) = oneshot::channel();
        self.forward(message, ReplyTo::new(tx))?;

        match deadline.run(rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ActorError::BrokenPromise),
            Err(exceeded) => Err(exceeded.into()),
        }
    }
}
