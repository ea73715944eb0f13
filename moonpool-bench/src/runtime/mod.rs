//! In-process actor runtime.
//!
//! Hosts run workers, one mailbox loop each. References carry the original
//! sender's reply channel so a message can be forwarded through any number
//! of intermediaries and still be answered directly.

mod actor_ref;
mod host;
mod registry;
mod worker;

pub use actor_ref::{ActorRef, ReplyTo};
pub use host::{Host, HostState};
pub(crate) use host::WeakHost;
pub use registry::ActorRegistry;
pub use worker::{ActorContext, Worker, WorkerRef};
