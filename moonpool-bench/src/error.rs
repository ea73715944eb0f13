//! Error types for the benchmark harness.
//!
//! Messaging and runtime-instance failures have their own enums; the
//! orchestrator folds them into [`BenchmarkError`], whose variants are the
//! four failure categories a caller has to tell apart: configuration,
//! startup, runtime and teardown.

use thiserror::Error;

use crate::deadline::DeadlineExceeded;
use crate::orchestrator::BenchmarkState;

/// Errors from sending messages to actors.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The target's mailbox loop has stopped.
    #[error("mailbox of '{0}' is closed")]
    MailboxClosed(String),

    /// The worker dropped the reply sender without replying.
    #[error("worker dropped the reply sender without replying")]
    BrokenPromise,

    /// No reply arrived before the deadline.
    #[error("request timed out")]
    Timeout,

    /// The request's deadline was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The message could not be delivered to the owner of its entity.
    #[error("unroutable message: {0}")]
    Unroutable(String),

    /// A reply arrived but did not match what the flow expected.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The worker failed while handling a message.
    #[error("handler error: {0}")]
    Handler(String),
}

impl From<DeadlineExceeded> for ActorError {
    fn from(err: DeadlineExceeded) -> Self {
        match err {
            DeadlineExceeded::Elapsed => ActorError::Timeout,
            DeadlineExceeded::Cancelled => ActorError::Cancelled,
        }
    }
}

impl ActorError {
    /// Whether this error comes from a deadline rather than a fault.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ActorError::Timeout | ActorError::Cancelled)
    }
}

/// Errors from the lifecycle of one runtime instance.
#[derive(Debug, Error)]
pub enum HostError {
    /// `start` was called on a host that is not freshly created.
    #[error("host '{0}' was already started")]
    AlreadyStarted(String),

    /// The operation requires a running host.
    #[error("host '{0}' is not running")]
    NotRunning(String),

    /// The host's bootstrap failed.
    #[error("host '{host}' failed to start: {reason}")]
    StartFailed {
        /// Host name.
        host: String,
        /// What went wrong.
        reason: String,
    },

    /// Start did not finish before its deadline.
    #[error("host '{host}' did not start in time: {source}")]
    StartTimeout {
        /// Host name.
        host: String,
        /// Elapsed or cancelled.
        source: DeadlineExceeded,
    },

    /// Mailbox loops were still running when the stop deadline passed.
    #[error("host '{host}' did not stop in time ({pending} task(s) still running)")]
    StopTimeout {
        /// Host name.
        host: String,
        /// Mailbox loops that had to be aborted.
        pending: usize,
    },

    /// The head actor was not registered before the deadline.
    #[error("'{key}' was not registered on host '{host}' in time: {source}")]
    Unresolved {
        /// Host name.
        host: String,
        /// Registry key (the worker type under test).
        key: &'static str,
        /// Elapsed or cancelled.
        source: DeadlineExceeded,
    },
}

/// Invalid benchmark configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration has no name.
    #[error("configuration name must not be empty")]
    EmptyName,

    /// The runtime instance name is empty.
    #[error("instance name must not be empty")]
    EmptyInstanceName,

    /// At least one runtime instance is required.
    #[error("instance count must be at least 1")]
    NoInstances,

    /// The entity-identifier generator yielded nothing.
    #[error("entity identifier set must contain at least one identifier")]
    NoEntities,

    /// An entity identifier is the empty string.
    #[error("entity identifier at position {0} is empty")]
    EmptyEntityId(usize),

    /// The flow declares no messages per entity.
    #[error("flow must send at least one message per entity")]
    NoMessages,
}

/// Failure reported by a lifecycle hook.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(String);

impl HookError {
    /// Create a hook error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ClusterError> for HookError {
    fn from(err: ClusterError) -> Self {
        Self(err.to_string())
    }
}

impl From<DeadlineExceeded> for HookError {
    fn from(err: DeadlineExceeded) -> Self {
        Self(err.to_string())
    }
}

/// Errors from forming a cluster out of several hosts.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Only running hosts can join.
    #[error("host '{0}' cannot join the cluster: not running")]
    NotRunning(String),

    /// The host is already a member of another cluster.
    #[error("host '{0}' already belongs to a cluster")]
    AlreadyMember(String),

    /// There was nothing to join.
    #[error("no hosts to join")]
    NoSeedNodes,

    /// Joining did not complete before the deadline.
    #[error("cluster join did not complete: {0}")]
    Deadline(#[from] DeadlineExceeded),
}

/// Errors from a completion barrier.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Not every flow signalled before the deadline.
    #[error("only {completed} of {expected} flows completed before the deadline")]
    TimedOut {
        /// Signals received.
        completed: usize,
        /// Signals expected.
        expected: usize,
    },

    /// `wait` was called on a barrier that was never armed.
    #[error("completion barrier was not armed")]
    NotArmed,
}

/// Startup failures: Setup aborts, Teardown is still required.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A runtime instance failed to start.
    #[error(transparent)]
    Host(HostError),

    /// The head actor could not be resolved in time.
    #[error("head actor unavailable: {0}")]
    HeadUnresolved(HostError),

    /// A lifecycle hook failed.
    #[error("{hook} hook failed: {source}")]
    Hook {
        /// Which hook.
        hook: &'static str,
        /// The hook's error.
        source: HookError,
    },

    /// The completion barrier could not be armed.
    #[error("completion barrier could not be armed: {0}")]
    Barrier(CompletionError),

    /// Setup ran past its deadline.
    #[error("setup did not complete: {0}")]
    Deadline(DeadlineExceeded),
}

/// Runtime failures: the whole Run fails, no retry.
#[derive(Debug, Error)]
pub enum RunError {
    /// One entity's flow failed.
    #[error("flow for entity '{entity_id}' failed: {source}")]
    Flow {
        /// The entity whose flow failed.
        entity_id: String,
        /// Why it failed.
        source: ActorError,
    },

    /// The completion barrier did not release.
    #[error(transparent)]
    Completion(CompletionError),

    /// The run as a whole ran past its deadline.
    #[error("run did not complete: {0}")]
    Deadline(DeadlineExceeded),
}

/// Teardown failures that are not absorbed.
///
/// Stop failures are collected into the teardown summary instead; only the
/// post-stop hook can fail Teardown.
#[derive(Debug, Error)]
pub enum TeardownError {
    /// The post-stop hook failed.
    #[error("post_stop hook failed: {0}")]
    PostStopHook(HookError),

    /// The post-stop hook did not finish before the deadline.
    #[error("post_stop hook did not finish: {0}")]
    PostStopTimeout(DeadlineExceeded),
}

/// Top-level error of the benchmark orchestrator.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// Detected during Setup; the benchmark never runs.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A host or hook failed during Setup.
    #[error("startup error: {0}")]
    Startup(#[from] StartupError),

    /// A flow failed or timed out during Run.
    #[error("runtime error: {0}")]
    Runtime(#[from] RunError),

    /// The post-stop hook failed during Teardown.
    #[error("teardown error: {0}")]
    Teardown(#[from] TeardownError),

    /// The operation is not allowed in the current state.
    #[error("cannot {operation} a benchmark in state {state:?}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the benchmark was in.
        state: BenchmarkState,
    },
}

impl BenchmarkError {
    /// Whether this error was caused by a deadline rather than a fault.
    pub fn is_timeout(&self) -> bool {
        match self {
            BenchmarkError::Runtime(RunError::Flow { source, .. }) => source.is_timeout(),
            BenchmarkError::Runtime(RunError::Completion(CompletionError::TimedOut { .. }))
            | BenchmarkError::Runtime(RunError::Deadline(_))
            | BenchmarkError::Teardown(TeardownError::PostStopTimeout(_))
            | BenchmarkError::Startup(StartupError::Deadline(_))
            | BenchmarkError::Startup(StartupError::HeadUnresolved(_))
            | BenchmarkError::Startup(StartupError::Host(HostError::StartTimeout { .. })) => true,
            _ => false,
        }
    }
}
