//! Completion barriers: detecting that every dispatched flow has finished.
//!
//! A barrier is armed during Setup, outside the measured interval, with the
//! number of flows to expect. After Run has dispatched every flow it waits
//! on the barrier until all of them signalled or the deadline passes.
//!
//! [`FlowCompletion`] is the default: flows finish through their own
//! awaited result, so there is nothing left to wait for. [`CountdownBarrier`]
//! serves fire-and-forget workloads whose workers report completion
//! themselves through a [`CompletionSignal`].

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::deadline::Deadline;
use crate::error::CompletionError;

/// Two-phase completion detector.
#[async_trait(?Send)]
pub trait CompletionBarrier: 'static {
    /// Prepare for `expected` completions.
    async fn arm(&self, expected: usize, deadline: &Deadline) -> Result<(), CompletionError>;

    /// Wait until every expected completion arrived.
    async fn wait(&self, deadline: &Deadline) -> Result<(), CompletionError>;
}

/// Barrier for flows that complete through their own result.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowCompletion;

#[async_trait(?Send)]
impl CompletionBarrier for FlowCompletion {
    async fn arm(&self, _expected: usize, _deadline: &Deadline) -> Result<(), CompletionError> {
        Ok(())
    }

    async fn wait(&self, _deadline: &Deadline) -> Result<(), CompletionError> {
        Ok(())
    }
}

#[derive(Default)]
struct Countdown {
    expected: Cell<Option<usize>>,
    completed: Cell<usize>,
    changed: Notify,
}

/// Barrier released by `expected` calls to [`CompletionSignal::signal`].
///
/// A successful `wait` consumes `expected` signals, so the same barrier
/// serves every iteration of a benchmark.
#[derive(Default)]
pub struct CountdownBarrier {
    state: Rc<Countdown>,
}

/// Handle given to workers to report one finished flow.
#[derive(Clone)]
pub struct CompletionSignal {
    state: Rc<Countdown>,
}

impl CompletionSignal {
    /// Report one completion.
    pub fn signal(&self) {
        self.state.completed.set(self.state.completed.get() + 1);
        self.state.changed.notify_waiters();
    }
}

impl CountdownBarrier {
    /// An unarmed barrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for signalling this barrier.
    pub fn signal(&self) -> CompletionSignal {
        CompletionSignal {
            state: self.state.clone(),
        }
    }

    /// Signals received and not yet consumed.
    pub fn completed(&self) -> usize {
        self.state.completed.get()
    }

    /// Completions the barrier was armed for.
    pub fn expected(&self) -> Option<usize> {
        self.state.expected.get()
    }
}

#[async_trait(?Send)]
impl CompletionBarrier for CountdownBarrier {
    async fn arm(&self, expected: usize, deadline: &Deadline) -> Result<(), CompletionError> {
        if deadline.is_expired() {
            return Err(CompletionError::TimedOut {
                completed: 0,
                expected,
            });
        }
        self.state.expected.set(Some(expected));
        self.state.completed.set(0);
        Ok(())
    }

    async fn wait(&self, deadline: &Deadline) -> Result<(), CompletionError> {
        let expected = self.state.expected.get().ok_or(CompletionError::NotArmed)?;
        loop {
            let changed = self.state.changed.notified();
            let completed = self.state.completed.get();
            if completed >= expected {
                self.state.completed.set(completed - expected);
                return Ok(());
            }
            if deadline.run(changed).await.is_err() {
                return Err(CompletionError::TimedOut {
                    completed: self.state.completed.get(),
                    expected,
                });
            }
        }
    }
}
