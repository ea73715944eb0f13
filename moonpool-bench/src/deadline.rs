//! Deadlines threaded through every suspending operation.
//!
//! A [`Deadline`] couples an absolute expiry instant with a cancellation
//! token. Every call that can suspend (starting hosts, asking an actor,
//! waiting on a completion barrier, stopping hosts) receives one and fails
//! with [`DeadlineExceeded`] as soon as either the instant passes or the
//! token is cancelled.
//!
//! ```ignore
//! let deadline = Deadline::after(Duration::from_secs(60));
//! let reply = deadline.run(rx).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a deadline-bounded operation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeadlineExceeded {
    /// The expiry instant passed.
    #[error("deadline elapsed")]
    Elapsed,

    /// The deadline's token was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

/// Absolute expiry plus cancellation, passed explicitly to suspending calls.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    token: CancellationToken,
}

impl Deadline {
    /// A deadline expiring `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// A deadline expiring at `expires_at`.
    pub fn at(expires_at: Instant) -> Self {
        Self {
            expires_at,
            token: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token, e.g. to tie the deadline to a shutdown signal.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// The instant at which this deadline expires.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Cancel the deadline. Clones and children observe the cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the deadline has elapsed or been cancelled.
    pub fn is_expired(&self) -> bool {
        self.check().is_err()
    }

    /// Fail immediately if the deadline has already elapsed or been cancelled.
    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        if self.token.is_cancelled() {
            Err(DeadlineExceeded::Cancelled)
        } else if Instant::now() >= self.expires_at {
            Err(DeadlineExceeded::Elapsed)
        } else {
            Ok(())
        }
    }

    /// A deadline that expires at the earlier of `self` and `now + window`.
    ///
    /// The child shares cancellation with its parent; cancelling the child
    /// does not cancel the parent.
    pub fn limited_to(&self, window: Duration) -> Self {
        let bounded = Instant::now() + window;
        Self {
            expires_at: self.expires_at.min(bounded),
            token: self.token.child_token(),
        }
    }

    /// Drive `future` to completion unless the deadline passes first.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, DeadlineExceeded> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(DeadlineExceeded::Cancelled),
            output = tokio::time::timeout_at(self.expires_at, future) => {
                output.map_err(|_| DeadlineExceeded::Elapsed)
            }
        }
    }
}
