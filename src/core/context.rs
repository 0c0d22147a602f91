//! Request-scoped cancellation and deadlines
//!
//! Every repository call takes a [`RequestContext`]. Each store operation
//! issued on behalf of the call is raced against the context's cancellation
//! token and deadline, so an expired or cancelled context aborts the call with
//! [`CrudError::Cancelled`] or [`CrudError::DeadlineExceeded`]. Nothing is
//! retried at this layer.

use crate::core::error::{CrudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline for a single request
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::new(),
        }
    }

    /// A context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// A context driven by an externally owned cancellation token
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Attach a deadline to this context, keeping the earlier one if set
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Cancel the request
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The cancellation token backing this context
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is already cancelled or expired
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(CrudError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(CrudError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run a store operation under this context
    ///
    /// The future is dropped as soon as the token fires or the deadline
    /// passes, which releases any cursor it holds.
    pub async fn run<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::warn!("Store operation cancelled by caller");
                    Err(CrudError::Cancelled)
                }
                result = operation => result,
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .map_err(|_| {
                    tracing::warn!("Store operation exceeded request deadline");
                    CrudError::DeadlineExceeded
                })?,
            None => guarded.await,
        }
    }
}
