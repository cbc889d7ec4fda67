use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::{FailureKind, PipelineError, Stage};

/// Why a guarded operation stopped before producing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    DeadlineElapsed,
    Cancelled,
}

impl Interrupted {
    /// Maps an interrupted `stage` to the failure reported to callers.
    pub fn into_error(self, stage: Stage) -> PipelineError {
        match self {
            Interrupted::DeadlineElapsed => PipelineError::new(FailureKind::Timeout { stage }),
            Interrupted::Cancelled => PipelineError::new(FailureKind::Cancelled),
        }
    }
}

/// Deadline plus cancellation signal handed to every suspending operation.
///
/// Child contexts get their own deadline and a child token: cancelling a
/// parent reaches every child, while a child timing out leaves its parent
/// running.
#[derive(Debug, Clone)]
pub struct StageContext {
    deadline: Instant,
    token: CancellationToken,
}

impl StageContext {
    pub fn new(timeout: Duration) -> Self {
        Self::with_parent(timeout, &CancellationToken::new())
    }

    pub fn with_parent(timeout: Duration, parent: &CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            token: parent.child_token(),
        }
    }

    /// A nested scope whose deadline starts counting now.
    pub fn child(&self, timeout: Duration) -> Self {
        Self::with_parent(timeout, &self.token)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drives `fut` until it completes, the deadline passes, or the token is
    /// cancelled. On interruption `fut` is dropped, which aborts any request
    /// it owns, and this scope's token is cancelled.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        let outcome = tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(Interrupted::DeadlineElapsed),
            output = fut => Ok(output),
        };
        if outcome.is_err() {
            self.token.cancel();
        }
        outcome
    }
}
