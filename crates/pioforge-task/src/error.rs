//! Error types for scheduled tasks.

use pioforge_transport::TransportError;

/// Errors a task hook can return, or that scheduling can fail with.
///
/// A hook error never escapes the scheduler: the runner logs it and
/// cancels the task with [`CancelReason::Error`](crate::CancelReason::Error).
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task's own logic failed (missing game state, bad parameters).
    #[error("task execution failed: {0}")]
    Execution(String),

    /// Delivering a message over the connection failed, or the
    /// connection was already closed when the task was scheduled.
    #[error(transparent)]
    Connection(#[from] TransportError),

    /// The scheduler has been shut down and accepts no new tasks.
    #[error("task scheduler is shut down")]
    SchedulerClosed,
}

impl TaskError {
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution(reason.into())
    }
}
