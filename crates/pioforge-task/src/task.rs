//! The `ServerTask` trait: hooks a scheduled operation implements.

use async_trait::async_trait;
use pioforge_transport::ClientConnection;

use crate::{TaskCategory, TaskConfig, TaskError};

/// Why a task ended without completing normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Stopped by a handler (for example a cancel request from the client).
    Manual,
    /// A newer task was scheduled under the same category.
    Replaced,
    /// The configured timeout elapsed before the task finished.
    Timeout,
    /// `execute` or a completion hook returned an error.
    Error,
    /// The owning connection was closed.
    ConnectionClosed,
    /// The scheduler itself was shut down.
    Shutdown,
}

/// A timed operation bound to one connection.
///
/// Parameters live in the implementing struct and are filled in before
/// scheduling. The struct is moved into the scheduler, so hooks take
/// `&self`; use interior mutability if a repeating task needs state
/// across iterations.
///
/// # Hook order
///
/// ```text
/// normal:     [on_iteration_start → execute → on_complete → on_iteration_complete] × N
/// forced:     on_force_complete
/// cancelled:  on_cancelled(reason)
/// ```
///
/// Hooks should be quick (in-memory state changes plus a message send).
/// Once `execute` has started it runs to the end; cancellation is only
/// observed while the task is waiting.
#[async_trait]
pub trait ServerTask: Send + Sync + 'static {
    fn category(&self) -> TaskCategory;

    fn config(&self) -> TaskConfig {
        TaskConfig::default()
    }

    /// Entity this task acts on (building id, mission id...), used in the
    /// derived task id for logs.
    fn entity_id(&self) -> Option<String> {
        None
    }

    /// The normal fire: performs the state change and notifies the client.
    async fn execute(&self, connection: &ClientConnection) -> Result<(), TaskError>;

    /// Cleanup after `execute`, such as releasing a registry entry.
    async fn on_complete(&self, _connection: &ClientConnection) -> Result<(), TaskError> {
        Ok(())
    }

    /// Fast-forward: must leave the same state as a normal fire.
    ///
    /// The default runs `execute` then `on_complete`.
    async fn on_force_complete(&self, connection: &ClientConnection) -> Result<(), TaskError> {
        self.execute(connection).await?;
        self.on_complete(connection).await
    }

    async fn on_cancelled(&self, _connection: &ClientConnection, _reason: CancelReason) {}

    /// Called before each execution. `iteration` starts at 1.
    async fn on_iteration_start(&self, _connection: &ClientConnection, _iteration: u32) {}

    async fn on_iteration_complete(&self, _connection: &ClientConnection, _iteration: u32) {}
}
