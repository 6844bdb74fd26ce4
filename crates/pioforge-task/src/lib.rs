//! Per-connection task scheduler for pioforge.
//!
//! Every time-delayed game action runs through here: buildings finishing,
//! repairs, mission returns, junk removal, batch recycling, and the
//! once-a-second time sync.
//!
//! - [`TaskCategory`]: the kind of operation; one live task per
//!   `(connection, category)`.
//! - [`TaskConfig`]: start delay, repeat interval, repeat cap, timeout.
//! - [`ServerTask`]: the hooks an operation implements.
//! - [`TaskScheduler`]: schedule, stop, force-complete, and tear down.
//!
//! # Integration
//!
//! ```ignore
//! scheduler
//!     .schedule(&connection, BuildingUpgradeTask { building_id, .. })
//!     .await?;
//!
//! // Client paid to skip the wait:
//! scheduler
//!     .stop(connection.id(), TaskCategory::BuildingUpgrade, StopMode::ForceComplete)
//!     .await;
//! ```

mod category;
mod config;
mod error;
mod scheduler;
mod task;

pub use async_trait::async_trait;
pub use category::TaskCategory;
pub use config::TaskConfig;
pub use error::TaskError;
pub use scheduler::{StopMode, StopOutcome, TaskKey, TaskScheduler, TaskState};
pub use task::{CancelReason, ServerTask};
