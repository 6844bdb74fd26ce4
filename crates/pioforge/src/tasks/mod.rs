//! The server's timed operations.
//!
//! Each task is a plain struct holding its parameters and the registries
//! it touches; handlers fill one in and pass it to the scheduler.

mod batch_recycle;
mod building;
mod junk_removal;
mod mission_return;
mod time_update;

pub use batch_recycle::BatchRecycleTask;
pub use building::{BuildingJob, BuildingTask};
pub use junk_removal::{JunkRemovalEntry, JunkRemovalRegistry, JunkRemovalTask};
pub use mission_return::MissionReturnTask;
pub use time_update::TimeUpdateTask;

use pioforge_context::ContextError;
use pioforge_task::TaskError;

fn context_failure(err: ContextError) -> TaskError {
    TaskError::execution(err.to_string())
}
