//! Top-level socket handlers, one per message kind.
//!
//! Saves have their own sub-router in [`crate::save`].

mod init_complete;
mod join;
mod lobby;
mod survivor_check;

pub use init_complete::InitCompleteHandler;
pub use join::JoinHandler;
pub use lobby::{AuthHandler, QuestProgressHandler, ZombieAttackHandler};
pub use survivor_check::SurvivorCheckHandler;
