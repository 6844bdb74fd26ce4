//! Live per-player state for pioforge.
//!
//! When a player joins, the [`PlayerContextTracker`] loads their account
//! and game document through a [`PlayerRepository`], builds the service
//! set ([`PlayerServices`]) and publishes a [`PlayerContext`]. Handlers
//! and scheduled tasks reach game state through that context until the
//! player disconnects.
//!
//! - [`PlayerRepository`] is the storage seam; [`MemoryRepository`] is
//!   the built-in backend.
//! - [`GameService`] is the init/close lifecycle every service follows.
//! - [`OnlinePlayerRegistry`] tracks who has finished loading in.

mod context;
mod error;
mod model;
mod online;
mod persistence;
mod service;
mod services;
mod tracker;

pub use context::PlayerContext;
pub use error::{ContextError, PersistenceError};
pub use model::{
    Account, BatchRecycleJob, Building, BuildingCore, GameResources, JunkBuilding, PlayerObjects,
    TimerData,
};
pub use online::OnlinePlayerRegistry;
pub use persistence::{MemoryRepository, PlayerRecord, PlayerRepository};
pub use service::{GameService, WriteLock};
pub use services::{
    BatchRecycleService, CompoundService, InventoryService, MetadataService, PlayerServices,
    SurvivorService, production_yield,
};
pub use tracker::PlayerContextTracker;
