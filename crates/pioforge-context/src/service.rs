//! The lifecycle every per-player game service shares.

use std::sync::Arc;

use async_trait::async_trait;
use pioforge_protocol::PlayerId;
use tokio::sync::{Mutex, MutexGuard};

use crate::{ContextError, PersistenceError, PlayerObjects, PlayerRepository};

/// A slice of live player state, loaded at join and flushed at leave.
///
/// Services hold their state behind their own lock. Mutators take the
/// player's [`WriteLock`], persist, and only publish the new state once
/// the write succeeded, so a failed write leaves the in-memory view
/// unchanged.
#[async_trait]
pub trait GameService: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Loads this service's state for `player_id`.
    async fn init(&self, player_id: &PlayerId) -> Result<(), ContextError>;

    /// Flushes anything accumulated while the player was online.
    async fn close(&self, player_id: &PlayerId) -> Result<(), ContextError>;
}

/// Serialises every write to one player's state.
///
/// All services of a player share one lock. A mutation holds it from
/// reading the live state until the result is published, so a task hook
/// and a save handler touching the same player cannot lose each other's
/// update in memory or in storage.
#[derive(Clone, Default)]
pub struct WriteLock(Arc<Mutex<()>>);

impl WriteLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

/// Read-modify-write of the player document. Callers hold the
/// [`WriteLock`].
pub(crate) async fn write_objects(
    repository: &dyn PlayerRepository,
    player_id: &PlayerId,
    apply: impl FnOnce(&mut PlayerObjects) + Send,
) -> Result<(), PersistenceError> {
    let mut objects = repository.load_player_objects(player_id).await?;
    apply(&mut objects);
    repository.update_player_objects_json(player_id, &objects).await
}
