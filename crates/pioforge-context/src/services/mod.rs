//! The per-player service set.

mod batch_recycle;
mod compound;
mod inventory;
mod metadata;
mod survivor;

use std::sync::{Arc, Mutex, MutexGuard};

pub use batch_recycle::BatchRecycleService;
pub use compound::{CompoundService, production_yield};
pub use inventory::InventoryService;
pub use metadata::MetadataService;
pub use survivor::SurvivorService;

use pioforge_protocol::PlayerId;

use crate::{Account, GameService, PlayerRepository, WriteLock};

/// Every service a live player owns.
#[derive(Clone)]
pub struct PlayerServices {
    pub survivor: Arc<SurvivorService>,
    pub compound: Arc<CompoundService>,
    pub inventory: Arc<InventoryService>,
    pub metadata: Arc<MetadataService>,
    pub batch_recycle: Arc<BatchRecycleService>,
}

impl PlayerServices {
    /// Builds the (still empty) services for one player. They all share
    /// one [`WriteLock`].
    pub fn new(
        player_id: &PlayerId,
        account: &Account,
        repository: &Arc<dyn PlayerRepository>,
    ) -> Self {
        let writes = WriteLock::new();
        Self {
            survivor: Arc::new(SurvivorService::new(
                player_id.clone(),
                account.leader_id.clone(),
                Arc::clone(repository),
                writes.clone(),
            )),
            compound: Arc::new(CompoundService::new(
                player_id.clone(),
                Arc::clone(repository),
                writes.clone(),
            )),
            inventory: Arc::new(InventoryService::new(
                player_id.clone(),
                Arc::clone(repository),
                writes.clone(),
            )),
            metadata: Arc::new(MetadataService::new(
                player_id.clone(),
                Arc::clone(repository),
                writes.clone(),
            )),
            batch_recycle: Arc::new(BatchRecycleService::new(
                player_id.clone(),
                Arc::clone(repository),
                writes,
            )),
        }
    }

    /// All services, in init order.
    pub fn all(&self) -> [&dyn GameService; 5] {
        [
            self.survivor.as_ref(),
            self.compound.as_ref(),
            self.inventory.as_ref(),
            self.metadata.as_ref(),
            self.batch_recycle.as_ref(),
        ]
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
