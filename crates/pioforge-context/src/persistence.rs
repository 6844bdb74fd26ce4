//! The storage seam the game services talk to.
//!
//! The socket layer never knows which database is behind this trait. The
//! in-memory [`MemoryRepository`] backs tests and local runs; real
//! deployments plug in their own implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use pioforge_protocol::PlayerId;
use serde_json::Value as Json;

use crate::{Account, PersistenceError, PlayerObjects};

/// Async access to one player's stored data.
///
/// Survivors and inventory items are opaque JSON documents; survivors
/// are matched by their `"id"` field.
#[async_trait]
pub trait PlayerRepository: Send + Sync + 'static {
    async fn load_account(&self, player_id: &PlayerId) -> Result<Account, PersistenceError>;

    async fn load_player_objects(
        &self,
        player_id: &PlayerId,
    ) -> Result<PlayerObjects, PersistenceError>;

    /// Replaces the whole player document.
    async fn update_player_objects_json(
        &self,
        player_id: &PlayerId,
        objects: &PlayerObjects,
    ) -> Result<(), PersistenceError>;

    async fn get_survivors(&self, player_id: &PlayerId) -> Result<Vec<Json>, PersistenceError>;

    async fn update_survivor(
        &self,
        player_id: &PlayerId,
        survivor_id: &str,
        survivor: Json,
    ) -> Result<(), PersistenceError>;

    async fn get_inventory(&self, player_id: &PlayerId) -> Result<Vec<Json>, PersistenceError>;

    async fn update_inventory(
        &self,
        player_id: &PlayerId,
        items: &[Json],
    ) -> Result<(), PersistenceError>;

    async fn update_last_login(
        &self,
        player_id: &PlayerId,
        at_millis: i64,
    ) -> Result<(), PersistenceError>;
}

/// Everything stored for one player.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub account: Account,
    pub objects: PlayerObjects,
    pub survivors: Vec<Json>,
    pub inventory: Vec<Json>,
}

impl PlayerRecord {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            objects: PlayerObjects::default(),
            survivors: Vec::new(),
            inventory: Vec::new(),
        }
    }

    pub fn with_objects(mut self, objects: PlayerObjects) -> Self {
        self.objects = objects;
        self
    }

    pub fn with_survivors(mut self, survivors: Vec<Json>) -> Self {
        self.survivors = survivors;
        self
    }

    pub fn with_inventory(mut self, inventory: Vec<Json>) -> Self {
        self.inventory = inventory;
        self
    }
}

/// A process-local repository.
///
/// Data lives as long as the process. Writes to an unknown player fail
/// with [`PersistenceError::NotFound`], like a missing row would.
#[derive(Default)]
pub struct MemoryRepository {
    players: DashMap<PlayerId, Mutex<PlayerRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or replaces) a player's full record.
    pub fn insert(&self, record: PlayerRecord) {
        let player_id = record.account.player_id.clone();
        self.players.insert(player_id, Mutex::new(record));
    }

    /// A copy of the stored record, for assertions and admin tools.
    pub fn snapshot(&self, player_id: &PlayerId) -> Option<PlayerRecord> {
        self.players.get(player_id).map(|entry| {
            entry
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        })
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn with_record<T>(
        &self,
        player_id: &PlayerId,
        f: impl FnOnce(&mut PlayerRecord) -> T,
    ) -> Result<T, PersistenceError> {
        let entry = self
            .players
            .get(player_id)
            .ok_or_else(|| PersistenceError::NotFound(player_id.clone()))?;
        let mut record = entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(f(&mut record))
    }
}

#[async_trait]
impl PlayerRepository for MemoryRepository {
    async fn load_account(&self, player_id: &PlayerId) -> Result<Account, PersistenceError> {
        self.with_record(player_id, |record| record.account.clone())
    }

    async fn load_player_objects(
        &self,
        player_id: &PlayerId,
    ) -> Result<PlayerObjects, PersistenceError> {
        self.with_record(player_id, |record| record.objects.clone())
    }

    async fn update_player_objects_json(
        &self,
        player_id: &PlayerId,
        objects: &PlayerObjects,
    ) -> Result<(), PersistenceError> {
        self.with_record(player_id, |record| record.objects = objects.clone())
    }

    async fn get_survivors(&self, player_id: &PlayerId) -> Result<Vec<Json>, PersistenceError> {
        self.with_record(player_id, |record| record.survivors.clone())
    }

    async fn update_survivor(
        &self,
        player_id: &PlayerId,
        survivor_id: &str,
        survivor: Json,
    ) -> Result<(), PersistenceError> {
        self.with_record(player_id, |record| {
            let slot = record
                .survivors
                .iter_mut()
                .find(|s| s.get("id").and_then(Json::as_str) == Some(survivor_id));
            match slot {
                Some(slot) => {
                    *slot = survivor;
                    Ok(())
                }
                None => Err(PersistenceError::backend(format!(
                    "survivor {survivor_id} does not exist"
                ))),
            }
        })?
    }

    async fn get_inventory(&self, player_id: &PlayerId) -> Result<Vec<Json>, PersistenceError> {
        self.with_record(player_id, |record| record.inventory.clone())
    }

    async fn update_inventory(
        &self,
        player_id: &PlayerId,
        items: &[Json],
    ) -> Result<(), PersistenceError> {
        self.with_record(player_id, |record| record.inventory = items.to_vec())
    }

    async fn update_last_login(
        &self,
        player_id: &PlayerId,
        at_millis: i64,
    ) -> Result<(), PersistenceError> {
        self.with_record(player_id, |record| record.account.last_login = at_millis)
    }
}
