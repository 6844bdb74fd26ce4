use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pioforge_protocol::PlayerId;
use serde_json::Value as Json;

use super::lock;
use crate::{ContextError, GameService, PlayerRepository, WriteLock};

/// The player's item inventory.
pub struct InventoryService {
    player_id: PlayerId,
    repository: Arc<dyn PlayerRepository>,
    writes: WriteLock,
    items: Mutex<Vec<Json>>,
}

impl InventoryService {
    pub fn new(player_id: PlayerId, repository: Arc<dyn PlayerRepository>, writes: WriteLock) -> Self {
        Self {
            player_id,
            repository,
            writes,
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn items(&self) -> Vec<Json> {
        lock(&self.items).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    /// Appends items (task rewards, recycled output) and persists.
    pub async fn add_items(&self, new_items: Vec<Json>) -> Result<(), ContextError> {
        let _write = self.writes.acquire().await;
        let mut items = self.items();
        items.extend(new_items);
        self.store(items).await
    }

    /// Replaces the whole inventory.
    pub async fn replace(&self, items: Vec<Json>) -> Result<(), ContextError> {
        let _write = self.writes.acquire().await;
        self.store(items).await
    }

    /// Requires the write lock.
    async fn store(&self, items: Vec<Json>) -> Result<(), ContextError> {
        self.repository
            .update_inventory(&self.player_id, &items)
            .await
            .inspect_err(|e| {
                tracing::error!(player_id = %self.player_id, error = %e, "inventory write failed");
            })?;
        *lock(&self.items) = items;
        Ok(())
    }
}

#[async_trait]
impl GameService for InventoryService {
    fn name(&self) -> &'static str {
        "inventory"
    }

    async fn init(&self, player_id: &PlayerId) -> Result<(), ContextError> {
        let items = self.repository.get_inventory(player_id).await?;
        *lock(&self.items) = items;
        Ok(())
    }

    async fn close(&self, _player_id: &PlayerId) -> Result<(), ContextError> {
        Ok(())
    }
}
