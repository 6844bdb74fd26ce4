use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pioforge_protocol::PlayerId;
use serde_json::Value as Json;

use super::lock;
use crate::{ContextError, GameService, PlayerRepository, WriteLock};

/// The player's survivors, kept as raw documents keyed by `"id"`.
pub struct SurvivorService {
    player_id: PlayerId,
    leader_id: Option<String>,
    repository: Arc<dyn PlayerRepository>,
    writes: WriteLock,
    survivors: Mutex<Vec<Json>>,
}

impl SurvivorService {
    pub fn new(
        player_id: PlayerId,
        leader_id: Option<String>,
        repository: Arc<dyn PlayerRepository>,
        writes: WriteLock,
    ) -> Self {
        Self {
            player_id,
            leader_id,
            repository,
            writes,
            survivors: Mutex::new(Vec::new()),
        }
    }

    pub fn leader_id(&self) -> Option<&str> {
        self.leader_id.as_deref()
    }

    /// The compound leader, if the account names one and it is loaded.
    pub fn leader(&self) -> Option<Json> {
        self.leader_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, survivor_id: &str) -> Option<Json> {
        lock(&self.survivors)
            .iter()
            .find(|s| survivor_id_of(s) == Some(survivor_id))
            .cloned()
    }

    pub fn all(&self) -> Vec<Json> {
        lock(&self.survivors).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.survivors).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.survivors).is_empty()
    }

    /// Applies `update` to one survivor and persists it.
    pub async fn update_survivor(
        &self,
        survivor_id: &str,
        update: impl FnOnce(&mut Json) + Send,
    ) -> Result<Json, ContextError> {
        let _write = self.writes.acquire().await;
        let mut survivor = self
            .get(survivor_id)
            .ok_or_else(|| ContextError::entity("survivor", survivor_id, &self.player_id))?;
        update(&mut survivor);

        self.repository
            .update_survivor(&self.player_id, survivor_id, survivor.clone())
            .await
            .inspect_err(|e| {
                tracing::error!(player_id = %self.player_id, survivor_id, error = %e, "survivor update failed");
            })?;

        let mut survivors = lock(&self.survivors);
        if let Some(slot) = survivors
            .iter_mut()
            .find(|s| survivor_id_of(s) == Some(survivor_id))
        {
            *slot = survivor.clone();
        }
        Ok(survivor)
    }
}

fn survivor_id_of(survivor: &Json) -> Option<&str> {
    survivor.get("id").and_then(Json::as_str)
}

#[async_trait]
impl GameService for SurvivorService {
    fn name(&self) -> &'static str {
        "survivor"
    }

    async fn init(&self, player_id: &PlayerId) -> Result<(), ContextError> {
        let loaded = self.repository.get_survivors(player_id).await?;
        if let Some(leader) = &self.leader_id {
            if !loaded.iter().any(|s| survivor_id_of(s) == Some(leader)) {
                tracing::warn!(%player_id, leader_id = %leader, "leader survivor missing");
            }
        }
        *lock(&self.survivors) = loaded;
        Ok(())
    }

    async fn close(&self, _player_id: &PlayerId) -> Result<(), ContextError> {
        Ok(())
    }
}
