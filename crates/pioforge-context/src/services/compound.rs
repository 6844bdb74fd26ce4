use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pioforge_protocol::{PlayerId, epoch_millis};

use super::lock;
use crate::service::write_objects;
use crate::{Building, ContextError, GameResources, GameService, PlayerRepository, WriteLock};

/// Flat yield a production building has after any absence.
const BASE_YIELD: f64 = 10.0;
/// Extra yield per whole minute since the last collection.
const YIELD_PER_MINUTE: f64 = 4.0;

/// Resources a production building accumulates over `elapsed`.
pub fn production_yield(elapsed: Duration) -> f64 {
    BASE_YIELD + YIELD_PER_MINUTE * (elapsed.as_secs() / 60) as f64
}

#[derive(Default)]
struct CompoundState {
    resources: GameResources,
    buildings: Vec<Building>,
    /// Production building id → epoch millis of the last collection.
    production_since: HashMap<String, i64>,
}

/// The player's compound: buildings and stockpiled resources.
pub struct CompoundService {
    player_id: PlayerId,
    repository: Arc<dyn PlayerRepository>,
    writes: WriteLock,
    state: Mutex<CompoundState>,
}

impl CompoundService {
    pub fn new(player_id: PlayerId, repository: Arc<dyn PlayerRepository>, writes: WriteLock) -> Self {
        Self {
            player_id,
            repository,
            writes,
            state: Mutex::new(CompoundState::default()),
        }
    }

    pub fn resources(&self) -> GameResources {
        lock(&self.state).resources
    }

    pub fn cash(&self) -> i32 {
        lock(&self.state).resources.cash
    }

    pub fn building(&self, building_id: &str) -> Option<Building> {
        lock(&self.state)
            .buildings
            .iter()
            .find(|b| b.id() == building_id)
            .cloned()
    }

    pub fn buildings(&self) -> Vec<Building> {
        lock(&self.state).buildings.clone()
    }

    /// Applies `update` to the resource totals and persists them.
    pub async fn update_resources(
        &self,
        update: impl FnOnce(&mut GameResources) + Send,
    ) -> Result<GameResources, ContextError> {
        let _write = self.writes.acquire().await;
        let mut resources = self.resources();
        update(&mut resources);
        self.persist(Some(resources), None).await?;
        lock(&self.state).resources = resources;
        Ok(resources)
    }

    pub async fn create_building(&self, building: Building) -> Result<(), ContextError> {
        let _write = self.writes.acquire().await;
        let mut buildings = self.buildings();
        buildings.push(building.clone());
        self.persist(None, Some(buildings)).await?;

        let mut state = lock(&self.state);
        if building.is_production() {
            state
                .production_since
                .insert(building.id().to_string(), epoch_millis());
        }
        tracing::info!(player_id = %self.player_id, building_id = building.id(), kind = %building.core().kind, "building created");
        state.buildings.push(building);
        Ok(())
    }

    /// Applies `update` to one building and persists the compound.
    pub async fn update_building(
        &self,
        building_id: &str,
        update: impl FnOnce(&mut Building) + Send,
    ) -> Result<Building, ContextError> {
        let _write = self.writes.acquire().await;
        self.write_building(building_id, update).await
    }

    /// Replaces every building at once.
    pub async fn update_all_buildings(&self, buildings: Vec<Building>) -> Result<(), ContextError> {
        let _write = self.writes.acquire().await;
        self.write_all_buildings(buildings).await
    }

    pub async fn delete_building(&self, building_id: &str) -> Result<(), ContextError> {
        let _write = self.writes.acquire().await;
        let mut buildings = self.buildings();
        let before = buildings.len();
        buildings.retain(|b| b.id() != building_id);
        if buildings.len() == before {
            return Err(ContextError::entity("building", building_id, &self.player_id));
        }

        self.persist(None, Some(buildings)).await?;
        let mut state = lock(&self.state);
        state.buildings.retain(|b| b.id() != building_id);
        state.production_since.remove(building_id);
        tracing::info!(player_id = %self.player_id, building_id, "building deleted");
        Ok(())
    }

    /// Collects a production building: returns its yield and resets it.
    pub async fn collect_building(&self, building_id: &str) -> Result<GameResources, ContextError> {
        let _write = self.writes.acquire().await;
        let since = lock(&self.state)
            .production_since
            .get(building_id)
            .copied()
            .ok_or_else(|| ContextError::entity("production building", building_id, &self.player_id))?;

        let now = epoch_millis();
        let amount = production_yield(elapsed_between(since, now));
        self.write_building(building_id, |b| b.core_mut().resource_value = 0.0)
            .await?;
        lock(&self.state)
            .production_since
            .insert(building_id.to_string(), now);

        Ok(GameResources {
            wood: amount as i32,
            ..GameResources::default()
        })
    }

    /// Requires the write lock.
    async fn write_building(
        &self,
        building_id: &str,
        update: impl FnOnce(&mut Building) + Send,
    ) -> Result<Building, ContextError> {
        let mut buildings = self.buildings();
        let slot = buildings
            .iter_mut()
            .find(|b| b.id() == building_id)
            .ok_or_else(|| ContextError::entity("building", building_id, &self.player_id))?;
        update(slot);
        let updated = slot.clone();

        self.persist(None, Some(buildings)).await?;
        let mut state = lock(&self.state);
        if let Some(slot) = state.buildings.iter_mut().find(|b| b.id() == building_id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    /// Requires the write lock.
    async fn write_all_buildings(&self, buildings: Vec<Building>) -> Result<(), ContextError> {
        self.persist(None, Some(buildings.clone())).await?;
        lock(&self.state).buildings = buildings;
        Ok(())
    }

    async fn persist(
        &self,
        resources: Option<GameResources>,
        buildings: Option<Vec<Building>>,
    ) -> Result<(), ContextError> {
        write_objects(self.repository.as_ref(), &self.player_id, move |objects| {
            if let Some(resources) = resources {
                objects.resources = resources;
            }
            if let Some(buildings) = buildings {
                objects.buildings = buildings;
            }
        })
        .await
        .inspect_err(|e| {
            tracing::error!(player_id = %self.player_id, error = %e, "compound write failed");
        })?;
        Ok(())
    }
}

fn elapsed_between(from_millis: i64, to_millis: i64) -> Duration {
    Duration::from_millis((to_millis - from_millis).max(0) as u64)
}

#[async_trait]
impl GameService for CompoundService {
    fn name(&self) -> &'static str {
        "compound"
    }

    async fn init(&self, player_id: &PlayerId) -> Result<(), ContextError> {
        let objects = self.repository.load_player_objects(player_id).await?;
        let now = epoch_millis();

        let mut state = lock(&self.state);
        state.production_since = objects
            .buildings
            .iter()
            .filter(|b| b.is_production())
            .map(|b| (b.id().to_string(), now))
            .collect();
        state.resources = objects.resources;
        state.buildings = objects.buildings;
        Ok(())
    }

    /// Stores what each production building accumulated this session.
    async fn close(&self, player_id: &PlayerId) -> Result<(), ContextError> {
        let _write = self.writes.acquire().await;
        let now = epoch_millis();
        let buildings: Vec<Building> = {
            let state = lock(&self.state);
            if state.production_since.is_empty() {
                return Ok(());
            }
            state
                .buildings
                .iter()
                .cloned()
                .map(|mut b| {
                    if let Some(since) = state.production_since.get(b.id()) {
                        b.core_mut().resource_value = production_yield(elapsed_between(*since, now));
                    }
                    b
                })
                .collect()
        };
        tracing::debug!(%player_id, "flushing production values");
        self.write_all_buildings(buildings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_yield_counts_whole_minutes() {
        assert_eq!(production_yield(Duration::ZERO), 10.0);
        assert_eq!(production_yield(Duration::from_secs(59)), 10.0);
        assert_eq!(production_yield(Duration::from_secs(150)), 18.0);
    }
}
