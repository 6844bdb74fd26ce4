//! Integration tests for the player context tracker and its services.
//!
//! Connections are backed by in-memory duplex streams; storage is the
//! in-memory repository, optionally wrapped to inject failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pioforge_context::{
    Account, BatchRecycleJob, Building, BuildingCore, ContextError, MemoryRepository,
    PersistenceError, PlayerContextTracker, PlayerObjects, PlayerRecord, PlayerRepository,
};
use pioforge_protocol::PlayerId;
use pioforge_transport::{ClientConnection, TcpConnection};
use serde_json::{Value as Json, json};
use tokio::io::DuplexStream;

fn connection() -> (Arc<ClientConnection>, DuplexStream) {
    let (client, server) = tokio::io::duplex(1024);
    let (r, w) = tokio::io::split(server);
    let conn = ClientConnection::new(TcpConnection::from_io(r, w, "test"), "test");
    (Arc::new(conn), client)
}

fn seeded_repository(player: &str) -> Arc<MemoryRepository> {
    let repo = MemoryRepository::new();
    let mut account = Account::new(PlayerId::new(player), "Tester");
    account.leader_id = Some("leader".into());

    let mut objects = PlayerObjects {
        buildings: vec![
            Building::Standard(BuildingCore::new("b1", "resource-wood")),
            Building::Standard(BuildingCore::new("b2", "bed")),
        ],
        batch_recycles: vec![BatchRecycleJob {
            id: "r1".into(),
            items: vec![],
            start: 0,
            end: 60,
        }],
        nickname: Some("Nick".into()),
        ..PlayerObjects::default()
    };
    objects.resources.cash = 500;

    repo.insert(
        PlayerRecord::new(account)
            .with_objects(objects)
            .with_survivors(vec![json!({"id": "leader", "level": 3})])
            .with_inventory(vec![json!({"id": "i1", "type": "wood"})]),
    );
    Arc::new(repo)
}

/// Delegates to a memory repository but fails survivor loads.
struct NoSurvivors(Arc<MemoryRepository>);

#[async_trait]
impl PlayerRepository for NoSurvivors {
    async fn load_account(&self, p: &PlayerId) -> Result<Account, PersistenceError> {
        self.0.load_account(p).await
    }
    async fn load_player_objects(&self, p: &PlayerId) -> Result<PlayerObjects, PersistenceError> {
        self.0.load_player_objects(p).await
    }
    async fn update_player_objects_json(
        &self,
        p: &PlayerId,
        objects: &PlayerObjects,
    ) -> Result<(), PersistenceError> {
        self.0.update_player_objects_json(p, objects).await
    }
    async fn get_survivors(&self, _p: &PlayerId) -> Result<Vec<Json>, PersistenceError> {
        Err(PersistenceError::backend("survivor table offline"))
    }
    async fn update_survivor(
        &self,
        p: &PlayerId,
        id: &str,
        survivor: Json,
    ) -> Result<(), PersistenceError> {
        self.0.update_survivor(p, id, survivor).await
    }
    async fn get_inventory(&self, p: &PlayerId) -> Result<Vec<Json>, PersistenceError> {
        self.0.get_inventory(p).await
    }
    async fn update_inventory(&self, p: &PlayerId, items: &[Json]) -> Result<(), PersistenceError> {
        self.0.update_inventory(p, items).await
    }
    async fn update_last_login(&self, p: &PlayerId, at: i64) -> Result<(), PersistenceError> {
        self.0.update_last_login(p, at).await
    }
}

/// Delegates to a memory repository but stalls every document write, so
/// concurrent mutations overlap.
struct SlowWrites(Arc<MemoryRepository>);

#[async_trait]
impl PlayerRepository for SlowWrites {
    async fn load_account(&self, p: &PlayerId) -> Result<Account, PersistenceError> {
        self.0.load_account(p).await
    }
    async fn load_player_objects(&self, p: &PlayerId) -> Result<PlayerObjects, PersistenceError> {
        self.0.load_player_objects(p).await
    }
    async fn update_player_objects_json(
        &self,
        p: &PlayerId,
        objects: &PlayerObjects,
    ) -> Result<(), PersistenceError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.0.update_player_objects_json(p, objects).await
    }
    async fn get_survivors(&self, p: &PlayerId) -> Result<Vec<Json>, PersistenceError> {
        self.0.get_survivors(p).await
    }
    async fn update_survivor(
        &self,
        p: &PlayerId,
        id: &str,
        survivor: Json,
    ) -> Result<(), PersistenceError> {
        self.0.update_survivor(p, id, survivor).await
    }
    async fn get_inventory(&self, p: &PlayerId) -> Result<Vec<Json>, PersistenceError> {
        self.0.get_inventory(p).await
    }
    async fn update_inventory(&self, p: &PlayerId, items: &[Json]) -> Result<(), PersistenceError> {
        self.0.update_inventory(p, items).await
    }
    async fn update_last_login(&self, p: &PlayerId, at: i64) -> Result<(), PersistenceError> {
        self.0.update_last_login(p, at).await
    }
}

fn building_levels(buildings: &[Building]) -> Vec<(String, i32)> {
    buildings
        .iter()
        .map(|b| (b.id().to_string(), b.core().level))
        .collect()
}

#[tokio::test]
async fn test_create_context_initializes_every_service() {
    let repo = seeded_repository("p1");
    let tracker = PlayerContextTracker::new(repo);
    let (conn, _client) = connection();

    let ctx = tracker
        .create_context(PlayerId::new("p1"), conn)
        .await
        .expect("context should be created");

    let services = &ctx.services;
    assert_eq!(services.survivor.leader().unwrap()["level"], 3);
    assert_eq!(services.compound.cash(), 500);
    assert_eq!(services.compound.buildings().len(), 2);
    assert_eq!(services.inventory.len(), 1);
    assert_eq!(services.metadata.nickname().as_deref(), Some("Nick"));
    assert_eq!(services.batch_recycle.jobs().len(), 1);
    assert_eq!(tracker.len(), 1);
}

#[tokio::test]
async fn test_create_context_unknown_player_fails() {
    let tracker = PlayerContextTracker::new(Arc::new(MemoryRepository::new()));
    let (conn, _client) = connection();

    let err = tracker
        .create_context(PlayerId::new("ghost"), conn)
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::Persistence(PersistenceError::NotFound(_))));
    assert!(tracker.is_empty());
}

#[tokio::test]
async fn test_create_context_service_init_failure_leaves_service_empty() {
    let tracker = PlayerContextTracker::new(Arc::new(NoSurvivors(seeded_repository("p1"))));
    let (conn, _client) = connection();

    let ctx = tracker
        .create_context(PlayerId::new("p1"), conn)
        .await
        .expect("a failing service must not fail the join");

    assert!(ctx.services.survivor.is_empty());
    assert_eq!(ctx.services.compound.cash(), 500);
}

#[tokio::test]
async fn test_create_context_twice_replaces_previous() {
    let tracker = PlayerContextTracker::new(seeded_repository("p1"));
    let (first, _c1) = connection();
    let (second, _c2) = connection();
    let pid = PlayerId::new("p1");

    tracker.create_context(pid.clone(), first).await.unwrap();
    tracker.create_context(pid.clone(), Arc::clone(&second)).await.unwrap();

    assert_eq!(tracker.len(), 1);
    assert_eq!(tracker.get_context(&pid).unwrap().connection.id(), second.id());
}

#[tokio::test]
async fn test_remove_player_for_stale_connection_keeps_newer_context() {
    let tracker = PlayerContextTracker::new(seeded_repository("p1"));
    let (old, _c1) = connection();
    let (new, _c2) = connection();
    let pid = PlayerId::new("p1");

    tracker.create_context(pid.clone(), Arc::clone(&old)).await.unwrap();
    tracker.create_context(pid.clone(), new).await.unwrap();

    assert!(tracker.remove_player_for(&pid, old.id()).await.is_none());
    assert!(tracker.get_context(&pid).is_some());
}

#[tokio::test]
async fn test_require_context_missing_player_not_found() {
    let tracker = PlayerContextTracker::new(Arc::new(MemoryRepository::new()));
    let err = tracker.require_context(&PlayerId::new("nobody")).unwrap_err();
    assert!(matches!(err, ContextError::NotFound(_)));
}

#[tokio::test]
async fn test_update_context_publishes_new_copy() {
    let tracker = PlayerContextTracker::new(seeded_repository("p1"));
    let (conn, _client) = connection();
    let pid = PlayerId::new("p1");
    let before = tracker.create_context(pid.clone(), conn).await.unwrap();

    let after = tracker
        .update_context(&pid, |ctx| ctx.account.display_name = "Renamed".into())
        .unwrap();

    assert_eq!(before.account.display_name, "Tester");
    assert_eq!(after.account.display_name, "Renamed");
    assert_eq!(tracker.get_context(&pid).unwrap().account.display_name, "Renamed");
}

#[tokio::test]
async fn test_compound_mutations_persist_before_publishing() {
    let repo = seeded_repository("p1");
    let tracker = PlayerContextTracker::new(Arc::clone(&repo) as Arc<dyn PlayerRepository>);
    let (conn, _client) = connection();
    let pid = PlayerId::new("p1");
    let ctx = tracker.create_context(pid.clone(), conn).await.unwrap();
    let compound = &ctx.services.compound;

    compound.update_resources(|r| r.cash -= 120).await.unwrap();
    compound
        .update_building("b2", |b| b.core_mut().level += 1)
        .await
        .unwrap();
    compound.delete_building("b1").await.unwrap();

    assert_eq!(compound.cash(), 380);
    let stored = repo.snapshot(&pid).unwrap().objects;
    assert_eq!(stored.resources.cash, 380);
    assert_eq!(stored.buildings.len(), 1);
    assert_eq!(stored.buildings[0].core().level, 1);

    let missing = compound.delete_building("b1").await.unwrap_err();
    assert!(matches!(missing, ContextError::EntityNotFound { .. }));
}

#[tokio::test]
async fn test_remove_player_flushes_production_values() {
    let repo = seeded_repository("p1");
    let tracker = PlayerContextTracker::new(Arc::clone(&repo) as Arc<dyn PlayerRepository>);
    let (conn, _client) = connection();
    let pid = PlayerId::new("p1");
    tracker.create_context(pid.clone(), conn).await.unwrap();

    assert!(tracker.remove_player(&pid).await.is_some());
    assert!(tracker.get_context(&pid).is_none());

    let stored = repo.snapshot(&pid).unwrap().objects;
    let wood = stored.buildings.iter().find(|b| b.id() == "b1").unwrap();
    assert!(wood.core().resource_value >= 10.0);
    let bed = stored.buildings.iter().find(|b| b.id() == "b2").unwrap();
    assert_eq!(bed.core().resource_value, 0.0);
}

#[tokio::test]
async fn test_batch_recycle_remove_job_is_idempotent() {
    let tracker = PlayerContextTracker::new(seeded_repository("p1"));
    let (conn, _client) = connection();
    let ctx = tracker.create_context(PlayerId::new("p1"), conn).await.unwrap();
    let recycling = &ctx.services.batch_recycle;

    assert_eq!(recycling.remove_job("r1").await.unwrap().unwrap().id, "r1");
    assert!(recycling.remove_job("r1").await.unwrap().is_none());
    assert!(recycling.jobs().is_empty());
}

#[tokio::test]
async fn test_shutdown_closes_connections_and_clears() {
    let tracker = PlayerContextTracker::new(seeded_repository("p1"));
    let (conn, _client) = connection();
    tracker
        .create_context(PlayerId::new("p1"), Arc::clone(&conn))
        .await
        .unwrap();

    tracker.shutdown().await;

    assert!(tracker.is_empty());
    assert!(conn.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_resource_updates_both_apply() {
    let repo = seeded_repository("p1");
    let tracker = PlayerContextTracker::new(Arc::new(SlowWrites(Arc::clone(&repo))));
    let (conn, _client) = connection();
    let pid = PlayerId::new("p1");
    let ctx = tracker.create_context(pid.clone(), conn).await.unwrap();
    let compound = &ctx.services.compound;

    let (a, b) = tokio::join!(
        compound.update_resources(|r| r.cash -= 100),
        compound.update_resources(|r| r.cash -= 100)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(compound.cash(), 300);
    assert_eq!(repo.snapshot(&pid).unwrap().objects.resources.cash, 300);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_building_update_and_delete_agree_with_storage() {
    let repo = seeded_repository("p1");
    let tracker = PlayerContextTracker::new(Arc::new(SlowWrites(Arc::clone(&repo))));
    let (conn, _client) = connection();
    let pid = PlayerId::new("p1");
    let ctx = tracker.create_context(pid.clone(), conn).await.unwrap();
    let compound = &ctx.services.compound;

    let (updated, deleted) = tokio::join!(
        compound.update_building("b2", |b| b.core_mut().level += 1),
        compound.delete_building("b1")
    );
    updated.unwrap();
    deleted.unwrap();

    let expected = vec![("b2".to_string(), 1)];
    assert_eq!(building_levels(&compound.buildings()), expected);
    assert_eq!(
        building_levels(&repo.snapshot(&pid).unwrap().objects.buildings),
        expected
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_writes_from_different_services_keep_both() {
    let repo = seeded_repository("p1");
    let tracker = PlayerContextTracker::new(Arc::new(SlowWrites(Arc::clone(&repo))));
    let (conn, _client) = connection();
    let pid = PlayerId::new("p1");
    let ctx = tracker.create_context(pid.clone(), conn).await.unwrap();
    let services = &ctx.services;

    let (cash, recycled) = tokio::join!(
        services.compound.update_resources(|r| r.cash -= 100),
        services.batch_recycle.remove_job("r1")
    );
    cash.unwrap();
    assert!(recycled.unwrap().is_some());

    let stored = repo.snapshot(&pid).unwrap().objects;
    assert_eq!(stored.resources.cash, 400);
    assert!(stored.batch_recycles.is_empty());
}

#[tokio::test]
async fn test_create_context_replacement_flushes_previous_production() {
    let repo = seeded_repository("p1");
    let tracker = PlayerContextTracker::new(Arc::clone(&repo) as Arc<dyn PlayerRepository>);
    let (first, _c1) = connection();
    let (second, _c2) = connection();
    let pid = PlayerId::new("p1");

    tracker.create_context(pid.clone(), first).await.unwrap();
    let current = tracker.create_context(pid.clone(), second).await.unwrap();

    let stored = repo.snapshot(&pid).unwrap().objects;
    let wood = stored.buildings.iter().find(|b| b.id() == "b1").unwrap();
    assert!(wood.core().resource_value >= 10.0);
    let loaded = current.services.compound.building("b1").unwrap();
    assert!(loaded.core().resource_value >= 10.0);
}
