use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pioforge_protocol::PlayerId;

use super::lock;
use crate::service::write_objects;
use crate::{ContextError, GameService, PlayerRepository, WriteLock};

#[derive(Default)]
struct Metadata {
    nickname: Option<String>,
    flags: Vec<u8>,
}

/// Nickname and progress flags from the player document.
///
/// A missing nickname makes the client open leader creation.
pub struct MetadataService {
    player_id: PlayerId,
    repository: Arc<dyn PlayerRepository>,
    writes: WriteLock,
    state: Mutex<Metadata>,
}

impl MetadataService {
    pub fn new(player_id: PlayerId, repository: Arc<dyn PlayerRepository>, writes: WriteLock) -> Self {
        Self {
            player_id,
            repository,
            writes,
            state: Mutex::new(Metadata::default()),
        }
    }

    pub fn nickname(&self) -> Option<String> {
        lock(&self.state).nickname.clone()
    }

    pub fn flags(&self) -> Vec<u8> {
        lock(&self.state).flags.clone()
    }

    pub async fn set_nickname(&self, nickname: impl Into<String>) -> Result<(), ContextError> {
        let nickname = nickname.into();
        let _write = self.writes.acquire().await;
        let stored = nickname.clone();
        write_objects(self.repository.as_ref(), &self.player_id, move |o| {
            o.nickname = Some(stored)
        })
        .await?;
        lock(&self.state).nickname = Some(nickname);
        Ok(())
    }

    pub async fn set_flags(&self, flags: Vec<u8>) -> Result<(), ContextError> {
        let _write = self.writes.acquire().await;
        let stored = flags.clone();
        write_objects(self.repository.as_ref(), &self.player_id, move |o| {
            o.flags = stored
        })
        .await?;
        lock(&self.state).flags = flags;
        Ok(())
    }
}

#[async_trait]
impl GameService for MetadataService {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn init(&self, player_id: &PlayerId) -> Result<(), ContextError> {
        let objects = self.repository.load_player_objects(player_id).await?;
        if objects.flags.is_empty() {
            tracing::warn!(%player_id, "player flags are empty");
        }
        let mut state = lock(&self.state);
        state.nickname = objects.nickname;
        state.flags = objects.flags;
        Ok(())
    }

    async fn close(&self, _player_id: &PlayerId) -> Result<(), ContextError> {
        Ok(())
    }
}
