//! The registry of live player contexts.

use std::sync::Arc;

use dashmap::DashMap;
use pioforge_protocol::{PlayerId, epoch_millis};
use pioforge_transport::{ClientConnection, ConnectionId};

use crate::{ContextError, PlayerContext, PlayerRepository, PlayerServices};

/// Maps each joined player to their [`PlayerContext`].
///
/// A player has at most one context. Creating a context for a player who
/// already has one closes the old services and replaces it (the newest
/// join wins).
pub struct PlayerContextTracker {
    repository: Arc<dyn PlayerRepository>,
    contexts: DashMap<PlayerId, Arc<PlayerContext>>,
}

impl PlayerContextTracker {
    pub fn new(repository: Arc<dyn PlayerRepository>) -> Self {
        Self {
            repository,
            contexts: DashMap::new(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn PlayerRepository> {
        &self.repository
    }

    /// Loads a player and publishes their context.
    ///
    /// The account and player document must load; a service whose
    /// `init` fails is logged and left empty rather than failing the join.
    pub async fn create_context(
        &self,
        player_id: PlayerId,
        connection: Arc<ClientConnection>,
    ) -> Result<Arc<PlayerContext>, ContextError> {
        let account = self.repository.load_account(&player_id).await?;
        self.repository.load_player_objects(&player_id).await?;

        // The replaced session flushes first so the new services load
        // what it accumulated. Its own disconnect no longer owns the
        // context and skips the close.
        if let Some(previous) = self.get_context(&player_id) {
            close_services(&previous).await;
        }

        let services = PlayerServices::new(&player_id, &account, &self.repository);
        for service in services.all() {
            if let Err(e) = service.init(&player_id).await {
                tracing::error!(%player_id, service = service.name(), error = %e, "service init failed");
            }
        }

        let context = Arc::new(PlayerContext {
            player_id: player_id.clone(),
            connection,
            online_since: epoch_millis(),
            account,
            services,
        });

        if let Some(previous) = self.contexts.insert(player_id.clone(), Arc::clone(&context)) {
            tracing::info!(
                %player_id,
                old = %previous.connection.id(),
                new = %context.connection.id(),
                "player context replaced"
            );
        } else {
            tracing::info!(%player_id, connection = %context.connection.id(), "player context created");
        }
        Ok(context)
    }

    pub fn get_context(&self, player_id: &PlayerId) -> Option<Arc<PlayerContext>> {
        self.contexts.get(player_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`get_context`](Self::get_context), for handlers that cannot
    /// proceed without one.
    pub fn require_context(&self, player_id: &PlayerId) -> Result<Arc<PlayerContext>, ContextError> {
        self.get_context(player_id)
            .ok_or_else(|| ContextError::NotFound(player_id.clone()))
    }

    /// Publishes a modified copy of a player's context.
    ///
    /// Readers holding the old `Arc` keep seeing the old value.
    pub fn update_context(
        &self,
        player_id: &PlayerId,
        update: impl FnOnce(&mut PlayerContext),
    ) -> Option<Arc<PlayerContext>> {
        let mut entry = self.contexts.get_mut(player_id)?;
        let mut next = PlayerContext::clone(entry.value());
        update(&mut next);
        let next = Arc::new(next);
        *entry.value_mut() = Arc::clone(&next);
        Some(next)
    }

    /// Evicts a player's context and closes its services.
    pub async fn remove_player(&self, player_id: &PlayerId) -> Option<Arc<PlayerContext>> {
        let (_, context) = self.contexts.remove(player_id)?;
        close_services(&context).await;
        tracing::info!(%player_id, "player context removed");
        Some(context)
    }

    /// Evicts a player's context only if it still belongs to `connection`.
    ///
    /// A disconnecting socket uses this so it cannot evict the context a
    /// newer join has already put in place.
    pub async fn remove_player_for(
        &self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Option<Arc<PlayerContext>> {
        let (_, context) = self
            .contexts
            .remove_if(player_id, |_, ctx| ctx.connection.id() == connection)?;
        close_services(&context).await;
        tracing::info!(%player_id, %connection, "player context removed");
        Some(context)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.contexts.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Closes every context's services, shuts its connection down and
    /// clears the tracker.
    pub async fn shutdown(&self) {
        let contexts: Vec<Arc<PlayerContext>> = self
            .contexts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.contexts.clear();

        for context in &contexts {
            close_services(context).await;
            context.connection.shutdown().await;
        }
        tracing::info!(count = contexts.len(), "player context tracker shut down");
    }
}

async fn close_services(context: &PlayerContext) {
    for service in context.services.all() {
        if let Err(e) = service.close(&context.player_id).await {
            tracing::error!(
                player_id = %context.player_id,
                service = service.name(),
                error = %e,
                "service close failed"
            );
        }
    }
}
