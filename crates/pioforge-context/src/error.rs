//! Error types for the player context layer.

use pioforge_protocol::PlayerId;

/// Failures reported by a [`PlayerRepository`](crate::PlayerRepository).
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// No record exists for this player.
    #[error("no stored record for player {0}")]
    NotFound(PlayerId),

    /// The backing store failed (connection lost, bad document...).
    #[error("persistence backend error: {0}")]
    Backend(String),

    /// A stored document did not match the expected shape.
    #[error("stored document is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistenceError {
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend(reason.into())
    }
}

/// Errors from context lookups and game-service operations.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// No live context is tracked for this player.
    #[error("no player context for {0}")]
    NotFound(PlayerId),

    /// The service has no entity with this id.
    #[error("{kind} {id} not found for player {player_id}")]
    EntityNotFound {
        kind: &'static str,
        id: String,
        player_id: PlayerId,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ContextError {
    pub(crate) fn entity(kind: &'static str, id: impl Into<String>, player_id: &PlayerId) -> Self {
        Self::EntityNotFound {
            kind,
            id: id.into(),
            player_id: player_id.clone(),
        }
    }
}
