use std::fmt;
use std::sync::Arc;

use pioforge_protocol::PlayerId;
use pioforge_transport::ClientConnection;

use crate::{Account, PlayerServices};

/// Everything the server holds for one joined player.
///
/// Shared as `Arc<PlayerContext>`. Fields are plain values; mutable game
/// state lives inside the services, each behind its own lock.
#[derive(Clone)]
pub struct PlayerContext {
    pub player_id: PlayerId,
    pub connection: Arc<ClientConnection>,
    /// Epoch milliseconds at which the context was created.
    pub online_since: i64,
    pub account: Account,
    pub services: PlayerServices,
}

impl fmt::Debug for PlayerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerContext")
            .field("player_id", &self.player_id)
            .field("connection", &self.connection.id())
            .field("online_since", &self.online_since)
            .finish_non_exhaustive()
    }
}
