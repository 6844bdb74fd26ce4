//! The session manager: every issued control-plane token.
//!
//! # Lifecycle
//!
//! ```text
//! create() ──→ [valid] ──refresh()──→ [valid, expires_at pushed out]
//!                 │                          │
//!                 ▼ now >= expires_at        ▼ now - issued_at > lifetime
//!            evicted on next lookup     refresh() fails, evicted
//! ```
//!
//! # Concurrency note
//!
//! Unlike a single-owner registry, this one is read from every connection
//! task and from control-plane handlers at once, so it is backed by a
//! `DashMap`. Every operation touches a single key.

use std::sync::Arc;

use dashmap::DashMap;
use pioforge_protocol::PlayerId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    spawn_sweeper, Authenticator, Clock, Session, SessionConfig, SessionError, Sweep,
    SystemClock, ADMIN_PLAYER_ID, ADMIN_TOKEN,
};

/// Issues, verifies and refreshes session tokens.
pub struct SessionManager {
    /// token → session
    sessions: DashMap<String, Session>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl SessionManager {
    /// Creates a manager on the system clock.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            config: config.validated(),
            clock,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Starts the periodic expiry sweep. Stops on [`shutdown`](Self::shutdown)
    /// or when the manager is dropped.
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        spawn_sweeper(
            Arc::downgrade(self),
            self.config.sweep_interval,
            self.cancel.child_token(),
        )
    }

    /// Issues a new session for `player_id`.
    ///
    /// The admin identity always receives the reserved token, replacing
    /// any earlier admin session.
    pub fn create(&self, player_id: PlayerId) -> Session {
        let now = self.clock.now_millis();
        let token = if player_id.as_str() == ADMIN_PLAYER_ID {
            ADMIN_TOKEN.to_string()
        } else {
            uuid::Uuid::new_v4().to_string()
        };

        let session = Session {
            player_id,
            token: token.clone(),
            issued_at: now,
            expires_at: now + self.config.duration.as_millis() as i64,
            lifetime: self.config.lifetime.as_millis() as i64,
        };
        self.sessions.insert(token, session.clone());
        tracing::info!(player_id = %session.player_id, "session created");
        session
    }

    /// Resolves a token to its player, evicting it if it has expired.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: unknown token.
    /// - [`SessionError::SessionExpired`]: the session was past expiry and
    ///   has been removed.
    pub fn check(&self, token: &str) -> Result<PlayerId, SessionError> {
        let now = self.clock.now_millis();
        let valid = self
            .sessions
            .get(token)
            .map(|s| (s.is_valid_at(now), s.player_id.clone()))
            .ok_or(SessionError::InvalidToken)?;

        match valid {
            (true, player_id) => Ok(player_id),
            (false, player_id) => {
                self.sessions.remove(token);
                tracing::debug!(%player_id, "session expired on lookup");
                Err(SessionError::SessionExpired(player_id))
            }
        }
    }

    /// True iff the token names a live session. Expired sessions are
    /// evicted as a side effect.
    pub fn verify(&self, token: &str) -> bool {
        self.check(token).is_ok()
    }

    /// Extends the session by one window from now.
    ///
    /// The new expiry never passes `issued_at + lifetime`. Once the
    /// lifetime ceiling has passed the session is evicted and `false` is
    /// returned; the player must log in again.
    pub fn refresh(&self, token: &str) -> bool {
        let now = self.clock.now_millis();
        let Some(mut session) = self.sessions.get_mut(token) else {
            return false;
        };

        if session.lifetime_exceeded_at(now) {
            let player_id = session.player_id.clone();
            drop(session);
            self.sessions.remove(token);
            tracing::info!(%player_id, "session lifetime exceeded, refresh refused");
            return false;
        }

        let window_end = now + self.config.duration.as_millis() as i64;
        let ceiling = session.issued_at + session.lifetime;
        session.expires_at = window_end.min(ceiling);
        true
    }

    /// The player bound to a live token.
    pub fn get_player_id(&self, token: &str) -> Option<PlayerId> {
        self.check(token).ok()
    }

    /// A copy of the live session under `token`, evicting it if expired.
    pub fn get_session(&self, token: &str) -> Option<Session> {
        self.check(token).ok()?;
        self.sessions.get(token).map(|s| s.clone())
    }

    /// Removes one token. Returns whether it existed.
    pub fn invalidate(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Removes every session belonging to `player_id` and returns how many
    /// there were.
    pub fn invalidate_player(&self, player_id: &PlayerId) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| &s.player_id != player_id);
        before.saturating_sub(self.sessions.len())
    }

    /// Evicts every expired session and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.is_valid_at(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stops the sweeper and drops every session.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.sessions.clear();
        tracing::info!("session manager shut down");
    }
}

impl Sweep for SessionManager {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn sweep_expired(&self) -> usize {
        SessionManager::sweep_expired(self)
    }
}

impl Authenticator for SessionManager {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send {
        let result = self.check(token);
        async move { result }
    }
}

// =========================================================================
// Tests
// =========================================================================
