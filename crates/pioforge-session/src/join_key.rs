//! Single-use join keys for the socket handshake.
//!
//! After a web login the control plane calls [`JoinKeyManager::create`] and
//! hands the key to the client, which presents it in its first socket
//! message (`["join", key]`). [`resolve`](JoinKeyManager::resolve) removes
//! the key in the same step that reads it, so a key can never be replayed.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use pioforge_protocol::PlayerId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{spawn_sweeper, Authenticator, Clock, SessionError, Sweep, SystemClock};

/// Timing knobs for [`JoinKeyManager`].
#[derive(Debug, Clone)]
pub struct JoinKeyConfig {
    /// How long a key stays resolvable. Default: 10 minutes.
    pub ttl: Duration,
    /// Default: 5 minutes.
    pub sweep_interval: Duration,
}

impl Default for JoinKeyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl JoinKeyConfig {
    pub fn validated(mut self) -> Self {
        self.ttl = self.ttl.max(Duration::from_secs(1));
        self.sweep_interval = self.sweep_interval.max(Duration::from_secs(1));
        self
    }
}

#[derive(Debug, Clone)]
struct JoinKeyEntry {
    player_id: PlayerId,
    created_at: i64,
    expires_at: i64,
}

/// Issues and redeems join keys.
pub struct JoinKeyManager {
    keys: DashMap<String, JoinKeyEntry>,
    config: JoinKeyConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl JoinKeyManager {
    pub fn new(config: JoinKeyConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: JoinKeyConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: DashMap::new(),
            config: config.validated(),
            clock,
            cancel: CancellationToken::new(),
        }
    }

    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        spawn_sweeper(
            Arc::downgrade(self),
            self.config.sweep_interval,
            self.cancel.child_token(),
        )
    }

    /// Issues a fresh key bound to `player_id`.
    pub fn create(&self, player_id: PlayerId) -> String {
        let now = self.clock.now_millis();
        let key = uuid::Uuid::new_v4().to_string();
        tracing::debug!(%player_id, "join key issued");
        self.keys.insert(
            key.clone(),
            JoinKeyEntry {
                player_id,
                created_at: now,
                expires_at: now + self.config.ttl.as_millis() as i64,
            },
        );
        key
    }

    /// Consumes `key` and returns its player if it had not expired.
    ///
    /// The key is removed whether or not it was still valid; a second
    /// call with the same key always returns `None`.
    pub fn resolve(&self, key: &str) -> Option<PlayerId> {
        let (_, entry) = self.keys.remove(key)?;
        let now = self.clock.now_millis();
        if now < entry.expires_at {
            Some(entry.player_id)
        } else {
            tracing::debug!(
                player_id = %entry.player_id,
                age_ms = now - entry.created_at,
                "join key expired"
            );
            None
        }
    }

    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.keys.len();
        self.keys.retain(|_, e| now < e.expires_at);
        before.saturating_sub(self.keys.len())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.keys.clear();
        tracing::info!("join key manager shut down");
    }
}

impl Sweep for JoinKeyManager {
    fn name(&self) -> &'static str {
        "join_keys"
    }

    fn sweep_expired(&self) -> usize {
        JoinKeyManager::sweep_expired(self)
    }
}

impl Authenticator for JoinKeyManager {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send {
        let result = self.resolve(token).ok_or(SessionError::JoinKeyInvalid);
        async move { result }
    }
}
