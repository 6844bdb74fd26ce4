//! Session types and configuration.

use std::time::Duration;

use pioforge_protocol::PlayerId;

/// The built-in administrator identity.
pub const ADMIN_PLAYER_ID: &str = "admin-player-id";

/// The reserved token always issued to [`ADMIN_PLAYER_ID`].
pub const ADMIN_TOKEN: &str = "";

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing knobs for [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Validity window of a fresh or refreshed session.
    ///
    /// Default: 1 hour. The client refreshes every ~50 minutes.
    pub duration: Duration,

    /// Hard ceiling measured from `issued_at`. Refresh fails past it.
    ///
    /// Default: 6 hours.
    pub lifetime: Duration,

    /// How often the background sweep evicts expired sessions.
    ///
    /// Default: 5 minutes.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60 * 60),
            lifetime: Duration::from_secs(6 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl SessionConfig {
    /// Clamps the config to usable values.
    ///
    /// - `duration` is at least one second.
    /// - `lifetime` is never shorter than `duration`.
    /// - `sweep_interval` is at least one second.
    pub fn validated(mut self) -> Self {
        self.duration = self.duration.max(Duration::from_secs(1));
        self.lifetime = self.lifetime.max(self.duration);
        self.sweep_interval = self.sweep_interval.max(Duration::from_secs(1));
        self
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One issued session token.
///
/// All times are epoch milliseconds taken from the manager's
/// [`Clock`](crate::Clock).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub player_id: PlayerId,
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
    /// Lifetime ceiling in milliseconds.
    pub lifetime: i64,
}

impl Session {
    /// True iff `now < expires_at` and the lifetime ceiling has not passed.
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at && now - self.issued_at <= self.lifetime
    }

    /// True once `now - issued_at` is past the lifetime ceiling.
    pub fn lifetime_exceeded_at(&self, now: i64) -> bool {
        now - self.issued_at > self.lifetime
    }
}
