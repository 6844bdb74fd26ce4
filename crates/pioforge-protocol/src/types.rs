//! Identity and time types shared by every layer above the codec.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A durable player identity.
///
/// The control plane hands out string ids (database keys, or the fixed
/// admin id), so unlike a room counter this wraps a `String`. The newtype
/// keeps it from being mixed up with join keys or session tokens, which
/// are also plain strings.
///
/// `#[serde(transparent)]` serializes it as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Creates a player id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Server time
// ---------------------------------------------------------------------------

/// Milliseconds since the Unix epoch, as the client expects timestamps.
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Server time as sent in `gr`, `tu` and save replies.
///
/// The client reads this field with `getNumber`, which only accepts the
/// double tag, so it goes out as an `f64` of epoch milliseconds.
pub fn server_time() -> f64 {
    epoch_millis() as f64
}
