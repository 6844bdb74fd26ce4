//! Error types for the session layer.

use pioforge_protocol::PlayerId;

/// Errors that can occur while resolving tokens.
///
/// On the control plane these surface as authentication failures; on the
/// socket they end the joining connection. None of them are process-fatal.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Authentication was rejected for a reason other than the token
    /// itself (for example by a custom [`Authenticator`](crate::Authenticator)).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session is registered under the given token.
    #[error("invalid session token")]
    InvalidToken,

    /// The session existed but is past its expiry or lifetime ceiling. It
    /// has been evicted.
    #[error("session expired for player {0}")]
    SessionExpired(PlayerId),

    /// The join key is unknown, already used, or past its TTL.
    #[error("invalid or expired join key")]
    JoinKeyInvalid,
}
