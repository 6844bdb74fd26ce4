//! Token → player resolution hook.
//!
//! The control plane authenticates requests by session token (sent as the
//! `playertoken` header or query parameter); the socket authenticates a
//! join by join key. Both are "give me the player behind this opaque
//! string", so they share one trait. [`SessionManager`](crate::SessionManager)
//! and [`JoinKeyManager`](crate::JoinKeyManager) implement it, and tests
//! can swap in a stub.

use pioforge_protocol::PlayerId;

use crate::SessionError;

/// Resolves an opaque token to a player identity.
///
/// `Send + Sync + 'static` because the authenticator lives for the whole
/// server and is called from many connection tasks at once.
///
/// # Example
///
/// ```rust
/// use pioforge_protocol::PlayerId;
/// use pioforge_session::{Authenticator, SessionError};
///
/// /// Accepts any non-empty token as the player id. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
///         if token.is_empty() {
///             return Err(SessionError::AuthFailed("empty token".into()));
///         }
///         Ok(PlayerId::new(token))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the player behind `token`, or why it was rejected.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send;
}
