//! Player sessions and join keys for pioforge.
//!
//! Two kinds of opaque token bind a network identity to a player:
//!
//! 1. **Session tokens** ([`SessionManager`]): issued on web login, used
//!    by the control plane, refreshed by the client every ~50 minutes and
//!    capped by a hard lifetime ceiling.
//! 2. **Join keys** ([`JoinKeyManager`]): short-lived, single-use tokens
//!    that carry a logged-in player across to the game socket.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← join handler resolves keys, control plane verifies tokens
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides PlayerId
//! ```
//!
//! Lookups check expiry themselves, so correctness never depends on the
//! background sweep; [`spawn_sweeper`] only reclaims memory.

#![allow(async_fn_in_trait)]

mod auth;
mod clock;
mod error;
mod join_key;
mod manager;
mod session;
mod sweeper;

pub use auth::Authenticator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use join_key::{JoinKeyConfig, JoinKeyManager};
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, ADMIN_PLAYER_ID, ADMIN_TOKEN};
pub use sweeper::{spawn_sweeper, Sweep};
