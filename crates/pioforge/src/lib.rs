//! # Pioforge
//!
//! Socket server for a legacy Player.IO game client.
//!
//! The client keeps one TCP socket open for the whole session and speaks
//! the Player.IO binary tag format on it. This crate ties the layers
//! together:
//!
//! ```text
//! TcpTransport → connection loop → WireCodec → Envelope → MessageRouter
//!                                                            ├─ join / auth / qp / ic / rza / rsc
//!                                                            └─ SaveHandler → SaveRouter → sub-handlers
//!                                                                                 └─ TaskScheduler
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pioforge::prelude::*;
//!
//! # async fn run() -> Result<(), ServerError> {
//! pioforge::init_tracing();
//! let server = Server::builder()
//!     .bind("0.0.0.0:7777")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod message;
pub mod router;
pub mod save;
pub mod server;
pub mod tasks;

pub use config::{GameReadyPayload, ServerConfig, SpeedUpOption, SpeedUpTable};
pub use error::{RouterError, ServerError};
pub use router::{HandlerContext, MessageRouter, SocketHandler};
pub use server::{Server, ServerBuilder, ServerContext};

/// Installs the global `tracing` subscriber.
///
/// Reads the filter from `RUST_LOG`, falling back to `info`. Calling it
/// twice is harmless; the second call is ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

pub mod prelude {
    pub use crate::config::{GameReadyPayload, ServerConfig, SpeedUpTable};
    pub use crate::error::ServerError;
    pub use crate::router::{HandlerContext, SocketHandler};
    pub use crate::save::{SaveContext, SaveSubHandler};
    pub use crate::server::{Server, ServerBuilder, ServerContext};
    pub use pioforge_context::{MemoryRepository, PlayerRecord, PlayerRepository};
    pub use pioforge_protocol::{Envelope, PlayerId, Value};
    pub use pioforge_session::{JoinKeyConfig, SessionConfig};
}
