//! Transport layer for pioforge.
//!
//! The legacy client talks to the game server over a plain TCP socket,
//! with no framing beyond what the wire codec itself provides. This
//! crate provides:
//!
//! - [`Transport`] / [`Connection`]: the accept/send/recv abstraction.
//! - [`TcpTransport`] / [`TcpConnection`]: the socket implementation.
//! - [`ClientConnection`]: one connected client. It carries the evolving
//!   player identity, the activity clock and the cancellation scope that
//!   tasks and the read loop hang off.

#![allow(async_fn_in_trait)]

mod connection;
mod error;
mod tcp;

pub use connection::ClientConnection;
pub use error::TransportError;
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single byte-stream connection.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Writes all of `data` to the peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads the next chunk of bytes.
    ///
    /// Chunks have no relation to message boundaries. Returns `Ok(None)`
    /// when the peer closed the stream.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the write half.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
