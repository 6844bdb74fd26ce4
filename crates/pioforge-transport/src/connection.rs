//! A connected game client.
//!
//! [`ClientConnection`] is what the rest of the server passes around
//! (always as `Arc<ClientConnection>`). It owns the socket and knows
//! which player it belongs to once the join handshake is done. It also
//! owns a cancellation token that the read loop and every scheduled task
//! for this connection watch.

use std::fmt;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use pioforge_protocol::{encode_message, PlayerId, Value, UNDETERMINED};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Connection, ConnectionId, TcpConnection, TransportError};

/// One client socket plus its session-level state.
///
/// Generic over the socket so the same type serves real TCP and test
/// doubles; everything outside this crate uses the TCP default.
pub struct ClientConnection<C = TcpConnection> {
    socket: C,
    remote_addr: String,
    player_id: RwLock<PlayerId>,
    last_activity: Mutex<Instant>,
    cancel: CancellationToken,
}

impl<C> ClientConnection<C>
where
    C: Connection<Error = TransportError>,
{
    pub fn new(socket: C, remote_addr: impl Into<String>) -> Self {
        Self {
            socket,
            remote_addr: remote_addr.into(),
            player_id: RwLock::new(PlayerId::new(UNDETERMINED)),
            last_activity: Mutex::new(Instant::now()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.socket.id()
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// The bound player, or `"[Undetermined]"` before a successful join.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Binds this connection to a player. Called by the join handler.
    pub fn set_player_id(&self, player_id: PlayerId) {
        *self
            .player_id
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = player_id;
    }

    /// True once a join has bound a real player.
    pub fn is_joined(&self) -> bool {
        self.player_id().as_str() != UNDETERMINED
    }

    /// Marks the connection as active now.
    pub fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Time since the last send or receive.
    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }

    /// A child handle on this connection's cancellation scope.
    ///
    /// Cancelled exactly once, by [`shutdown`](Self::shutdown).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reads the next chunk from the socket.
    ///
    /// Returns `Ok(None)` on a clean close or once the connection has
    /// been shut down.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            chunk = self.socket.recv() => {
                let chunk = chunk?;
                if chunk.is_some() {
                    self.touch();
                }
                Ok(chunk)
            }
        }
    }

    /// Writes pre-encoded bytes.
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed(self.remote_addr.clone()));
        }
        tracing::trace!(conn = %self.id(), len = bytes.len(), "sending raw");
        self.socket.send(bytes).await.inspect_err(|e| {
            tracing::error!(addr = %self.remote_addr, error = %e, "failed to send raw bytes");
        })?;
        self.touch();
        Ok(())
    }

    /// Encodes and sends `[msg_type, args...]`.
    ///
    /// Encode and write failures are both returned to the caller; a write
    /// failure means the connection is gone.
    pub async fn send_message(
        &self,
        msg_type: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<(), TransportError> {
        let bytes = encode_message(msg_type, args)?;
        tracing::debug!(conn = %self.id(), msg_type, len = bytes.len(), "sending message");
        self.send_raw(&bytes).await.inspect_err(|e| {
            tracing::error!(
                addr = %self.remote_addr,
                msg_type,
                error = %e,
                "failed to send message"
            );
        })
    }

    /// Cancels the connection scope and closes the socket.
    ///
    /// Idempotent. Close errors are logged, not returned: the connection
    /// is being torn down either way.
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        if let Err(e) = self.socket.close().await {
            tracing::warn!(conn = %self.id(), error = %e, "error while closing socket");
        }
    }
}

impl<C: Connection<Error = TransportError>> fmt::Display for ClientConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection(player={}, id={}, addr={})",
            self.player_id(),
            self.id(),
            self.remote_addr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pioforge_protocol::decode;
    use tokio::io::AsyncReadExt;

    fn duplex_connection() -> (ClientConnection, tokio::io::DuplexStream) {
        let (client, server) = tokio::io::duplex(1024);
        let (r, w) = tokio::io::split(server);
        let conn = ClientConnection::new(TcpConnection::from_io(r, w, "test"), "test");
        (conn, client)
    }

    #[tokio::test]
    async fn test_new_connection_is_undetermined() {
        let (conn, _client) = duplex_connection();
        assert_eq!(conn.player_id().as_str(), UNDETERMINED);
        assert!(!conn.is_joined());

        conn.set_player_id(PlayerId::new("p1"));
        assert!(conn.is_joined());
        assert!(conn.to_string().contains("player=p1"));
    }

    #[tokio::test]
    async fn test_send_message_prepends_type() {
        let (conn, mut client) = duplex_connection();
        conn.send_message("tu", [Value::Double(5.0)]).await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        let msgs = decode(&buf[..n]).unwrap();
        assert_eq!(msgs, vec![vec![Value::from("tu"), Value::Double(5.0)]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_updates_last_activity() {
        let (conn, _client) = duplex_connection();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(conn.idle_for() >= Duration::from_secs(10));

        conn.send_raw(b"x").await.unwrap();
        assert_eq!(conn.idle_for(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_scope_and_rejects_sends() {
        let (conn, _client) = duplex_connection();
        let token = conn.cancel_token();

        conn.shutdown().await;
        assert!(token.is_cancelled());
        assert!(conn.is_closed());
        assert!(matches!(
            conn.send_raw(b"late").await,
            Err(TransportError::ConnectionClosed(_))
        ));
        // second call is a no-op
        conn.shutdown().await;
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_shutdown() {
        let (conn, _client) = duplex_connection();
        conn.shutdown().await;
        assert!(conn.recv().await.unwrap().is_none());
    }
}
