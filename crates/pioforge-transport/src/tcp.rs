//! Plain TCP transport.
//!
//! Each accepted socket is split into owned read and write halves, each
//! behind its own async mutex so a scheduled task can write while the
//! connection loop is parked in `recv`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Default size of one socket read.
pub const DEFAULT_READ_BUFFER: usize = 4096;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A TCP listener producing [`TcpConnection`]s.
pub struct TcpTransport {
    listener: TcpListener,
    read_buffer_size: usize,
}

impl TcpTransport {
    /// Binds a listener to `addr`.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            read_buffer_size: DEFAULT_READ_BUFFER,
        })
    }

    /// Sets the size of each socket read for connections accepted from now on.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "could not set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let conn = TcpConnection::from_io(reader, writer, addr.to_string())
            .with_read_buffer_size(self.read_buffer_size);
        tracing::debug!(id = %conn.id(), %addr, "accepted TCP connection");
        Ok(conn)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// One client socket.
///
/// Built from any pair of async read/write halves, so tests can run the
/// whole stack over `tokio::io::duplex` instead of a real socket.
pub struct TcpConnection {
    id: ConnectionId,
    peer: String,
    reader: Mutex<BoxedReader>,
    writer: Mutex<BoxedWriter>,
    read_buffer_size: usize,
}

impl TcpConnection {
    /// Wraps a read half and a write half under a fresh connection id.
    pub fn from_io<R, W>(reader: R, writer: W, peer: impl Into<String>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id: ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            peer: peer.into(),
            reader: Mutex::new(Box::new(reader)),
            writer: Mutex::new(Box::new(writer)),
            read_buffer_size: DEFAULT_READ_BUFFER,
        }
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// The remote address as text.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut buf = vec![0u8; self.read_buffer_size];
        let n = self
            .reader
            .lock()
            .await
            .read(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_respects_read_buffer_size() {
        let (client, server) = tokio::io::duplex(64);
        let (r, w) = tokio::io::split(server);
        let conn = TcpConnection::from_io(r, w, "duplex").with_read_buffer_size(3);

        let (_client_r, mut client_w) = tokio::io::split(client);
        client_w.write_all(b"abcdef").await.unwrap();

        assert_eq!(conn.recv().await.unwrap().unwrap(), b"abc");
        assert_eq!(conn.recv().await.unwrap().unwrap(), b"def");
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_peer_closes() {
        let (client, server) = tokio::io::duplex(64);
        let (r, w) = tokio::io::split(server);
        let conn = TcpConnection::from_io(r, w, "duplex");
        drop(client);
        assert!(conn.recv().await.unwrap().is_none());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = TcpConnection::from_io(tokio::io::empty(), tokio::io::sink(), "a");
        let b = TcpConnection::from_io(tokio::io::empty(), tokio::io::sink(), "b");
        assert_ne!(a.id(), b.id());
    }
}
