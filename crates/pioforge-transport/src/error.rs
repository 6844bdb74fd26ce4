use pioforge_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// An outgoing message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
