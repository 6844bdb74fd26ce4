//! Unified error type for the pioforge server.

use pioforge_context::{ContextError, PersistenceError};
use pioforge_protocol::ProtocolError;
use pioforge_session::SessionError;
use pioforge_task::TaskError;
use pioforge_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// Handlers return this, so `?` works on anything the lower layers
/// produce. The connection loop decides what is fatal: [`Fatal`] and
/// transport failures end the connection, everything else is logged.
///
/// [`Fatal`]: ServerError::Fatal
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The connection cannot continue (for example a rejected join).
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ServerError {
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    /// Whether the connection loop must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Fatal(_) | Self::Io(_) | Self::Transport(_) | Self::Task(TaskError::Connection(_))
        )
    }
}

impl From<PersistenceError> for ServerError {
    fn from(err: PersistenceError) -> Self {
        Self::Context(ContextError::Persistence(err))
    }
}

/// Router configuration mistakes, caught when handlers are registered.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Two save handlers claim the same subtype.
    #[error("save subtype {subtype} claimed by both {existing} and {incoming}")]
    DuplicateSaveType {
        subtype: String,
        existing: &'static str,
        incoming: &'static str,
    },
}
