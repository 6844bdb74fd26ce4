//! `Server` builder and accept loop.
//!
//! This is the entry point for running a pioforge game server. It ties
//! the layers together: transport → protocol → router → session/context/task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pioforge_context::{MemoryRepository, OnlinePlayerRegistry, PlayerContextTracker, PlayerRepository};
use pioforge_session::{JoinKeyConfig, JoinKeyManager, SessionConfig, SessionManager};
use pioforge_task::TaskScheduler;
use pioforge_transport::{ClientConnection, TcpTransport, Transport};
use tokio_util::sync::CancellationToken;

use crate::ServerError;
use crate::config::{GameReadyPayload, ServerConfig, SpeedUpTable};
use crate::connection::handle_connection;
use crate::router::MessageRouter;
use crate::save::SaveRouter;
use crate::tasks::JunkRemovalRegistry;

/// Shared server state handed to every connection and handler.
///
/// Wrapped in `Arc`; every registry inside is internally synchronised.
pub struct ServerContext {
    pub config: ServerConfig,
    pub sessions: Arc<SessionManager>,
    pub join_keys: Arc<JoinKeyManager>,
    pub tracker: Arc<PlayerContextTracker>,
    pub online: Arc<OnlinePlayerRegistry>,
    pub scheduler: Arc<TaskScheduler>,
    pub junk_removals: Arc<JunkRemovalRegistry>,
}

impl ServerContext {
    /// Builds the registries. Sweepers are not started.
    pub fn new(config: ServerConfig, repository: Arc<dyn PlayerRepository>) -> Self {
        let config = config.validated();
        Self {
            sessions: Arc::new(SessionManager::new(config.session.clone())),
            join_keys: Arc::new(JoinKeyManager::new(config.join_key.clone())),
            tracker: Arc::new(PlayerContextTracker::new(repository)),
            online: Arc::new(OnlinePlayerRegistry::new()),
            scheduler: Arc::new(TaskScheduler::new()),
            junk_removals: Arc::new(JunkRemovalRegistry::new()),
            config,
        }
    }

    /// Port the server listens on, as advertised in the policy file.
    pub fn port(&self) -> u16 {
        self.config
            .bind_addr
            .parse::<SocketAddr>()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }

    /// Tears down every registry. Pending tasks are cancelled last so
    /// their cleanup still finds the other registries.
    pub async fn shutdown(&self) {
        self.tracker.shutdown().await;
        self.online.clear();
        self.sessions.shutdown();
        self.join_keys.shutdown();
        self.junk_removals.clear();
        self.scheduler.shutdown().await;
        tracing::info!("server context shut down");
    }
}

/// Builder for configuring and starting a pioforge server.
///
/// # Example
///
/// ```rust,ignore
/// let server = Server::builder()
///     .bind("0.0.0.0:7777")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    repository: Option<Arc<dyn PlayerRepository>>,
    saves: Option<SaveRouter>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            repository: None,
            saves: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn join_key_config(mut self, config: JoinKeyConfig) -> Self {
        self.config.join_key = config;
        self
    }

    pub fn speed_ups(mut self, table: SpeedUpTable) -> Self {
        self.config.speed_ups = table;
        self
    }

    pub fn game_ready(mut self, payload: GameReadyPayload) -> Self {
        self.config.game_ready = payload;
        self
    }

    /// How long a connection may stay silent before it is dropped.
    pub fn keepalive(mut self, timeout: Duration) -> Self {
        self.config.keepalive_timeout = timeout;
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Player storage. Defaults to an empty [`MemoryRepository`].
    pub fn repository(mut self, repository: Arc<dyn PlayerRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Save routing. Defaults to [`SaveRouter::standard`].
    pub fn save_router(mut self, saves: SaveRouter) -> Self {
        self.saves = Some(saves);
        self
    }

    /// Binds the listener, builds the shared context and starts the
    /// session and join-key sweepers.
    pub async fn build(self) -> Result<Server, ServerError> {
        let mut config = self.config.validated();
        let transport = TcpTransport::bind(&config.bind_addr)
            .await?
            .with_read_buffer_size(config.read_buffer_size);
        // Resolve port 0 so the policy file names the real port.
        config.bind_addr = transport.local_addr()?.to_string();

        let saves = match self.saves {
            Some(saves) => saves,
            None => SaveRouter::standard()?,
        };
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(MemoryRepository::new()));

        let context = Arc::new(ServerContext::new(config, repository));
        context.sessions.start_sweeper();
        context.join_keys.start_sweeper();

        Ok(Server {
            transport,
            context,
            router: Arc::new(MessageRouter::standard(saves)),
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound pioforge server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Server {
    transport: TcpTransport,
    context: Arc<ServerContext>,
    router: Arc<MessageRouter>,
    shutdown: CancellationToken,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The shared context, e.g. to mint join keys from outside.
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Token that stops [`run()`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the accept loop until the shutdown token is cancelled, then
    /// shuts the context down.
    ///
    /// Each accepted socket gets its own task running the connection loop.
    pub async fn run(mut self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.context.config.bind_addr, "pioforge server running");

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.transport.accept() => accepted,
            };
            match accepted {
                Ok(socket) => {
                    let peer = socket.peer().to_string();
                    let connection = ClientConnection::new(socket, peer);
                    let context = Arc::clone(&self.context);
                    let router = Arc::clone(&self.router);
                    tokio::spawn(handle_connection(connection, context, router));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        if let Err(e) = self.transport.shutdown().await {
            tracing::debug!(error = %e, "transport shutdown failed");
        }
        self.context.shutdown().await;
        Ok(())
    }
}
