//! Per-connection read loop and disconnect cleanup.
//!
//! Each accepted socket gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. First chunk: answer a policy-file request, or strip the leading NUL
//!   2. Feed chunks through the wire codec; route each decoded message
//!   3. On close, timeout or a fatal error: clean up the player's state

use std::sync::Arc;

use bytes::BytesMut;
use pioforge_protocol::{Envelope, WireCodec, epoch_millis};
use pioforge_transport::ClientConnection;
use tokio_util::codec::Decoder;

use crate::ServerError;
use crate::message;
use crate::router::{HandlerContext, MessageRouter};
use crate::server::ServerContext;

/// Handles a single connection from accept to close.
pub async fn handle_connection(
    connection: ClientConnection,
    server: Arc<ServerContext>,
    router: Arc<MessageRouter>,
) {
    let connection = Arc::new(connection);
    tracing::debug!(conn = %connection.id(), addr = connection.remote_addr(), "handling new connection");

    if let Err(e) = read_loop(&connection, &server, &router).await {
        tracing::debug!(conn = %connection.id(), error = %e, "connection ended with error");
    }
    cleanup(&connection, &server).await;
}

async fn read_loop(
    connection: &Arc<ClientConnection>,
    server: &Arc<ServerContext>,
    router: &MessageRouter,
) -> Result<(), ServerError> {
    let keepalive = server.config.keepalive_timeout;
    let mut buffer = BytesMut::with_capacity(server.config.read_buffer_size);
    let mut codec = WireCodec::with_max_size(server.config.max_message_size);
    let mut first_chunk = true;

    loop {
        let chunk = match tokio::time::timeout(keepalive, connection.recv()).await {
            Ok(Ok(Some(chunk))) => chunk,
            Ok(Ok(None)) => {
                tracing::debug!(conn = %connection.id(), "connection closed");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::info!(
                    conn = %connection.id(),
                    player_id = %connection.player_id(),
                    timeout_secs = keepalive.as_secs(),
                    "connection timed out"
                );
                return Ok(());
            }
        };
        connection.touch();

        let mut bytes = chunk.as_slice();
        if std::mem::take(&mut first_chunk) {
            if bytes.starts_with(message::POLICY_FILE_REQUEST) {
                tracing::debug!(conn = %connection.id(), "serving policy file");
                connection
                    .send_raw(&message::policy_file_response(server.port()))
                    .await?;
                return Ok(());
            }
            if let [0, rest @ ..] = bytes {
                bytes = rest;
            }
        }
        buffer.extend_from_slice(bytes);

        loop {
            let values = match codec.decode(&mut buffer) {
                Ok(Some(values)) => values,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(
                        conn = %connection.id(),
                        error = %e,
                        dropped = buffer.len(),
                        "undecodable input, discarding buffer"
                    );
                    buffer.clear();
                    break;
                }
            };
            let envelope = Envelope::parse(values);
            if envelope.is_empty() {
                continue;
            }

            let ctx = HandlerContext {
                connection,
                message: &envelope,
                server,
            };
            if let Err(e) = router.dispatch(ctx).await {
                if e.is_fatal() {
                    tracing::warn!(
                        conn = %connection.id(),
                        msg = %envelope.type_label(),
                        error = %e,
                        "fatal handler error, closing"
                    );
                    return Err(e);
                }
                tracing::error!(
                    player_id = %connection.player_id(),
                    msg = %envelope.type_label(),
                    error = %e,
                    "handler failed"
                );
            }
        }
    }
}

/// Releases everything the connection held.
///
/// Player-level state is only touched while this connection still owns
/// the player's context; a newer connection for the same player keeps
/// its own.
async fn cleanup(connection: &Arc<ClientConnection>, server: &ServerContext) {
    let conn_id = connection.id();
    if connection.is_joined() {
        let player_id = connection.player_id();
        let owns_context = server
            .tracker
            .get_context(&player_id)
            .is_some_and(|ctx| ctx.connection.id() == conn_id);

        if owns_context {
            server.online.mark_offline(&player_id);
            if let Err(e) = server
                .tracker
                .repository()
                .update_last_login(&player_id, epoch_millis())
                .await
            {
                tracing::warn!(%player_id, error = %e, "could not record last login");
            }
            server.tracker.remove_player_for(&player_id, conn_id).await;
        }
        tracing::info!(%player_id, conn = %conn_id, owns_context, "player disconnected");
    }

    let stopped = server.scheduler.stop_all_for_connection(conn_id).await;
    if stopped > 0 {
        tracing::debug!(conn = %conn_id, stopped, "stopped connection tasks");
    }
    connection.shutdown().await;
}
