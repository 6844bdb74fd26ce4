use async_trait::async_trait;
use pioforge_protocol::Envelope;

use crate::ServerError;
use crate::message;
use crate::router::{HandlerContext, SocketHandler};
use crate::tasks::TimeUpdateTask;

/// `ic`: the client finished loading. The player is marked online and
/// the once-a-second time update starts.
pub struct InitCompleteHandler;

#[async_trait]
impl SocketHandler for InitCompleteHandler {
    fn name(&self) -> &'static str {
        "init_complete"
    }

    fn matches(&self, message: &Envelope) -> bool {
        // `ic` carries no value.
        message.contains(message::INIT_COMPLETE)
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        let player_id = ctx.player_id();
        ctx.server.online.mark_online(player_id.clone());
        ctx.server
            .scheduler
            .schedule(ctx.connection, TimeUpdateTask)
            .await?;
        tracing::info!(%player_id, "init complete");
        Ok(())
    }
}
