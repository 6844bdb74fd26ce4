use async_trait::async_trait;
use pioforge_protocol::{Envelope, Value};

use crate::ServerError;
use crate::message;
use crate::router::{HandlerContext, SocketHandler};

/// Quest progress the client gets before any quest state is kept.
const EMPTY_QUEST_PROGRESS: &str = r#"{"complete":null,"progress":null}"#;

/// The client's hash of the binaries it received. Nothing checks it.
pub struct AuthHandler;

#[async_trait]
impl SocketHandler for AuthHandler {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn matches(&self, message: &Envelope) -> bool {
        message.msg_type() == Some(message::AUTH) || message.contains(message::AUTH)
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        tracing::info!(player_id = %ctx.player_id(), "auth received, ignoring");
        Ok(())
    }
}

pub struct QuestProgressHandler;

#[async_trait]
impl SocketHandler for QuestProgressHandler {
    fn name(&self) -> &'static str {
        "quest_progress"
    }

    fn matches(&self, message: &Envelope) -> bool {
        message.get_str(message::QUEST_PROGRESS).is_some()
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        ctx.send(message::QUEST_PROGRESS, [Value::from(EMPTY_QUEST_PROGRESS)])
            .await
    }
}

/// Acknowledges a requested compound attack with a bare `["za"]`.
pub struct ZombieAttackHandler;

#[async_trait]
impl SocketHandler for ZombieAttackHandler {
    fn name(&self) -> &'static str {
        "zombie_attack"
    }

    fn matches(&self, message: &Envelope) -> bool {
        message.contains(message::REQUEST_ZOMBIE_ATTACK)
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        tracing::debug!(player_id = %ctx.player_id(), "zombie attack requested");
        ctx.send(message::ZOMBIE_ATTACK, Vec::<Value>::new()).await
    }
}
