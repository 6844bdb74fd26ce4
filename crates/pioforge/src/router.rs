//! Top-level message routing.
//!
//! Each decoded message is offered to the registered handlers in order;
//! the first whose [`SocketHandler::matches`] returns true handles it.
//! Messages nobody claims go to [`DefaultHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use pioforge_protocol::{Envelope, PlayerId, Value};
use pioforge_transport::ClientConnection;

use crate::ServerError;
use crate::handlers::{
    AuthHandler, InitCompleteHandler, JoinHandler, QuestProgressHandler, SurvivorCheckHandler,
    ZombieAttackHandler,
};
use crate::message;
use crate::save::{SaveHandler, SaveRouter};
use crate::server::ServerContext;

/// Everything a handler gets for one message.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub connection: &'a Arc<ClientConnection>,
    pub message: &'a Envelope,
    pub server: &'a Arc<ServerContext>,
}

impl HandlerContext<'_> {
    pub fn player_id(&self) -> PlayerId {
        self.connection.player_id()
    }

    /// Sends `[msg_type, args...]` on this message's connection.
    pub async fn send(
        &self,
        msg_type: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<(), ServerError> {
        self.connection.send_message(msg_type, args).await?;
        Ok(())
    }
}

/// Handles one kind of top-level message.
#[async_trait]
pub trait SocketHandler: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn matches(&self, message: &Envelope) -> bool;

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError>;
}

/// Ordered list of handlers plus the fallback.
pub struct MessageRouter {
    handlers: Vec<Box<dyn SocketHandler>>,
    fallback: DefaultHandler,
}

impl MessageRouter {
    /// A router with no handlers; everything hits the fallback.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            fallback: DefaultHandler,
        }
    }

    /// The game's handler set, in matching order.
    pub fn standard(saves: SaveRouter) -> Self {
        let mut router = Self::new();
        router
            .register(JoinHandler)
            .register(AuthHandler)
            .register(QuestProgressHandler)
            .register(InitCompleteHandler)
            .register(SaveHandler::new(saves))
            .register(ZombieAttackHandler)
            .register(SurvivorCheckHandler);
        router
    }

    /// Appends a handler. Earlier registrations win ties.
    pub fn register(&mut self, handler: impl SocketHandler) -> &mut Self {
        tracing::debug!(handler = handler.name(), "registered socket handler");
        self.handlers.push(Box::new(handler));
        self
    }

    /// The handler that will process `message`.
    pub fn route(&self, message: &Envelope) -> &dyn SocketHandler {
        self.handlers
            .iter()
            .find(|h| h.matches(message))
            .map(|h| h.as_ref())
            .unwrap_or(&self.fallback)
    }

    /// Routes and handles one message.
    pub async fn dispatch(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        let handler = self.route(ctx.message);
        tracing::debug!(
            conn = %ctx.connection.id(),
            handler = handler.name(),
            msg = %ctx.message.type_label(),
            "dispatching"
        );
        handler.handle(ctx).await
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Catches messages no other handler claims.
pub struct DefaultHandler;

#[async_trait]
impl SocketHandler for DefaultHandler {
    fn name(&self) -> &'static str {
        "default"
    }

    fn matches(&self, _message: &Envelope) -> bool {
        true
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        tracing::warn!(
            player_id = %ctx.player_id(),
            msg = %ctx.message.type_label(),
            "unhandled message"
        );
        ctx.send(message::UNHANDLED_REPLY, Vec::<Value>::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(values: Vec<Value>) -> Envelope {
        Envelope::parse(values)
    }

    fn standard() -> MessageRouter {
        MessageRouter::standard(SaveRouter::standard().unwrap())
    }

    #[test]
    fn test_route_join_by_field() {
        let router = standard();
        assert_eq!(router.route(&env(vec!["join".into(), "key".into()])).name(), "join");
    }

    #[test]
    fn test_route_save_and_init_complete_by_key() {
        let router = standard();
        assert_eq!(router.route(&env(vec!["s".into(), "{}".into()])).name(), "save");
        assert_eq!(router.route(&env(vec!["ic".into()])).name(), "init_complete");
    }

    #[test]
    fn test_route_survivor_check_by_type_or_key() {
        let router = standard();
        let typed = env(vec!["rsc".into(), "id".into(), "x".into()]);
        let keyed = env(vec!["rsc".into(), "{}".into()]);
        assert_eq!(router.route(&typed).name(), "survivor_check");
        assert_eq!(router.route(&keyed).name(), "survivor_check");
    }

    #[test]
    fn test_route_unknown_falls_back_to_default() {
        let router = standard();
        assert_eq!(router.route(&env(vec!["nope".into(), 1.into()])).name(), "default");
        assert_eq!(MessageRouter::new().route(&env(vec!["join".into(), "k".into()])).name(), "default");
    }

    #[test]
    fn test_route_first_registered_wins() {
        struct Everything(&'static str);

        #[async_trait]
        impl SocketHandler for Everything {
            fn name(&self) -> &'static str {
                self.0
            }
            fn matches(&self, _: &Envelope) -> bool {
                true
            }
            async fn handle(&self, _: HandlerContext<'_>) -> Result<(), ServerError> {
                Ok(())
            }
        }

        let mut router = MessageRouter::new();
        router.register(Everything("first")).register(Everything("second"));
        assert_eq!(router.len(), 2);
        assert_eq!(router.route(&env(vec![])).name(), "first");
    }
}
