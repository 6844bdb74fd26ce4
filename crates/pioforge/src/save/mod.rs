//! Save messages and their sub-router.
//!
//! A save is `["s", json]` where the JSON is `{"id": saveId, "data":
//! {"_type": SUBTYPE, ...}}`. The top-level [`SaveHandler`] unwraps it and
//! hands it to whichever [`SaveSubHandler`] claimed that subtype. Replies
//! are framed as `["r", saveId, serverTime, payload...]`.

mod building;
mod logging;
pub mod methods;
mod mission;
mod task;

pub use building::BuildingSaveHandler;
pub use logging::LoggingSaveHandler;
pub use mission::MissionSaveHandler;
pub use task::TaskSaveHandler;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use pioforge_context::PlayerContext;
use pioforge_protocol::{Envelope, PlayerId, Value, server_time};
use pioforge_transport::ClientConnection;
use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::error::RouterError;
use crate::message;
use crate::router::{HandlerContext, SocketHandler};
use crate::server::ServerContext;
use crate::ServerError;

/// Save id used when the client sent none.
const ANONYMOUS_SAVE_ID: &str = "m";

/// Builds the arguments of a save reply, after the `"r"` type tag.
pub fn save_reply_args(
    save_id: Option<&str>,
    payload: impl IntoIterator<Item = Value>,
) -> Vec<Value> {
    let mut args = vec![
        Value::from(save_id.unwrap_or(ANONYMOUS_SAVE_ID)),
        Value::from(server_time()),
    ];
    args.extend(payload);
    args
}

/// One save message, unwrapped.
pub struct SaveContext<'a> {
    pub connection: &'a Arc<ClientConnection>,
    pub server: &'a Arc<ServerContext>,
    pub save_id: Option<String>,
    pub subtype: &'a str,
    pub data: Map<String, Json>,
}

impl SaveContext<'_> {
    pub fn player_id(&self) -> PlayerId {
        self.connection.player_id()
    }

    /// The sender's context; saves before a join fail here.
    pub fn player(&self) -> Result<Arc<PlayerContext>, ServerError> {
        Ok(self.server.tracker.require_context(&self.player_id())?)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Json::as_str)
    }

    /// An integer field. Whole-valued floats are accepted, since the
    /// client serialises every number as a double.
    pub fn int(&self, key: &str) -> Option<i64> {
        let value = self.data.get(key)?;
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        })
    }

    pub fn i32(&self, key: &str) -> Option<i32> {
        self.int(key).and_then(|v| i32::try_from(v).ok())
    }

    pub fn list_len(&self, key: &str) -> Option<usize> {
        self.data.get(key).and_then(Json::as_array).map(Vec::len)
    }

    /// Sends `["r", saveId, now, payload...]`.
    pub async fn reply(&self, payload: impl IntoIterator<Item = Value>) -> Result<(), ServerError> {
        let args = save_reply_args(self.save_id.as_deref(), payload);
        self.connection
            .send_message(message::SAVE_RESPONSE, args)
            .await?;
        Ok(())
    }

    /// Replies with one JSON-encoded body.
    pub async fn reply_json<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), ServerError> {
        self.reply([Value::json(body)?]).await
    }
}

/// Handles a fixed set of save subtypes.
#[async_trait]
pub trait SaveSubHandler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Every subtype this handler owns. Must not overlap another
    /// registered handler's set.
    fn supported_types(&self) -> &[&'static str];

    async fn handle(&self, ctx: SaveContext<'_>) -> Result<(), ServerError>;
}

/// Subtype → sub-handler index.
#[derive(Default)]
pub struct SaveRouter {
    handlers: Vec<Arc<dyn SaveSubHandler>>,
    index: HashMap<&'static str, usize>,
}

impl SaveRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every game save group: the implemented handlers plus a logging
    /// handler for each group that is accepted but not acted on.
    pub fn standard() -> Result<Self, RouterError> {
        let mut router = Self::new();
        router
            .register(TaskSaveHandler)?
            .register(BuildingSaveHandler)?
            .register(MissionSaveHandler)?;
        for (name, types) in LoggingSaveHandler::GROUPS {
            router.register(LoggingSaveHandler::new(name, types))?;
        }
        Ok(router)
    }

    /// Adds a sub-handler.
    ///
    /// # Errors
    /// [`RouterError::DuplicateSaveType`] if any of its subtypes is
    /// already claimed, or listed twice by the handler itself. Nothing is
    /// registered in that case.
    pub fn register(&mut self, handler: impl SaveSubHandler) -> Result<&mut Self, RouterError> {
        let incoming = handler.name();
        let mut seen = HashSet::new();
        for subtype in handler.supported_types() {
            let existing = match self.index.get(subtype) {
                Some(&slot) => Some(self.handlers[slot].name()),
                None if !seen.insert(*subtype) => Some(incoming),
                None => None,
            };
            if let Some(existing) = existing {
                return Err(RouterError::DuplicateSaveType {
                    subtype: (*subtype).to_string(),
                    existing,
                    incoming,
                });
            }
        }

        let slot = self.handlers.len();
        for subtype in handler.supported_types() {
            self.index.insert(*subtype, slot);
        }
        tracing::debug!(
            handler = incoming,
            subtypes = handler.supported_types().len(),
            "registered save handler"
        );
        self.handlers.push(Arc::new(handler));
        Ok(self)
    }

    pub fn lookup(&self, subtype: &str) -> Option<&dyn SaveSubHandler> {
        self.index
            .get(subtype)
            .map(|&slot| self.handlers[slot].as_ref())
    }

    /// Number of routable subtypes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Top-level handler for `"s"` messages.
pub struct SaveHandler {
    router: SaveRouter,
}

impl SaveHandler {
    pub fn new(router: SaveRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl SocketHandler for SaveHandler {
    fn name(&self) -> &'static str {
        "save"
    }

    fn matches(&self, message: &Envelope) -> bool {
        message.is_save()
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        let Some(mut body) = ctx.message.save_body() else {
            tracing::debug!(conn = %ctx.connection.id(), "save without a readable body");
            return Ok(());
        };
        let subtype = ctx.message.subtype();
        let Some(handler) = self.router.lookup(&subtype) else {
            tracing::warn!(player_id = %ctx.player_id(), %subtype, "unrouted save subtype");
            return Ok(());
        };

        let save_id = body.get("id").and_then(Json::as_str).map(str::to_string);
        let data = match body.remove("data") {
            Some(Json::Object(data)) => data,
            _ => body,
        };
        tracing::debug!(
            player_id = %ctx.player_id(),
            handler = handler.name(),
            %subtype,
            save_id = save_id.as_deref().unwrap_or(ANONYMOUS_SAVE_ID),
            "routing save"
        );

        handler
            .handle(SaveContext {
                connection: ctx.connection,
                server: ctx.server,
                save_id,
                subtype: &subtype,
                data,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Claims(&'static str, &'static [&'static str]);

    #[async_trait]
    impl SaveSubHandler for Claims {
        fn name(&self) -> &'static str {
            self.0
        }
        fn supported_types(&self) -> &[&'static str] {
            self.1
        }
        async fn handle(&self, _ctx: SaveContext<'_>) -> Result<(), ServerError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_overlapping_subtype_is_rejected() {
        let mut router = SaveRouter::new();
        router.register(Claims("a", &["X", "Y"])).unwrap();

        let err = router.register(Claims("b", &["Z", "Y"])).err().unwrap();
        match err {
            RouterError::DuplicateSaveType {
                subtype,
                existing,
                incoming,
            } => {
                assert_eq!(subtype, "Y");
                assert_eq!(existing, "a");
                assert_eq!(incoming, "b");
            }
        }
        // Nothing from the rejected handler was indexed.
        assert!(router.lookup("Z").is_none());
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_register_subtype_listed_twice_is_rejected() {
        let mut router = SaveRouter::new();

        let err = router.register(Claims("a", &["X", "Y", "X"])).err().unwrap();
        match err {
            RouterError::DuplicateSaveType {
                subtype,
                existing,
                incoming,
            } => {
                assert_eq!(subtype, "X");
                assert_eq!(existing, "a");
                assert_eq!(incoming, "a");
            }
        }
        assert!(router.is_empty());
        assert!(router.lookup("Y").is_none());
    }

    #[test]
    fn test_lookup_finds_owner() {
        let mut router = SaveRouter::new();
        router
            .register(Claims("a", &["X"]))
            .unwrap()
            .register(Claims("b", &["Y"]))
            .unwrap();
        assert_eq!(router.lookup("Y").map(|h| h.name()), Some("b"));
        assert!(router.lookup("nope").is_none());
    }

    #[test]
    fn test_standard_router_covers_every_group() {
        let router = SaveRouter::standard().unwrap();
        assert_eq!(router.len(), 127);
        assert_eq!(
            router.lookup(methods::compound_task::TASK_STARTED).map(|h| h.name()),
            Some("task")
        );
        assert_eq!(
            router.lookup(methods::item::ITEM_BUY).map(|h| h.name()),
            Some("item")
        );
    }

    #[test]
    fn test_save_reply_args_defaults_id() {
        let args = save_reply_args(None, [Value::from("{}")]);
        assert_eq!(args[0], Value::from("m"));
        assert!(matches!(args[1], Value::Double(_)));
        assert_eq!(args[2], Value::from("{}"));
    }
}
