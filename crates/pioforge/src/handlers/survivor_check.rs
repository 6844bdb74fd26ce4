use async_trait::async_trait;
use pioforge_protocol::{Envelope, Value};
use serde::Serialize;

use crate::ServerError;
use crate::message;
use crate::router::{HandlerContext, SocketHandler};
use crate::save::save_reply_args;

/// Survivor offered after a survivor check. Fixed until recruitment
/// is modelled.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewSurvivor {
    id: &'static str,
    title: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    gender: &'static str,
    class_id: &'static str,
    voice: &'static str,
}

const RECRUIT: NewSurvivor = NewSurvivor {
    id: "",
    title: "",
    first_name: "Mara",
    last_name: "Quinlan",
    gender: "female",
    class_id: "unassigned",
    voice: "white-f",
};

/// `rsc`: the client asks whether a new survivor has arrived. Answers
/// yes, then sends the survivor as `srvnew`.
pub struct SurvivorCheckHandler;

#[async_trait]
impl SocketHandler for SurvivorCheckHandler {
    fn name(&self) -> &'static str {
        "survivor_check"
    }

    fn matches(&self, message: &Envelope) -> bool {
        message.is(message::REQUEST_SURVIVOR_CHECK)
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        let id = ctx
            .message
            .get_map(message::REQUEST_SURVIVOR_CHECK)
            .and_then(|m| m.get("id").and_then(|v| v.as_str()).map(str::to_string))
            .or_else(|| ctx.message.get_str("id").map(str::to_string));
        tracing::debug!(player_id = %ctx.player_id(), save_id = ?id, "survivor check");

        ctx.send(
            message::SAVE_RESPONSE,
            save_reply_args(id.as_deref(), [Value::from(r#"{"success": true}"#)]),
        )
        .await?;
        ctx.send(message::SURVIVOR_NEW, [Value::json(&RECRUIT)?])
            .await
    }
}
