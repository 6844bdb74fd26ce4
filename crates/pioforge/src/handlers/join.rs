use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use pioforge_context::{GameResources, PlayerContext};
use pioforge_protocol::{Envelope, Value, epoch_millis, server_time};
use serde::Serialize;
use serde_json::Value as Json;

use crate::ServerError;
use crate::message;
use crate::router::{HandlerContext, SocketHandler};
use crate::tasks::BatchRecycleTask;

const INVENTORY_SIZE: u32 = 500;

/// Per-player part of the `gr` message.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginState {
    settings: BTreeMap<String, String>,
    news: BTreeMap<String, String>,
    sales: Vec<String>,
    alliance_winnings: BTreeMap<String, String>,
    #[serde(rename = "recentPVPList")]
    recent_pvp_list: Vec<String>,
    invsize: u32,
    upgrades: String,
    alliance_id: Option<String>,
    alliance_tag: Option<String>,
    long_session: bool,
    leveled_up: bool,
    promos: Vec<String>,
    promo_sale: Option<String>,
    deal_item: Option<String>,
    leader_resets: i32,
    unequip_item_binds: Vec<String>,
    global_stats: BTreeMap<String, Vec<String>>,
    resources: GameResources,
    survivors: Vec<Json>,
    tasks: Option<Vec<String>>,
    missions: Option<Vec<String>>,
    bounty_cap: Option<i32>,
    bounty_cap_timestamp: Option<i64>,
    research: Option<BTreeMap<String, i32>>,
}

impl LoginState {
    fn for_player(player: &PlayerContext) -> Self {
        Self::new(
            player.services.compound.resources(),
            player.services.survivor.all(),
        )
    }

    fn new(resources: GameResources, survivors: Vec<Json>) -> Self {
        Self {
            invsize: INVENTORY_SIZE,
            global_stats: BTreeMap::from([("idList".to_string(), Vec::new())]),
            resources,
            survivors,
            ..Self::default()
        }
    }
}

/// Binds a connection to a player.
///
/// `["join", key]` is resolved through the join-key manager. A bad key
/// gets `joinresult false` and ends the connection.
pub struct JoinHandler;

impl JoinHandler {
    /// Re-arms the earliest unfinished batch-recycle job so it still fires
    /// after a reconnect. Each job arms its successor when it completes.
    async fn rearm_batch_recycle(
        &self,
        ctx: HandlerContext<'_>,
        player: &PlayerContext,
    ) -> Result<(), ServerError> {
        let now = epoch_millis();
        let Some(job) = player.services.batch_recycle.next_pending(now) else {
            return Ok(());
        };
        let task = BatchRecycleTask::for_job(
            &job,
            now,
            player.player_id.clone(),
            Arc::clone(&ctx.server.tracker),
            Arc::clone(&ctx.server.scheduler),
        );
        tracing::debug!(
            player_id = %player.player_id,
            job_id = %job.id,
            remaining_secs = task.remaining.as_secs(),
            "re-arming batch recycle"
        );
        ctx.server.scheduler.schedule(ctx.connection, task).await?;
        Ok(())
    }
}

#[async_trait]
impl SocketHandler for JoinHandler {
    fn name(&self) -> &'static str {
        "join"
    }

    fn matches(&self, message: &Envelope) -> bool {
        message.get_str(message::JOIN).is_some()
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<(), ServerError> {
        let key = ctx.message.get_str(message::JOIN).unwrap_or_default();
        let Some(player_id) = ctx.server.join_keys.resolve(key) else {
            tracing::warn!(conn = %ctx.connection.id(), "join with unknown or expired key");
            ctx.send(message::JOIN_RESULT, [Value::from(false)]).await?;
            return Err(ServerError::fatal("join key rejected"));
        };

        ctx.connection.set_player_id(player_id.clone());
        ctx.send(message::JOIN_RESULT, [Value::from(true)]).await?;

        let player = ctx
            .server
            .tracker
            .create_context(player_id.clone(), Arc::clone(ctx.connection))
            .await?;
        self.rearm_batch_recycle(ctx, &player).await?;

        let game_ready = &ctx.server.config.game_ready;
        let login_state = Value::json(&LoginState::for_player(&player))?;
        ctx.send(
            message::GAME_READY,
            [
                Value::from(server_time()),
                Value::from(game_ready.binaries.clone()),
                Value::from(game_ready.cost_table_json()),
                Value::from(game_ready.srv_table_json()),
                login_state,
            ],
        )
        .await?;
        tracing::info!(%player_id, conn = %ctx.connection.id(), "player joined");
        Ok(())
    }
}
