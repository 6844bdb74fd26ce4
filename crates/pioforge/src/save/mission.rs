use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use pioforge_context::TimerData;
use pioforge_protocol::{Value, epoch_millis};
use pioforge_task::{StopMode, StopOutcome, TaskCategory};
use serde::Serialize;
use serde_json::{Value as Json, json};

use super::methods::mission::{ALL, MISSION_END, MISSION_SPEED_UP};
use super::task::SpeedUpResponse;
use super::{SaveContext, SaveSubHandler};
use crate::ServerError;
use crate::message;
use crate::tasks::MissionReturnTask;

/// How long a team takes to walk home.
const RETURN_TIME: Duration = Duration::from_secs(20);
const MISSION_XP: i64 = 100;

#[derive(Debug, Serialize)]
struct XpBreakdown {
    total: i64,
}

#[derive(Debug, Serialize)]
struct LeaderProgress {
    xp: i64,
    level: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MissionEndResponse {
    automated: bool,
    xp_earned: i64,
    xp: XpBreakdown,
    return_timer: TimerData,
    lock_timer: Option<TimerData>,
    loot: Vec<Json>,
    itm_counters: BTreeMap<String, i32>,
    injuries: Option<Vec<Json>>,
    survivors: Vec<Json>,
    player: LeaderProgress,
    level_pts: i32,
    cooldown: Option<String>,
}

impl MissionEndResponse {
    fn new(leader: Option<&Json>, now: i64) -> Self {
        let field = |key: &str| leader.and_then(|l| l.get(key)).and_then(Json::as_i64);
        let return_secs = RETURN_TIME.as_secs() as i64;
        Self {
            automated: false,
            xp_earned: MISSION_XP,
            xp: XpBreakdown { total: MISSION_XP },
            return_timer: TimerData {
                data: Some(BTreeMap::from([("return".to_string(), json!(return_secs))])),
                ..TimerData::run_for(RETURN_TIME, now)
            },
            lock_timer: None,
            loot: Vec::new(),
            itm_counters: BTreeMap::new(),
            injuries: None,
            survivors: Vec::new(),
            player: LeaderProgress {
                xp: field("xp").unwrap_or(0) + MISSION_XP,
                level: field("level").unwrap_or(1),
            },
            level_pts: 0,
            cooldown: None,
        }
    }
}

/// Missions away from the compound. Only the end of a mission and its
/// speed-up do anything; the rest are logged.
pub struct MissionSaveHandler;

impl MissionSaveHandler {
    /// Mission id the client refers to: the one it sent, else the
    /// player's own id, which is what mission start hands out.
    fn mission_id(ctx: &SaveContext<'_>) -> String {
        ctx.str("id")
            .map(str::to_string)
            .unwrap_or_else(|| ctx.player_id().to_string())
    }

    async fn end(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let player = ctx.player()?;
        let leader = player.services.survivor.leader();
        let response = MissionEndResponse::new(leader.as_ref(), epoch_millis());
        let resources = player.services.compound.resources();
        ctx.reply([Value::json(&response)?, Value::json(&resources)?])
            .await?;

        let mission_id = Self::mission_id(ctx);
        tracing::info!(player_id = %ctx.player_id(), %mission_id, "mission ended, team returning");
        ctx.server
            .scheduler
            .schedule(
                ctx.connection,
                MissionReturnTask {
                    mission_id,
                    return_time: RETURN_TIME,
                },
            )
            .await?;
        Ok(())
    }

    async fn speed_up(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let outcome = ctx
            .server
            .scheduler
            .stop(
                ctx.connection.id(),
                TaskCategory::MissionReturn,
                StopMode::ForceComplete,
            )
            .await;
        ctx.reply_json(&SpeedUpResponse::paid(0)).await?;

        if outcome == StopOutcome::NotFound {
            // Return already over or never scheduled; the client still
            // waits for the completion.
            let mission_id = Self::mission_id(ctx);
            ctx.connection
                .send_message(message::MISSION_RETURN_COMPLETE, [Value::from(mission_id)])
                .await?;
        }
        tracing::info!(player_id = %ctx.player_id(), ?outcome, "mission return sped up");
        Ok(())
    }
}

#[async_trait]
impl SaveSubHandler for MissionSaveHandler {
    fn name(&self) -> &'static str {
        "mission"
    }

    fn supported_types(&self) -> &[&'static str] {
        ALL
    }

    async fn handle(&self, ctx: SaveContext<'_>) -> Result<(), ServerError> {
        match ctx.subtype {
            MISSION_END => self.end(&ctx).await,
            MISSION_SPEED_UP => self.speed_up(&ctx).await,
            other => {
                tracing::info!(player_id = %ctx.player_id(), subtype = other, "mission save ignored");
                Ok(())
            }
        }
    }
}
