use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pioforge_protocol::epoch_millis;
use pioforge_task::{StopMode, TaskCategory};
use rand::Rng;
use serde::Serialize;

use super::methods::compound_task::{
    ALL, TASK_CANCELLED, TASK_SPEED_UP, TASK_STARTED, TASK_SURVIVOR_ASSIGNED,
    TASK_SURVIVOR_REMOVED,
};
use super::{SaveContext, SaveSubHandler};
use crate::ServerError;
use crate::tasks::JunkRemovalTask;

const JUNK_REMOVAL: &str = "junk_removal";
const SCAVENGING: &str = "scavenging";
const CONSTRUCTION: &str = "construction";

/// Error id the client shows as "not enough fuel".
pub(crate) const NOT_ENOUGH_CASH: &str = "55";

#[derive(Debug, Serialize)]
struct TaskItem {
    id: &'static str,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct TaskStartedResponse {
    items: Vec<TaskItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SpeedUpResponse<'a> {
    pub error: &'a str,
    pub success: bool,
    pub cost: i32,
}

impl<'a> SpeedUpResponse<'a> {
    pub fn failed(error: &'a str, cost: i32) -> Self {
        Self {
            error,
            success: false,
            cost,
        }
    }

    pub fn paid(cost: i32) -> Self {
        Self {
            error: "",
            success: true,
            cost,
        }
    }
}

/// Item rewards rolled when a task starts. Upper bounds are exclusive.
fn roll_items(task_type: &str) -> Vec<TaskItem> {
    let table: &[(&'static str, u32, u32)] = match task_type {
        JUNK_REMOVAL => &[("scrap_metal", 5, 15), ("wood", 3, 10), ("cloth", 2, 8)],
        SCAVENGING => &[("food", 2, 6), ("water", 1, 4), ("medicine", 1, 3)],
        CONSTRUCTION => &[("building_materials", 10, 25), ("tools", 1, 5)],
        _ => &[],
    };
    let mut rng = rand::rng();
    table
        .iter()
        .map(|&(id, low, high)| TaskItem {
            id,
            quantity: rng.random_range(low..high),
        })
        .collect()
}

/// Survivors share the work: `length / survivors`, or all of it when
/// nobody is assigned.
fn junk_removal_duration(length_secs: u64, survivors: usize) -> Duration {
    match survivors as u64 {
        0 => Duration::from_secs(length_secs),
        n => Duration::from_secs(length_secs / n),
    }
}

/// Compound tasks: junk removal, scavenging and construction.
pub struct TaskSaveHandler;

impl TaskSaveHandler {
    async fn started(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let task_type = ctx.str("type").unwrap_or_default();
        let items = roll_items(task_type);
        tracing::info!(
            player_id = %ctx.player_id(),
            task_type,
            task_id = ctx.str("id").unwrap_or("unknown"),
            items = items.len(),
            "task started"
        );
        ctx.reply_json(&TaskStartedResponse { items }).await?;

        if task_type != JUNK_REMOVAL {
            return Ok(());
        }
        let (Some(task_id), Some(building_id)) = (ctx.str("id"), ctx.str("buildingId")) else {
            return Ok(());
        };
        let length = match ctx.int("length") {
            Some(length) if length > 0 => length as u64,
            _ => return Ok(()),
        };
        let survivors = ctx.list_len("survivors").unwrap_or(1);
        let duration = junk_removal_duration(length, survivors);
        tracing::info!(
            player_id = %ctx.player_id(),
            task_id,
            building_id,
            length,
            survivors,
            duration_secs = duration.as_secs(),
            "junk removal scheduled"
        );

        let server = ctx.server;
        let task = JunkRemovalTask::register(
            Arc::clone(&server.junk_removals),
            Arc::clone(&server.tracker),
            ctx.player_id(),
            task_id,
            building_id,
            duration,
        );
        server.scheduler.schedule(ctx.connection, task).await?;
        Ok(())
    }

    async fn cancelled(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        if let (Some(JUNK_REMOVAL), Some(task_id)) = (ctx.str("type"), ctx.str("id")) {
            if ctx
                .server
                .junk_removals
                .remove(&ctx.player_id(), task_id)
                .is_some()
            {
                let outcome = ctx
                    .server
                    .scheduler
                    .stop(ctx.connection.id(), TaskCategory::JunkRemoval, StopMode::Cancel)
                    .await;
                tracing::info!(player_id = %ctx.player_id(), task_id, ?outcome, "junk removal cancelled");
            }
        }
        ctx.reply_json(&serde_json::json!({})).await
    }

    async fn speed_up(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let (Some(task_id), Some(option)) = (ctx.str("id"), ctx.str("option")) else {
            return ctx
                .reply_json(&SpeedUpResponse::failed("Missing taskId or option", 0))
                .await;
        };
        let player_id = ctx.player_id();
        let Some(entry) = ctx.server.junk_removals.get(&player_id, task_id) else {
            tracing::warn!(%player_id, task_id, "speed-up for unknown task");
            return ctx
                .reply_json(&SpeedUpResponse::failed("Task not found", 0))
                .await;
        };

        let remaining = entry.seconds_remaining(epoch_millis());
        let table = &ctx.server.config.speed_ups;
        if !table.allows(option, remaining) {
            tracing::warn!(%player_id, task_id, option, remaining, "speed-up option refused");
            return ctx
                .reply_json(&SpeedUpResponse::failed("Option not available", 0))
                .await;
        }
        let cost = table.cost(option, remaining);
        let player = ctx.player()?;
        let compound = &player.services.compound;
        let cash = compound.cash();
        if cash < cost {
            tracing::warn!(%player_id, task_id, cost, cash, "not enough cash for speed-up");
            return ctx
                .reply_json(&SpeedUpResponse::failed(NOT_ENOUGH_CASH, cost))
                .await;
        }

        compound.update_resources(|r| r.cash -= cost).await?;
        ctx.server.junk_removals.remove(&player_id, task_id);
        let outcome = ctx
            .server
            .scheduler
            .stop(
                ctx.connection.id(),
                TaskCategory::JunkRemoval,
                StopMode::ForceComplete,
            )
            .await;
        tracing::info!(%player_id, task_id, option, remaining, cost, ?outcome, "task sped up");
        ctx.reply_json(&SpeedUpResponse::paid(cost)).await
    }
}

#[async_trait]
impl SaveSubHandler for TaskSaveHandler {
    fn name(&self) -> &'static str {
        "task"
    }

    fn supported_types(&self) -> &[&'static str] {
        ALL
    }

    async fn handle(&self, ctx: SaveContext<'_>) -> Result<(), ServerError> {
        match ctx.subtype {
            TASK_STARTED => self.started(&ctx).await,
            TASK_CANCELLED => self.cancelled(&ctx).await,
            TASK_SPEED_UP => self.speed_up(&ctx).await,
            TASK_SURVIVOR_ASSIGNED | TASK_SURVIVOR_REMOVED => {
                tracing::info!(
                    player_id = %ctx.player_id(),
                    subtype = ctx.subtype,
                    task_id = ctx.str("id").unwrap_or("unknown"),
                    survivors = ctx.list_len("survivors").unwrap_or(0),
                    "task survivors changed"
                );
                ctx.reply_json(&serde_json::json!({})).await
            }
            _ => Ok(()),
        }
    }
}
