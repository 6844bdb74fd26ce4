use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pioforge_context::{Building, BuildingCore, GameResources, TimerData};
use pioforge_protocol::{Value, epoch_millis};
use pioforge_task::{StopMode, StopOutcome};
use serde::Serialize;
use serde_json::{Value as Json, json};

use super::methods::compound_building::{
    ALL, BUILDING_CANCEL, BUILDING_COLLECT, BUILDING_CREATE, BUILDING_CREATE_BUY, BUILDING_MOVE,
    BUILDING_RECYCLE, BUILDING_REPAIR, BUILDING_REPAIR_SPEED_UP, BUILDING_SPEED_UP,
    BUILDING_UPGRADE, BUILDING_UPGRADE_BUY,
};
use super::task::{NOT_ENOUGH_CASH, SpeedUpResponse};
use super::{SaveContext, SaveSubHandler};
use crate::ServerError;
use crate::config::SpeedUpTable;
use crate::tasks::{BuildingJob, BuildingTask};

const CREATE_TIME: Duration = Duration::from_secs(1444);
const UPGRADE_TIME: Duration = Duration::from_secs(10);
const REPAIR_TIME: Duration = Duration::from_secs(10);
const UPGRADE_XP: i32 = 50;

fn upgrade_timer(duration: Duration, target_level: i32, now: i64) -> TimerData {
    TimerData {
        data: Some(BTreeMap::from([
            ("level".to_string(), json!(target_level)),
            ("type".to_string(), json!("upgrade")),
            ("xp".to_string(), json!(UPGRADE_XP)),
        ])),
        ..TimerData::run_for(duration, now)
    }
}

fn repair_timer(duration: Duration, now: i64) -> TimerData {
    TimerData {
        data: Some(BTreeMap::from([("type".to_string(), json!("repair"))])),
        ..TimerData::run_for(duration, now)
    }
}

/// Level an upgrade timer was started for.
fn target_level(timer: &TimerData) -> Option<i64> {
    timer.data.as_ref()?.get("level")?.as_i64()
}

/// Seconds left after applying `option` to `remaining`, or `None` for an
/// option that does not shorten timers.
fn remaining_after(table: &SpeedUpTable, option: &str, remaining: u64) -> Option<u64> {
    let pricing = table.get(option)?;
    match option {
        SpeedUpTable::ONE_HOUR | SpeedUpTable::TWO_HOUR => {
            let skip = u64::from(pricing.time.unwrap_or(0));
            Some(remaining.saturating_sub(skip))
        }
        SpeedUpTable::HALF => {
            let share = pricing.percent.unwrap_or(0.5).clamp(0.0, 1.0);
            Some((remaining as f64 * (1.0 - share)).floor() as u64)
        }
        SpeedUpTable::COMPLETE | SpeedUpTable::FREE => Some(0),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct TimerResponse {
    success: bool,
    items: BTreeMap<String, i32>,
    timer: Option<TimerData>,
}

impl TimerResponse {
    fn new(timer: Option<TimerData>) -> Self {
        Self {
            success: timer.is_some(),
            items: BTreeMap::new(),
            timer,
        }
    }
}

#[derive(Debug, Serialize)]
struct MoveResponse {
    success: bool,
    x: i32,
    y: i32,
    r: i32,
}

#[derive(Debug, Serialize)]
struct CollectResponse {
    success: bool,
    locked: bool,
    resource: &'static str,
    collected: f64,
    remainder: f64,
    total: f64,
    bonus: f64,
    destroyed: bool,
}

impl CollectResponse {
    fn failed() -> Self {
        Self {
            success: false,
            locked: false,
            resource: "",
            collected: 0.0,
            remainder: 0.0,
            total: 0.0,
            bonus: 0.0,
            destroyed: false,
        }
    }
}

/// Which timer a speed-up applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Upgrade,
    Repair,
}

/// Buildings on the compound: construction, upgrades, repairs and the
/// speed-ups on each.
pub struct BuildingSaveHandler;

impl BuildingSaveHandler {
    async fn schedule(
        &self,
        ctx: &SaveContext<'_>,
        job: BuildingJob,
        building_id: &str,
        duration: Duration,
    ) -> Result<(), ServerError> {
        let task = BuildingTask {
            job,
            building_id: building_id.to_string(),
            duration,
            player_id: ctx.player_id(),
            tracker: Arc::clone(&ctx.server.tracker),
        };
        ctx.server.scheduler.schedule(ctx.connection, task).await?;
        Ok(())
    }

    async fn create(&self, ctx: &SaveContext<'_>, duration: Duration) -> Result<(), ServerError> {
        let (Some(id), Some(kind)) = (ctx.str("id"), ctx.str("type")) else {
            return Ok(());
        };
        let (Some(tx), Some(ty), Some(rotation)) =
            (ctx.i32("tx"), ctx.i32("ty"), ctx.i32("rotation"))
        else {
            return Ok(());
        };
        tracing::info!(player_id = %ctx.player_id(), building_id = id, kind, tx, ty, rotation, "building create");

        let timer = upgrade_timer(duration, 0, epoch_millis());
        let building = Building::Standard(BuildingCore {
            tx,
            ty,
            rotation,
            upgrade: Some(timer.clone()),
            ..BuildingCore::new(id, kind)
        });
        let player = ctx.player()?;
        let created = match player.services.compound.create_building(building).await {
            Ok(()) => Some(timer),
            Err(e) => {
                tracing::error!(player_id = %ctx.player_id(), building_id = id, error = %e, "building create failed");
                None
            }
        };
        let success = created.is_some();
        ctx.reply_json(&TimerResponse::new(created)).await?;
        if success {
            self.schedule(ctx, BuildingJob::Create, id, duration).await?;
        }
        Ok(())
    }

    async fn upgrade(&self, ctx: &SaveContext<'_>, duration: Duration) -> Result<(), ServerError> {
        let Some(id) = ctx.str("id") else {
            return Ok(());
        };
        let now = epoch_millis();
        let player = ctx.player()?;
        let upgraded = player
            .services
            .compound
            .update_building(id, |b| {
                let core = b.core_mut();
                core.upgrade = Some(upgrade_timer(duration, core.level + 1, now));
            })
            .await;
        let timer = match upgraded {
            Ok(building) => building.core().upgrade.clone(),
            Err(e) => {
                tracing::error!(player_id = %ctx.player_id(), building_id = id, error = %e, "building upgrade failed");
                None
            }
        };
        let success = timer.is_some();
        ctx.reply_json(&TimerResponse::new(timer)).await?;
        if success {
            self.schedule(ctx, BuildingJob::Upgrade, id, duration).await?;
        }
        Ok(())
    }

    async fn repair(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let Some(id) = ctx.str("id") else {
            return Ok(());
        };
        let timer = repair_timer(REPAIR_TIME, epoch_millis());
        let player = ctx.player()?;
        let repaired = player
            .services
            .compound
            .update_building(id, |b| b.core_mut().repair = Some(timer.clone()))
            .await;
        let timer = match repaired {
            Ok(building) => building.core().repair.clone(),
            Err(e) => {
                tracing::error!(player_id = %ctx.player_id(), building_id = id, error = %e, "building repair failed");
                None
            }
        };
        let success = timer.is_some();
        ctx.reply_json(&TimerResponse::new(timer)).await?;
        if success {
            self.schedule(ctx, BuildingJob::Repair, id, REPAIR_TIME).await?;
        }
        Ok(())
    }

    async fn relocate(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let Some(id) = ctx.str("id") else {
            return Ok(());
        };
        let (Some(x), Some(y), Some(r)) = (ctx.i32("tx"), ctx.i32("ty"), ctx.i32("rotation")) else {
            return Ok(());
        };
        let player = ctx.player()?;
        let moved = player
            .services
            .compound
            .update_building(id, |b| {
                let core = b.core_mut();
                core.tx = x;
                core.ty = y;
                core.rotation = r;
            })
            .await
            .inspect_err(|e| {
                tracing::error!(player_id = %ctx.player_id(), building_id = id, error = %e, "building move failed");
            })
            .is_ok();
        ctx.reply_json(&MoveResponse {
            success: moved,
            x,
            y,
            r,
        })
        .await
    }

    async fn recycle(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let Some(id) = ctx.str("id") else {
            return Ok(());
        };
        let player = ctx.player()?;
        let recycled = player
            .services
            .compound
            .delete_building(id)
            .await
            .inspect_err(|e| {
                tracing::error!(player_id = %ctx.player_id(), building_id = id, error = %e, "building recycle failed");
            })
            .is_ok();
        ctx.reply_json(&json!({ "success": recycled, "items": {} })).await
    }

    async fn collect(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let Some(id) = ctx.str("id") else {
            return Ok(());
        };
        let player = ctx.player()?;
        let compound = &player.services.compound;
        let response = match compound.collect_building(id).await {
            Ok(collected) => {
                let totals = compound
                    .update_resources(|r| r.wood += collected.wood)
                    .await?;
                CollectResponse {
                    success: true,
                    locked: false,
                    resource: "wood",
                    collected: f64::from(collected.wood),
                    remainder: 0.0,
                    total: f64::from(totals.wood),
                    bonus: 0.0,
                    destroyed: false,
                }
            }
            Err(e) => {
                tracing::error!(player_id = %ctx.player_id(), building_id = id, error = %e, "building collect failed");
                CollectResponse::failed()
            }
        };
        ctx.reply_json(&response).await
    }

    /// Stops construction or an upgrade in progress.
    ///
    /// A building still under construction (level 0, building towards
    /// level 0) is removed; otherwise only its upgrade timer is dropped.
    async fn cancel(&self, ctx: &SaveContext<'_>) -> Result<(), ServerError> {
        let Some(id) = ctx.str("id") else {
            return Ok(());
        };
        let player = ctx.player()?;
        let compound = &player.services.compound;
        let Some(building) = compound.building(id) else {
            tracing::warn!(player_id = %ctx.player_id(), building_id = id, "cancel for unknown building");
            return ctx.reply_json(&json!({ "success": false, "items": {} })).await;
        };

        let core = building.core();
        let under_construction =
            core.level == 0 && core.upgrade.as_ref().and_then(target_level) == Some(0);
        let job = if under_construction {
            BuildingJob::Create
        } else {
            BuildingJob::Upgrade
        };
        ctx.server
            .scheduler
            .stop(ctx.connection.id(), job.category(), StopMode::Cancel)
            .await;

        let result = if under_construction {
            compound.delete_building(id).await
        } else {
            compound
                .update_building(id, |b| b.core_mut().upgrade = None)
                .await
                .map(|_| ())
        };
        let cancelled = result
            .inspect_err(|e| {
                tracing::error!(player_id = %ctx.player_id(), building_id = id, error = %e, "building cancel failed");
            })
            .is_ok();
        ctx.reply_json(&json!({ "success": cancelled, "items": {} })).await
    }

    async fn speed_up(&self, ctx: &SaveContext<'_>, kind: TimerKind) -> Result<(), ServerError> {
        let (Some(id), Some(option)) = (ctx.str("id"), ctx.str("option")) else {
            return Ok(());
        };
        let player_id = ctx.player_id();
        let player = ctx.player()?;
        let compound = &player.services.compound;
        let table = &ctx.server.config.speed_ups;

        let timer = compound.building(id).and_then(|b| match kind {
            TimerKind::Upgrade => b.core().upgrade.clone(),
            TimerKind::Repair => b.core().repair.clone(),
        });
        let Some(timer) = timer else {
            tracing::warn!(%player_id, building_id = id, ?kind, "speed-up with no running timer");
            return ctx.reply_json(&SpeedUpResponse::failed("", 0)).await;
        };

        let now = epoch_millis();
        let remaining = timer.seconds_left(now).max(0) as u64;
        let left = remaining_after(table, option, remaining).filter(|_| table.allows(option, remaining));
        let Some(left) = left else {
            tracing::warn!(%player_id, building_id = id, option, remaining, "speed-up option refused");
            return ctx.reply_json(&SpeedUpResponse::failed("", 0)).await;
        };

        let cost = table.cost(option, remaining);
        let cash = compound.cash();
        if cash < cost {
            tracing::warn!(%player_id, building_id = id, cost, cash, "not enough cash for speed-up");
            return ctx
                .reply_json(&SpeedUpResponse::failed(NOT_ENOUGH_CASH, cost))
                .await;
        }
        let resources: GameResources = compound.update_resources(|r| r.cash -= cost).await?;

        let job = match kind {
            TimerKind::Repair => BuildingJob::Repair,
            TimerKind::Upgrade if target_level(&timer) == Some(0) => BuildingJob::Create,
            TimerKind::Upgrade => BuildingJob::Upgrade,
        };
        if left == 0 {
            let outcome = ctx
                .server
                .scheduler
                .stop(ctx.connection.id(), job.category(), StopMode::ForceComplete)
                .await;
            if outcome == StopOutcome::NotFound {
                self.schedule(ctx, job, id, Duration::ZERO).await?;
            }
        } else {
            let shortened = TimerData {
                start: now,
                length: left as i64,
                data: timer.data.clone(),
            };
            compound
                .update_building(id, |b| match kind {
                    TimerKind::Upgrade => b.core_mut().upgrade = Some(shortened),
                    TimerKind::Repair => b.core_mut().repair = Some(shortened),
                })
                .await?;
            self.schedule(ctx, job, id, Duration::from_secs(left)).await?;
        }

        tracing::info!(%player_id, building_id = id, option, remaining, left, cost, "building sped up");
        ctx.reply([
            Value::json(&SpeedUpResponse::paid(cost))?,
            Value::json(&resources)?,
        ])
        .await
    }
}

#[async_trait]
impl SaveSubHandler for BuildingSaveHandler {
    fn name(&self) -> &'static str {
        "building"
    }

    fn supported_types(&self) -> &[&'static str] {
        ALL
    }

    async fn handle(&self, ctx: SaveContext<'_>) -> Result<(), ServerError> {
        match ctx.subtype {
            BUILDING_CREATE => self.create(&ctx, CREATE_TIME).await,
            BUILDING_CREATE_BUY => self.create(&ctx, Duration::ZERO).await,
            BUILDING_UPGRADE => self.upgrade(&ctx, UPGRADE_TIME).await,
            BUILDING_UPGRADE_BUY => self.upgrade(&ctx, Duration::ZERO).await,
            BUILDING_REPAIR => self.repair(&ctx).await,
            BUILDING_MOVE => self.relocate(&ctx).await,
            BUILDING_RECYCLE => self.recycle(&ctx).await,
            BUILDING_COLLECT => self.collect(&ctx).await,
            BUILDING_CANCEL => self.cancel(&ctx).await,
            BUILDING_SPEED_UP => self.speed_up(&ctx, TimerKind::Upgrade).await,
            BUILDING_REPAIR_SPEED_UP => self.speed_up(&ctx, TimerKind::Repair).await,
            other => {
                tracing::warn!(player_id = %ctx.player_id(), subtype = other, "save not implemented");
                Ok(())
            }
        }
    }
}
