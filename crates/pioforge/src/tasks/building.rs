use std::sync::Arc;
use std::time::Duration;

use pioforge_context::{Building, PlayerContextTracker};
use pioforge_protocol::{PlayerId, Value};
use pioforge_task::{ServerTask, TaskCategory, TaskConfig, TaskError, async_trait};
use pioforge_transport::ClientConnection;
use serde_json::Value as Json;

use super::context_failure;
use crate::message;

/// Which building timer a [`BuildingTask`] finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingJob {
    Create,
    Upgrade,
    Repair,
}

impl BuildingJob {
    pub fn category(self) -> TaskCategory {
        match self {
            Self::Create => TaskCategory::BuildingCreate,
            Self::Upgrade => TaskCategory::BuildingUpgrade,
            Self::Repair => TaskCategory::BuildingRepair,
        }
    }

    /// Applies the end of this job to `building`.
    ///
    /// Construction sets the level the upgrade timer was started for
    /// (`data.level`), or one above the current level when the timer
    /// carries none, then clears the timer. Repair clears the repair
    /// timer and the destroyed flag.
    pub fn finish(self, building: &mut Building) {
        let core = building.core_mut();
        match self {
            Self::Create | Self::Upgrade => {
                let target = core
                    .upgrade
                    .as_ref()
                    .and_then(|timer| timer.data.as_ref())
                    .and_then(|data| data.get("level"))
                    .and_then(Json::as_i64)
                    .and_then(|level| i32::try_from(level).ok());
                core.level = target.unwrap_or(core.level + 1);
                core.upgrade = None;
            }
            Self::Repair => {
                core.repair = None;
                core.destroyed = false;
            }
        }
    }
}

/// Completes a building timer and sends `["bc", buildingId]`.
pub struct BuildingTask {
    pub job: BuildingJob,
    pub building_id: String,
    pub duration: Duration,
    pub player_id: PlayerId,
    pub tracker: Arc<PlayerContextTracker>,
}

#[async_trait]
impl ServerTask for BuildingTask {
    fn category(&self) -> TaskCategory {
        self.job.category()
    }

    fn config(&self) -> TaskConfig {
        TaskConfig::once_after(self.duration)
    }

    fn entity_id(&self) -> Option<String> {
        Some(self.building_id.clone())
    }

    async fn execute(&self, connection: &ClientConnection) -> Result<(), TaskError> {
        let ctx = self
            .tracker
            .require_context(&self.player_id)
            .map_err(context_failure)?;
        let job = self.job;
        let building = ctx
            .services
            .compound
            .update_building(&self.building_id, |b| job.finish(b))
            .await
            .map_err(context_failure)?;

        tracing::info!(
            player_id = %self.player_id,
            building_id = %self.building_id,
            ?job,
            level = building.core().level,
            "building finished"
        );
        connection
            .send_message(message::BUILDING_COMPLETE, [Value::from(&self.building_id)])
            .await?;
        Ok(())
    }
}
