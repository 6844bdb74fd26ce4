use std::sync::Arc;
use std::time::Duration;

use pioforge_context::{BatchRecycleJob, PlayerContext, PlayerContextTracker};
use pioforge_protocol::{PlayerId, Value, epoch_millis};
use pioforge_task::{ServerTask, TaskCategory, TaskConfig, TaskError, TaskScheduler, async_trait};
use pioforge_transport::ClientConnection;

use super::context_failure;
use crate::message;

/// Finishes a batch-recycle job: drops it from the player's queue and
/// sends `["brc", jobId]`.
///
/// Only one job per connection is armed at a time. Each finished job arms
/// the next queued one.
pub struct BatchRecycleTask {
    pub job_id: String,
    pub remaining: Duration,
    pub player_id: PlayerId,
    pub tracker: Arc<PlayerContextTracker>,
    pub scheduler: Arc<TaskScheduler>,
}

impl BatchRecycleTask {
    /// A task firing when `job` ends; immediately if it is already due.
    pub fn for_job(
        job: &BatchRecycleJob,
        now_millis: i64,
        player_id: PlayerId,
        tracker: Arc<PlayerContextTracker>,
        scheduler: Arc<TaskScheduler>,
    ) -> Self {
        Self {
            job_id: job.id.clone(),
            remaining: job.remaining(now_millis).unwrap_or_default(),
            player_id,
            tracker,
            scheduler,
        }
    }

    async fn arm_next(
        &self,
        ctx: &PlayerContext,
        connection: &ClientConnection,
        finished_at: i64,
    ) -> Result<(), TaskError> {
        let Some(job) = ctx.services.batch_recycle.next_ending_from(finished_at) else {
            return Ok(());
        };
        if ctx.connection.id() != connection.id() {
            // A newer connection owns the player; its join re-armed the queue.
            return Ok(());
        }
        let next = Self::for_job(
            &job,
            epoch_millis(),
            self.player_id.clone(),
            Arc::clone(&self.tracker),
            Arc::clone(&self.scheduler),
        );
        tracing::debug!(
            player_id = %self.player_id,
            job_id = %next.job_id,
            remaining_secs = next.remaining.as_secs(),
            "arming next batch recycle"
        );
        self.scheduler.schedule(&ctx.connection, next).await?;
        Ok(())
    }
}

#[async_trait]
impl ServerTask for BatchRecycleTask {
    fn category(&self) -> TaskCategory {
        TaskCategory::BatchRecycleComplete
    }

    fn config(&self) -> TaskConfig {
        TaskConfig::once_after(self.remaining)
    }

    fn entity_id(&self) -> Option<String> {
        Some(self.job_id.clone())
    }

    async fn execute(&self, connection: &ClientConnection) -> Result<(), TaskError> {
        let ctx = self
            .tracker
            .require_context(&self.player_id)
            .map_err(context_failure)?;
        let removed = ctx
            .services
            .batch_recycle
            .remove_job(&self.job_id)
            .await
            .map_err(context_failure)?;
        let finished_at = match removed {
            Some(job) => job.ends_at(),
            None => {
                tracing::debug!(job_id = %self.job_id, "batch recycle job already removed");
                epoch_millis()
            }
        };

        connection
            .send_message(message::BATCH_RECYCLE_COMPLETE, [Value::from(&self.job_id)])
            .await?;
        self.arm_next(&ctx, connection, finished_at).await
    }
}
