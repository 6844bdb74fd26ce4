use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pioforge_protocol::PlayerId;

use super::lock;
use crate::service::write_objects;
use crate::{BatchRecycleJob, ContextError, GameService, PlayerRepository, WriteLock};

/// Recycling jobs the player has queued.
pub struct BatchRecycleService {
    player_id: PlayerId,
    repository: Arc<dyn PlayerRepository>,
    writes: WriteLock,
    jobs: Mutex<Vec<BatchRecycleJob>>,
}

impl BatchRecycleService {
    pub fn new(player_id: PlayerId, repository: Arc<dyn PlayerRepository>, writes: WriteLock) -> Self {
        Self {
            player_id,
            repository,
            writes,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn jobs(&self) -> Vec<BatchRecycleJob> {
        lock(&self.jobs).clone()
    }

    pub fn job(&self, job_id: &str) -> Option<BatchRecycleJob> {
        lock(&self.jobs).iter().find(|j| j.id == job_id).cloned()
    }

    /// The unfinished job that ends first.
    pub fn next_pending(&self, now_millis: i64) -> Option<BatchRecycleJob> {
        lock(&self.jobs)
            .iter()
            .filter(|j| j.remaining(now_millis).is_some())
            .min_by_key(|j| j.ends_at())
            .cloned()
    }

    /// The queued job that ends first at or after `ends_at`. Used to pick
    /// the successor of a finished job; jobs that were already overdue
    /// before it are skipped.
    pub fn next_ending_from(&self, ends_at: i64) -> Option<BatchRecycleJob> {
        lock(&self.jobs)
            .iter()
            .filter(|j| j.ends_at() >= ends_at)
            .min_by_key(|j| j.ends_at())
            .cloned()
    }

    pub async fn add_job(&self, job: BatchRecycleJob) -> Result<(), ContextError> {
        let _write = self.writes.acquire().await;
        let mut jobs = self.jobs();
        jobs.push(job);
        self.store(jobs).await
    }

    /// Removes a job, returning it. `Ok(None)` if it was already gone.
    pub async fn remove_job(&self, job_id: &str) -> Result<Option<BatchRecycleJob>, ContextError> {
        let _write = self.writes.acquire().await;
        let mut jobs = self.jobs();
        let Some(index) = jobs.iter().position(|j| j.id == job_id) else {
            return Ok(None);
        };
        let removed = jobs.remove(index);
        self.store(jobs).await?;
        Ok(Some(removed))
    }

    async fn store(&self, jobs: Vec<BatchRecycleJob>) -> Result<(), ContextError> {
        let stored = jobs.clone();
        write_objects(self.repository.as_ref(), &self.player_id, move |o| {
            o.batch_recycles = stored
        })
        .await
        .inspect_err(|e| {
            tracing::error!(player_id = %self.player_id, error = %e, "batch recycle write failed");
        })?;
        *lock(&self.jobs) = jobs;
        Ok(())
    }
}

#[async_trait]
impl GameService for BatchRecycleService {
    fn name(&self) -> &'static str {
        "batch_recycle"
    }

    async fn init(&self, player_id: &PlayerId) -> Result<(), ContextError> {
        let objects = self.repository.load_player_objects(player_id).await?;
        *lock(&self.jobs) = objects.batch_recycles;
        Ok(())
    }

    async fn close(&self, _player_id: &PlayerId) -> Result<(), ContextError> {
        Ok(())
    }
}
