use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use pioforge_context::{ContextError, PlayerContextTracker};
use pioforge_protocol::{PlayerId, Value, epoch_millis};
use pioforge_task::{CancelReason, ServerTask, TaskCategory, TaskConfig, TaskError, async_trait};
use pioforge_transport::ClientConnection;

use super::context_failure;
use crate::message;

/// A junk-removal task the client can still speed up or cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct JunkRemovalEntry {
    pub task_id: String,
    pub player_id: PlayerId,
    /// Epoch milliseconds.
    pub started_at: i64,
    pub duration: Duration,
}

impl JunkRemovalEntry {
    /// Whole seconds left at `now_millis`, never negative.
    pub fn seconds_remaining(&self, now_millis: i64) -> u64 {
        let elapsed = ((now_millis - self.started_at) / 1000).max(0) as u64;
        self.duration.as_secs().saturating_sub(elapsed)
    }
}

/// Running junk-removal tasks, keyed by player and client task id.
#[derive(Default)]
pub struct JunkRemovalRegistry {
    entries: DashMap<(PlayerId, String), JunkRemovalEntry>,
}

impl JunkRemovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: JunkRemovalEntry) {
        let key = (entry.player_id.clone(), entry.task_id.clone());
        self.entries.insert(key, entry);
    }

    pub fn get(&self, player_id: &PlayerId, task_id: &str) -> Option<JunkRemovalEntry> {
        self.entries
            .get(&(player_id.clone(), task_id.to_string()))
            .map(|e| e.value().clone())
    }

    pub fn remove(&self, player_id: &PlayerId, task_id: &str) -> Option<JunkRemovalEntry> {
        self.entries
            .remove(&(player_id.clone(), task_id.to_string()))
            .map(|(_, entry)| entry)
    }

    /// Removes `entry` only if it is still the registered one, so a task
    /// replaced under the same id cannot drop its successor's entry.
    pub fn remove_exact(&self, entry: &JunkRemovalEntry) -> bool {
        self.entries
            .remove_if(
                &(entry.player_id.clone(), entry.task_id.clone()),
                |_, current| current == entry,
            )
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Clears a junk pile off the compound.
///
/// On fire it deletes the junk building and sends `["tc", taskId]`; the
/// registry entry goes when the task completes or is cancelled.
pub struct JunkRemovalTask {
    entry: JunkRemovalEntry,
    building_id: String,
    tracker: Arc<PlayerContextTracker>,
    registry: Arc<JunkRemovalRegistry>,
}

impl JunkRemovalTask {
    /// Records the task in `registry`, so it can be sped up, and returns
    /// it ready to schedule.
    pub fn register(
        registry: Arc<JunkRemovalRegistry>,
        tracker: Arc<PlayerContextTracker>,
        player_id: PlayerId,
        task_id: impl Into<String>,
        building_id: impl Into<String>,
        duration: Duration,
    ) -> Self {
        let entry = JunkRemovalEntry {
            task_id: task_id.into(),
            player_id,
            started_at: epoch_millis(),
            duration,
        };
        registry.insert(entry.clone());
        Self {
            entry,
            building_id: building_id.into(),
            tracker,
            registry,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.entry.task_id
    }
}

#[async_trait]
impl ServerTask for JunkRemovalTask {
    fn category(&self) -> TaskCategory {
        TaskCategory::JunkRemoval
    }

    fn config(&self) -> TaskConfig {
        TaskConfig::once_after(self.entry.duration)
    }

    fn entity_id(&self) -> Option<String> {
        Some(self.entry.task_id.clone())
    }

    async fn execute(&self, connection: &ClientConnection) -> Result<(), TaskError> {
        let player_id = &self.entry.player_id;
        let ctx = self
            .tracker
            .require_context(player_id)
            .map_err(context_failure)?;
        match ctx.services.compound.delete_building(&self.building_id).await {
            Ok(()) => {}
            Err(ContextError::EntityNotFound { .. }) => {
                tracing::warn!(
                    %player_id,
                    building_id = %self.building_id,
                    "junk already gone"
                );
            }
            Err(e) => return Err(context_failure(e)),
        }

        connection
            .send_message(message::TASK_COMPLETE, [Value::from(&self.entry.task_id)])
            .await?;
        Ok(())
    }

    async fn on_complete(&self, _connection: &ClientConnection) -> Result<(), TaskError> {
        self.registry.remove_exact(&self.entry);
        Ok(())
    }

    async fn on_cancelled(&self, _connection: &ClientConnection, reason: CancelReason) {
        tracing::debug!(task_id = %self.entry.task_id, ?reason, "junk removal cancelled");
        self.registry.remove_exact(&self.entry);
    }
}
