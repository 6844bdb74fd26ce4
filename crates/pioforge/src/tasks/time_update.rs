use std::time::Duration;

use pioforge_protocol::server_time;
use pioforge_task::{ServerTask, TaskCategory, TaskConfig, TaskError, async_trait};
use pioforge_transport::ClientConnection;

use crate::message;

/// Keeps the client clock in step: `["tu", now]` once a second.
pub struct TimeUpdateTask;

impl TimeUpdateTask {
    pub const INTERVAL: Duration = Duration::from_secs(1);
}

#[async_trait]
impl ServerTask for TimeUpdateTask {
    fn category(&self) -> TaskCategory {
        TaskCategory::TimeUpdate
    }

    fn config(&self) -> TaskConfig {
        TaskConfig::repeating(Self::INTERVAL, Self::INTERVAL)
    }

    async fn execute(&self, connection: &ClientConnection) -> Result<(), TaskError> {
        connection
            .send_message(message::TIME_UPDATE, [server_time().into()])
            .await?;
        Ok(())
    }
}
