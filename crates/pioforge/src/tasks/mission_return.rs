use std::time::Duration;

use pioforge_protocol::Value;
use pioforge_task::{ServerTask, TaskCategory, TaskConfig, TaskError, async_trait};
use pioforge_transport::ClientConnection;

use crate::message;

/// Brings a mission team home: `["mrc", missionId]` when the return
/// timer runs out.
pub struct MissionReturnTask {
    pub mission_id: String,
    pub return_time: Duration,
}

#[async_trait]
impl ServerTask for MissionReturnTask {
    fn category(&self) -> TaskCategory {
        TaskCategory::MissionReturn
    }

    fn config(&self) -> TaskConfig {
        TaskConfig::once_after(self.return_time)
    }

    fn entity_id(&self) -> Option<String> {
        Some(self.mission_id.clone())
    }

    async fn execute(&self, connection: &ClientConnection) -> Result<(), TaskError> {
        connection
            .send_message(message::MISSION_RETURN_COMPLETE, [Value::from(&self.mission_id)])
            .await?;
        Ok(())
    }
}
