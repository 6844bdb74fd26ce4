//! Task categories.
//!
//! A category names a kind of timed operation. At most one task per
//! `(connection, category)` is live at any time, so the category is also
//! the replacement key: scheduling a second building-upgrade for the same
//! connection replaces the first.

use std::fmt;

use pioforge_protocol::PlayerId;

/// Every kind of timed operation the server schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskCategory {
    /// Recurring server-time sync (`tu`).
    TimeUpdate,
    BuildingCreate,
    BuildingRepair,
    BuildingUpgrade,
    MissionReturn,
    JunkRemoval,
    BatchRecycleComplete,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 7] = [
        Self::TimeUpdate,
        Self::BuildingCreate,
        Self::BuildingRepair,
        Self::BuildingUpgrade,
        Self::MissionReturn,
        Self::JunkRemoval,
        Self::BatchRecycleComplete,
    ];

    /// Short code used in task ids and logs.
    pub fn code(self) -> &'static str {
        match self {
            Self::TimeUpdate => "TU",
            Self::BuildingCreate => "BLD-CREATE",
            Self::BuildingRepair => "BLD-REPAIR",
            Self::BuildingUpgrade => "BLD-UPGRADE",
            Self::MissionReturn => "MIS-RETURN",
            Self::JunkRemoval => "TASK-JUNK",
            Self::BatchRecycleComplete => "BATCH-RECYCLE",
        }
    }

    /// Builds the log id of a task: `{code}-{player}` or
    /// `{code}-{entity}-{player}`.
    pub fn task_id(self, player_id: &PlayerId, entity: Option<&str>) -> String {
        match entity {
            Some(entity) => format!("{}-{entity}-{player_id}", self.code()),
            None => format!("{}-{player_id}", self.code()),
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<_> = TaskCategory::ALL.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), TaskCategory::ALL.len());
    }

    #[test]
    fn test_task_id_with_and_without_entity() {
        let p = PlayerId::new("p1");
        assert_eq!(TaskCategory::TimeUpdate.task_id(&p, None), "TU-p1");
        assert_eq!(
            TaskCategory::BuildingUpgrade.task_id(&p, Some("b7")),
            "BLD-UPGRADE-b7-p1"
        );
    }
}
