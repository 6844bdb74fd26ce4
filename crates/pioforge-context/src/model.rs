//! Stored player data the services work on.
//!
//! Only the entities the socket layer reads or mutates are typed here.
//! Everything else in a player's document (survivor sheets, items,
//! quest state) stays `serde_json::Value` and is passed through untouched.

use std::collections::BTreeMap;
use std::time::Duration;

use pioforge_protocol::PlayerId;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Account row loaded at join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub player_id: PlayerId,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Id of the survivor that leads this player's compound.
    #[serde(default)]
    pub leader_id: Option<String>,
    /// Epoch milliseconds of the last disconnect, zero if never.
    #[serde(default)]
    pub last_login: i64,
}

impl Account {
    pub fn new(player_id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            player_id,
            display_name: display_name.into(),
            avatar_url: None,
            leader_id: None,
            last_login: 0,
        }
    }
}

/// A player's game document: compound, resources, pending jobs, flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerObjects {
    #[serde(default)]
    pub resources: GameResources,
    #[serde(default)]
    pub buildings: Vec<Building>,
    #[serde(default)]
    pub batch_recycles: Vec<BatchRecycleJob>,
    #[serde(default)]
    pub nickname: Option<String>,
    /// Client-defined progress flags, stored as raw bytes.
    #[serde(default)]
    pub flags: Vec<u8>,
    /// Fields this server does not interpret, kept so a write-back does
    /// not drop them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Json>,
}

/// Stockpiled resources. `cash` is the premium currency spent on speed-ups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameResources {
    pub wood: i32,
    pub metal: i32,
    pub cloth: i32,
    pub water: i32,
    pub food: i32,
    pub ammunition: i32,
    pub cash: i32,
}

/// A running countdown on an entity.
///
/// `start` is epoch milliseconds, `length` is whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerData {
    pub start: i64,
    pub length: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, Json>>,
}

impl TimerData {
    /// A timer that started at `now_millis` and lasts `duration`.
    pub fn run_for(duration: Duration, now_millis: i64) -> Self {
        Self {
            start: now_millis,
            length: duration.as_secs() as i64,
            data: None,
        }
    }

    pub fn ends_at(&self) -> i64 {
        self.start + self.length * 1000
    }

    pub fn has_ended(&self, now_millis: i64) -> bool {
        now_millis >= self.ends_at()
    }

    /// Whole seconds left, never negative.
    pub fn seconds_left(&self, now_millis: i64) -> i64 {
        ((self.ends_at() - now_millis) / 1000).max(0)
    }
}

/// Fields every building carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingCore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Building definition id, as in the game's building XML.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub tx: i32,
    #[serde(default)]
    pub ty: i32,
    #[serde(default)]
    pub destroyed: bool,
    #[serde(default)]
    pub resource_value: f64,
    #[serde(default)]
    pub upgrade: Option<TimerData>,
    #[serde(default)]
    pub repair: Option<TimerData>,
}

impl BuildingCore {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: kind.into(),
            level: 0,
            rotation: 0,
            tx: 0,
            ty: 0,
            destroyed: false,
            resource_value: 0.0,
            upgrade: None,
            repair: None,
        }
    }
}

/// Debris placed on a new compound. Cleared by a junk-removal task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunkBuilding {
    #[serde(flatten)]
    pub core: BuildingCore,
    #[serde(default)]
    pub items: Vec<Json>,
    pub pos: String,
    pub rot: String,
}

/// Anything that occupies a compound tile.
///
/// Stored documents carry no discriminator; junk is recognised by its
/// `pos`/`rot` fields, so it is tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Building {
    Junk(JunkBuilding),
    Standard(BuildingCore),
}

impl Building {
    pub fn core(&self) -> &BuildingCore {
        match self {
            Self::Junk(junk) => &junk.core,
            Self::Standard(core) => core,
        }
    }

    pub fn core_mut(&mut self) -> &mut BuildingCore {
        match self {
            Self::Junk(junk) => &mut junk.core,
            Self::Standard(core) => core,
        }
    }

    pub fn id(&self) -> &str {
        &self.core().id
    }

    pub fn is_junk(&self) -> bool {
        matches!(self, Self::Junk(_))
    }

    /// Production buildings accumulate resources while the player is away.
    pub fn is_production(&self) -> bool {
        !self.is_junk() && self.core().kind.contains("resource")
    }
}

/// Items queued for recycling. `end` is the job length in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecycleJob {
    pub id: String,
    #[serde(default)]
    pub items: Vec<Json>,
    pub start: i64,
    pub end: i32,
}

impl BatchRecycleJob {
    pub fn ends_at(&self) -> i64 {
        self.start + i64::from(self.end) * 1000
    }

    /// Time until the job finishes, or `None` if it already has.
    pub fn remaining(&self, now_millis: i64) -> Option<Duration> {
        let left = self.ends_at() - now_millis;
        (left > 0).then(|| Duration::from_millis(left as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_building_deserialize_with_pos_rot_is_junk() {
        let junk: Building = serde_json::from_value(json!({
            "id": "j1", "type": "junk-pile", "pos": "1,2", "rot": "0", "items": []
        }))
        .unwrap();
        assert!(junk.is_junk());
        assert_eq!(junk.id(), "j1");

        let standard: Building = serde_json::from_value(json!({
            "id": "b1", "type": "resource-wood", "level": 2, "tx": 4, "ty": 5
        }))
        .unwrap();
        assert!(!standard.is_junk());
        assert!(standard.is_production());
        assert_eq!(standard.core().level, 2);
    }

    #[test]
    fn test_building_serialize_keeps_type_field_name() {
        let building = Building::Standard(BuildingCore::new("b1", "bed"));
        let value = serde_json::to_value(&building).unwrap();
        assert_eq!(value["type"], "bed");
        assert_eq!(value["resourceValue"], 0.0);
    }

    #[test]
    fn test_timer_seconds_left_never_negative() {
        let timer = TimerData::run_for(Duration::from_secs(10), 1_000);
        assert_eq!(timer.seconds_left(1_000), 10);
        assert_eq!(timer.seconds_left(8_000), 3);
        assert_eq!(timer.seconds_left(60_000), 0);
        assert!(timer.has_ended(11_000));
    }

    #[test]
    fn test_batch_job_remaining_none_once_finished() {
        let job = BatchRecycleJob {
            id: "r1".into(),
            items: vec![],
            start: 10_000,
            end: 30,
        };
        assert_eq!(job.remaining(20_000), Some(Duration::from_secs(20)));
        assert_eq!(job.remaining(40_000), None);
    }

    #[test]
    fn test_player_objects_round_trip_keeps_unknown_fields() {
        let raw = json!({
            "resources": {"cash": 120},
            "buildings": [],
            "quests": {"q1": true}
        });
        let objects: PlayerObjects = serde_json::from_value(raw).unwrap();
        assert_eq!(objects.resources.cash, 120);
        assert_eq!(objects.extra["quests"], json!({"q1": true}));

        let back = serde_json::to_value(&objects).unwrap();
        assert_eq!(back["quests"], json!({"q1": true}));
    }
}
