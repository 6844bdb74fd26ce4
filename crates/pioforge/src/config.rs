//! Server configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use pioforge_protocol::WireCodec;
use pioforge_session::{JoinKeyConfig, SessionConfig};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Everything the socket server needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the game socket listens on.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is torn down.
    ///
    /// Default: 60 seconds. The client sends a save or a heartbeat well
    /// within that while it is running.
    pub keepalive_timeout: Duration,

    /// Size of each socket read. Default: 4096 bytes.
    pub read_buffer_size: usize,

    /// Largest message the codec will buffer. Input that declares or
    /// accumulates more is discarded. Default: 1 MiB.
    pub max_message_size: usize,

    pub session: SessionConfig,
    pub join_key: JoinKeyConfig,
    pub speed_ups: SpeedUpTable,
    pub game_ready: GameReadyPayload,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            keepalive_timeout: Duration::from_secs(60),
            read_buffer_size: 4096,
            max_message_size: WireCodec::DEFAULT_MAX_MESSAGE_SIZE,
            session: SessionConfig::default(),
            join_key: JoinKeyConfig::default(),
            speed_ups: SpeedUpTable::default(),
            game_ready: GameReadyPayload::default(),
        }
    }
}

impl ServerConfig {
    /// Smallest read buffer that still fits a short message burst.
    pub const MIN_READ_BUFFER: usize = 64;

    /// Clamps values that would break the read loop.
    ///
    /// - `keepalive_timeout` is at least one second.
    /// - `read_buffer_size` is at least [`Self::MIN_READ_BUFFER`].
    /// - `max_message_size` is at least `read_buffer_size`.
    /// - nested configs are validated too.
    pub fn validated(mut self) -> Self {
        self.keepalive_timeout = self.keepalive_timeout.max(Duration::from_secs(1));
        if self.read_buffer_size < Self::MIN_READ_BUFFER {
            tracing::warn!(
                requested = self.read_buffer_size,
                using = Self::MIN_READ_BUFFER,
                "read buffer too small"
            );
            self.read_buffer_size = Self::MIN_READ_BUFFER;
        }
        if self.max_message_size < self.read_buffer_size {
            tracing::warn!(
                requested = self.max_message_size,
                using = self.read_buffer_size,
                "max message size below read buffer"
            );
            self.max_message_size = self.read_buffer_size;
        }
        self.session = self.session.validated();
        self.join_key = self.join_key.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// Speed-up cost table
// ---------------------------------------------------------------------------

/// Pricing for one speed-up option, as it appears in the cost table the
/// client also receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeedUpOption {
    pub enabled: bool,
    /// Seconds this option skips, for fixed-size options.
    pub time: Option<u32>,
    /// Longest remaining time this option may be used on.
    pub max_time: Option<u32>,
    /// Share of the remaining time being skipped, for `SpeedUpHalf`.
    pub percent: Option<f64>,
    pub cost_per_min: f64,
    pub min_cost: i32,
}

impl Default for SpeedUpOption {
    fn default() -> Self {
        Self {
            enabled: true,
            time: None,
            max_time: None,
            percent: None,
            cost_per_min: 0.0,
            min_cost: 0,
        }
    }
}

/// Speed-up options keyed by their client-side name (`SpeedUpHalf`...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeedUpTable {
    options: BTreeMap<String, SpeedUpOption>,
}

impl SpeedUpTable {
    pub const ONE_HOUR: &'static str = "SpeedUpOneHour";
    pub const TWO_HOUR: &'static str = "SpeedUpTwoHour";
    pub const HALF: &'static str = "SpeedUpHalf";
    pub const COMPLETE: &'static str = "SpeedUpComplete";
    pub const FREE: &'static str = "SpeedUpFree";

    const KNOWN: [&'static str; 5] = [
        Self::ONE_HOUR,
        Self::TWO_HOUR,
        Self::HALF,
        Self::COMPLETE,
        Self::FREE,
    ];

    /// Reads the speed-up entries out of a full cost-table document.
    ///
    /// Other cost-table entries are ignored. A known option missing from
    /// the document keeps its default pricing.
    pub fn from_cost_table(json: &str) -> Result<Self, serde_json::Error> {
        let mut doc: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut table = Self::default();
        for key in Self::KNOWN {
            if let Some(entry) = doc.remove(key) {
                table.options.insert(key.to_string(), serde_json::from_value(entry)?);
            }
        }
        Ok(table)
    }

    pub fn get(&self, option: &str) -> Option<&SpeedUpOption> {
        self.options.get(option)
    }

    pub fn insert(&mut self, option: impl Into<String>, pricing: SpeedUpOption) {
        self.options.insert(option.into(), pricing);
    }

    /// Cash cost of applying `option` to a timer with `seconds_remaining`.
    ///
    /// Unknown and disabled options cost nothing; callers decide whether
    /// to accept them. `SpeedUpHalf` is priced on its share of the
    /// remaining time. Every other option is priced on all of it.
    pub fn cost(&self, option: &str, seconds_remaining: u64) -> i32 {
        let Some(pricing) = self.get(option).filter(|p| p.enabled) else {
            return 0;
        };
        let seconds = match option {
            Self::FREE => return 0,
            Self::HALF => seconds_remaining as f64 * pricing.percent.unwrap_or(0.5),
            _ => seconds_remaining as f64,
        };
        let priced = (pricing.cost_per_min * seconds / 60.0).ceil() as i32;
        priced.max(pricing.min_cost)
    }

    /// Whether `option` may be used on a timer with `seconds_remaining`.
    pub fn allows(&self, option: &str, seconds_remaining: u64) -> bool {
        match self.get(option) {
            Some(pricing) if pricing.enabled => pricing
                .max_time
                .is_none_or(|max| seconds_remaining <= u64::from(max)),
            _ => false,
        }
    }
}

impl Default for SpeedUpTable {
    fn default() -> Self {
        let option = |cost_per_min: f64, min_cost: i32| SpeedUpOption {
            cost_per_min,
            min_cost,
            ..SpeedUpOption::default()
        };
        let mut options = BTreeMap::new();
        options.insert(
            Self::ONE_HOUR.to_string(),
            SpeedUpOption {
                time: Some(3600),
                ..option(0.5, 5)
            },
        );
        options.insert(
            Self::TWO_HOUR.to_string(),
            SpeedUpOption {
                time: Some(7200),
                ..option(0.5, 10)
            },
        );
        options.insert(
            Self::HALF.to_string(),
            SpeedUpOption {
                percent: Some(0.5),
                ..option(0.6, 5)
            },
        );
        options.insert(Self::COMPLETE.to_string(), option(0.75, 10));
        options.insert(
            Self::FREE.to_string(),
            SpeedUpOption {
                max_time: Some(300),
                ..option(0.0, 0)
            },
        );
        Self { options }
    }
}

// ---------------------------------------------------------------------------
// Game-ready payload
// ---------------------------------------------------------------------------

/// Static parts of the `gr` (game ready) message.
///
/// The per-player login state is built at join time; everything here is
/// the same for every player.
#[derive(Debug, Clone, Default)]
pub struct GameReadyPayload {
    /// Packed game-definition archive the client unpacks on load.
    pub binaries: Vec<u8>,
    /// Cost table JSON, sent verbatim.
    pub cost_table: String,
    /// Survivor table JSON, sent verbatim.
    pub srv_table: String,
}

impl GameReadyPayload {
    pub const BINARIES_FILE: &'static str = "binaries.bin";
    pub const COST_TABLE_FILE: &'static str = "cost_table.json";
    pub const SRV_TABLE_FILE: &'static str = "srv_table.json";

    /// Loads the three files from `dir`.
    pub async fn load(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            binaries: tokio::fs::read(dir.join(Self::BINARIES_FILE)).await?,
            cost_table: tokio::fs::read_to_string(dir.join(Self::COST_TABLE_FILE)).await?,
            srv_table: tokio::fs::read_to_string(dir.join(Self::SRV_TABLE_FILE)).await?,
        })
    }

    /// The cost table, or `"{}"` when none was loaded.
    pub fn cost_table_json(&self) -> &str {
        non_empty_json(&self.cost_table)
    }

    pub fn srv_table_json(&self) -> &str {
        non_empty_json(&self.srv_table)
    }
}

fn non_empty_json(raw: &str) -> &str {
    if raw.trim().is_empty() { "{}" } else { raw }
}
