//! Bot configuration loaded from environment variables
//!
//! Room and database settings come from [`CommonConfig`]; the knobs below
//! control command gating, enqueue retries and reconnect pacing.

use std::path::PathBuf;
use std::time::Duration;

use tubebot_shared_config::{
    get_env_or_default, parse_env, CommonConfig, DatabaseConfig, RoomConfig,
};

use crate::error::{BotError, BotResult};
use crate::protocol::Rank;

/// Default number of random characters in a random-pick query
pub const DEFAULT_POOL_WIDTH: u32 = 3;

/// Bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Common configuration shared with other entry points
    pub common: CommonConfig,

    /// Path of the tracked source list
    pub source_list: PathBuf,

    /// Minimum rank a user needs to run commands
    pub min_rank: Rank,

    /// Chat messages older than this are ignored
    pub staleness: Duration,

    /// Wait between enqueue attempts after a rejection
    pub retry_delay: Duration,

    /// Attempts per item before giving up
    pub max_enqueue_attempts: u32,

    /// Wait between the farewell message and disconnecting
    pub kill_grace: Duration,

    /// Wait before reconnecting after a connection failure
    pub reconnect_delay: Duration,

    /// Prefix that marks a chat message as a command
    pub command_prefix: String,

    /// Query width used by `random` when no argument is given
    pub default_pool_width: u32,
}

impl BotConfig {
    /// Merge a local `.env` file into the environment, then load
    pub fn load() -> BotResult<Self> {
        let common = CommonConfig::load()?;
        Self::with_common(common)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> BotResult<Self> {
        let common = CommonConfig::from_env()?;
        Self::with_common(common)
    }

    fn with_common(common: CommonConfig) -> BotResult<Self> {
        let config = Self {
            common,
            source_list: PathBuf::from(get_env_or_default("BOT_SOURCE_LIST", "channel-ids.txt")),
            min_rank: Rank(parse_env("BOT_MIN_RANK", 3.0_f64)?),
            staleness: Duration::from_secs(parse_env("BOT_STALENESS_SECS", 10)?),
            retry_delay: Duration::from_secs(parse_env("BOT_RETRY_DELAY_SECS", 2)?),
            max_enqueue_attempts: parse_env("BOT_MAX_ENQUEUE_ATTEMPTS", 5)?,
            kill_grace: Duration::from_secs(parse_env("BOT_KILL_GRACE_SECS", 3)?),
            reconnect_delay: Duration::from_secs(parse_env("BOT_RECONNECT_DELAY_SECS", 5)?),
            command_prefix: get_env_or_default("BOT_COMMAND_PREFIX", "!"),
            default_pool_width: DEFAULT_POOL_WIDTH,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration around an explicit room with default knobs
    pub fn for_room(room: RoomConfig) -> Self {
        let mut common = CommonConfig::for_room(room);
        common.database = DatabaseConfig::in_memory();
        Self {
            common,
            source_list: PathBuf::from("channel-ids.txt"),
            min_rank: Rank(3.0),
            staleness: Duration::from_secs(10),
            retry_delay: Duration::from_secs(2),
            max_enqueue_attempts: 5,
            kill_grace: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(5),
            command_prefix: "!".to_string(),
            default_pool_width: DEFAULT_POOL_WIDTH,
        }
    }

    fn validate(&self) -> BotResult<()> {
        if self.max_enqueue_attempts == 0 {
            return Err(BotError::InvalidConfig(
                "BOT_MAX_ENQUEUE_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.command_prefix.trim().is_empty() {
            return Err(BotError::InvalidConfig(
                "BOT_COMMAND_PREFIX must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get room configuration
    pub fn room(&self) -> &RoomConfig {
        &self.common.room
    }

    /// Get database configuration
    pub fn database(&self) -> &DatabaseConfig {
        &self.common.database
    }
}
