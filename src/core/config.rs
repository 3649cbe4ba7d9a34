//! Environment-driven bot configuration
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use super::error::{BotError, BotResult};
use anyhow::{anyhow, Result};
use std::path::PathBuf;

/// Default local time of the daily congratulation check
pub const DEFAULT_DAILY_CHECK_TIME: (u32, u32) = (8, 0);

/// Default misfire grace for the daily check (one hour)
pub const DEFAULT_MISFIRE_GRACE_SECS: u64 = 3600;

/// Default per-recipient send timeout
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// Development guild for instant command registration
    pub discord_guild_id: Option<String>,
    /// Shared-deadline broadcast channel (`broadcast_destination`)
    pub broadcast_channel_id: Option<i64>,
    /// Only this guild (plus DMs) may run deadline commands (`allowed_origin`)
    pub allowed_guild_id: Option<u64>,
    pub data_dir: PathBuf,
    pub birthdays_file: PathBuf,
    /// Local (hour, minute) of the daily check
    pub daily_check_time: (u32, u32),
    pub misfire_grace_secs: u64,
    pub send_timeout_secs: u64,
    pub log_level: String,
}

impl Config {
    /// Read configuration from the process environment
    ///
    /// Call `dotenvy::dotenv()` first so a `.env` file is honoured.
    pub fn from_env() -> Result<Self> {
        let discord_token = std::env::var("DISCORD_TOKEN")
            .map_err(|_| anyhow!("DISCORD_TOKEN environment variable not set"))?;

        let data_dir = PathBuf::from(env_or("DATA_DIR", "data"));
        let birthdays_file = std::env::var("BIRTHDAYS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("birthdays.json"));

        let daily_check_time = match std::env::var("DAILY_CHECK_TIME") {
            Ok(raw) => parse_clock_time(&raw)?,
            Err(_) => DEFAULT_DAILY_CHECK_TIME,
        };

        Ok(Config {
            discord_token,
            discord_guild_id: std::env::var("DISCORD_GUILD_ID").ok(),
            broadcast_channel_id: parse_optional("BROADCAST_CHANNEL_ID")?,
            allowed_guild_id: parse_optional("ALLOWED_GUILD_ID")?,
            data_dir,
            birthdays_file,
            daily_check_time,
            misfire_grace_secs: parse_optional("MISFIRE_GRACE_SECS")?
                .unwrap_or(DEFAULT_MISFIRE_GRACE_SECS),
            send_timeout_secs: parse_optional("SEND_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_SEND_TIMEOUT_SECS),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }

    /// Whether a command issued from `guild_id` may touch deadlines
    ///
    /// Direct messages (no guild) are always allowed.
    pub fn is_origin_allowed(&self, guild_id: Option<u64>) -> bool {
        match (self.allowed_guild_id, guild_id) {
            (Some(allowed), Some(gid)) => allowed == gid,
            _ => true,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional numeric variable; empty and "0" count as unset
fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() || raw.trim() == "0" => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{key} must be a number, got '{raw}'")),
        Err(_) => Ok(None),
    }
}

/// Parse "HH:MM" into (hour, minute)
pub fn parse_clock_time(raw: &str) -> BotResult<(u32, u32)> {
    let invalid = |what: &str| BotError::Config(format!("{what} in DAILY_CHECK_TIME '{raw}'"));
    let (h, m) = raw
        .trim()
        .split_once(':')
        .ok_or_else(|| invalid("expected HH:MM"))?;
    let hour: u32 = h.parse().map_err(|_| invalid("invalid hour"))?;
    let minute: u32 = m.parse().map_err(|_| invalid("invalid minute"))?;
    if hour > 23 || minute > 59 {
        return Err(invalid("time out of range"));
    }
    Ok((hour, minute))
}
