use anyhow::Result;
use chrono::Duration;
use log::warn;
use rusqlite::Connection;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::Mutex;

use crate::database::bot_state;
use crate::errors::{LadderError, LadderResult};

pub const COOLDOWN_HOURS_RANGE: RangeInclusive<i64> = 0..=168;
pub const RESPONSE_WINDOW_HOURS_RANGE: RangeInclusive<i64> = 1..=168;

#[derive(Debug, Clone, PartialEq)]
pub struct LadderSettings {
    pub cooldown_hours: i64,
    pub response_window_hours: i64,
    pub reminder_interval_minutes: i64,
    pub max_rank: u8,
    pub open_challenge_ranks: Vec<u8>,
    pub sets_to_win: u8,
    pub points_per_set: u32,
    pub elo_k_factor: f64,
    pub elo_floor: i64,
    pub starting_elo: i64,
}

impl Default for LadderSettings {
    fn default() -> Self {
        Self {
            cooldown_hours: 8,
            response_window_hours: 12,
            reminder_interval_minutes: 30,
            max_rank: 10,
            open_challenge_ranks: vec![8, 9, 10],
            sets_to_win: 2,
            points_per_set: 10,
            elo_k_factor: 32.0,
            elo_floor: 100,
            starting_elo: 1200,
        }
    }
}

impl LadderSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cooldown_hours: env_or("COOLDOWN_HOURS", defaults.cooldown_hours),
            response_window_hours: env_or("RESPONSE_WINDOW_HOURS", defaults.response_window_hours),
            reminder_interval_minutes: env_or(
                "REMINDER_INTERVAL_MINUTES",
                defaults.reminder_interval_minutes,
            ),
            ..defaults
        }
    }

    /// Applies the overrides an admin stored at runtime on top of `self`.
    pub fn with_overrides(mut self, conn: &Connection) -> Result<Self> {
        if let Some(hours) = stored_hours(conn, bot_state::COOLDOWN_HOURS_KEY)? {
            self.cooldown_hours = hours;
        }
        if let Some(hours) = stored_hours(conn, bot_state::RESPONSE_WINDOW_HOURS_KEY)? {
            self.response_window_hours = hours;
        }
        Ok(self)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::hours(self.cooldown_hours)
    }

    pub fn response_window(&self) -> Duration {
        Duration::hours(self.response_window_hours)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::minutes(self.reminder_interval_minutes)
    }
}

fn stored_hours(conn: &Connection, key: &str) -> Result<Option<i64>> {
    let Some(raw) = bot_state::get(conn, key)? else {
        return Ok(None);
    };
    match raw.trim().parse() {
        Ok(hours) => Ok(Some(hours)),
        Err(_) => {
            warn!("Ignoring unparseable {key} override: {raw:?}");
            Ok(None)
        }
    }
}

pub fn validate_cooldown_hours(hours: i64) -> LadderResult<()> {
    if !COOLDOWN_HOURS_RANGE.contains(&hours) {
        return Err(LadderError::Invalid(format!(
            "Cooldown must be between {} and {} hours",
            COOLDOWN_HOURS_RANGE.start(),
            COOLDOWN_HOURS_RANGE.end()
        )));
    }
    Ok(())
}

pub fn validate_response_window_hours(hours: i64) -> LadderResult<()> {
    if !RESPONSE_WINDOW_HOURS_RANGE.contains(&hours) {
        return Err(LadderError::Invalid(format!(
            "Response window must be between {} and {} hours",
            RESPONSE_WINDOW_HOURS_RANGE.start(),
            RESPONSE_WINDOW_HOURS_RANGE.end()
        )));
    }
    Ok(())
}

/// Hands out configuration snapshots. The cached snapshot is rebuilt from the
/// stored overrides after `invalidate`.
pub struct SettingsProvider {
    base: LadderSettings,
    cached: Mutex<Option<LadderSettings>>,
}

impl SettingsProvider {
    pub fn new(base: LadderSettings) -> Self {
        Self {
            base,
            cached: Mutex::new(None),
        }
    }

    pub fn snapshot(&self, conn: &Connection) -> Result<LadderSettings> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow::anyhow!("Settings cache lock poisoned"))?;

        if let Some(settings) = cached.as_ref() {
            return Ok(settings.clone());
        }

        let settings = self.base.clone().with_overrides(conn)?;
        *cached = Some(settings.clone());
        Ok(settings)
    }

    pub fn invalidate(&self) {
        match self.cached.lock() {
            Ok(mut cached) => *cached = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub expiry_interval: std::time::Duration,
    pub reminder_interval: std::time::Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            expiry_interval: std::time::Duration::from_secs(60),
            reminder_interval: std::time::Duration::from_secs(300),
        }
    }
}

pub struct AppConfig {
    pub ladder: LadderSettings,
    pub scheduler: SchedulerSettings,
    pub database_path: String,
    pub bot_ids: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            ladder: LadderSettings::from_env(),
            scheduler: SchedulerSettings::default(),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "rank_ladder.db".to_string()),
            bot_ids: parse_id_list(&std::env::var("LADDER_BOT_IDS").unwrap_or_default()),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {key}={raw:?}");
            default
        }),
        Err(_) => default,
    }
}

pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::setup::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn overrides_come_from_bot_state() {
        let conn = conn();
        bot_state::set(&conn, bot_state::COOLDOWN_HOURS_KEY, "2").unwrap();
        bot_state::set(&conn, bot_state::RESPONSE_WINDOW_HOURS_KEY, "garbage").unwrap();

        let settings = LadderSettings::default().with_overrides(&conn).unwrap();
        assert_eq!(settings.cooldown_hours, 2);
        assert_eq!(settings.response_window_hours, 12);
        assert_eq!(settings.cooldown(), Duration::hours(2));
    }

    #[test]
    fn snapshot_is_cached_until_invalidated() {
        let conn = conn();
        let provider = SettingsProvider::new(LadderSettings::default());
        assert_eq!(provider.snapshot(&conn).unwrap().cooldown_hours, 8);

        bot_state::set(&conn, bot_state::COOLDOWN_HOURS_KEY, "1").unwrap();
        assert_eq!(provider.snapshot(&conn).unwrap().cooldown_hours, 8);

        provider.invalidate();
        assert_eq!(provider.snapshot(&conn).unwrap().cooldown_hours, 1);
    }

    #[test]
    fn setting_bounds() {
        assert!(validate_cooldown_hours(0).is_ok());
        assert!(validate_cooldown_hours(168).is_ok());
        assert!(validate_cooldown_hours(169).is_err());
        assert!(validate_response_window_hours(0).is_err());
        assert!(validate_response_window_hours(24).is_ok());
    }

    #[test]
    fn bot_ids_are_comma_separated() {
        assert_eq!(parse_id_list(" bot-1, ,bot-2 "), vec!["bot-1", "bot-2"]);
        assert!(parse_id_list("").is_empty());
    }
}
