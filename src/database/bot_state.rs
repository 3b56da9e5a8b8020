//! Opaque key/value bookkeeping: runtime setting overrides and channel handles.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::fmt;

pub const COOLDOWN_HOURS_KEY: &str = "setting_cooldown_hours";
pub const RESPONSE_WINDOW_HOURS_KEY: &str = "setting_response_window_hours";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "camelCase")]
pub enum ChannelKey {
    Leaderboard,
    ChallengePanel,
    Request,
    Logs,
    Admin,
    Disputes,
}

impl ChannelKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKey::Leaderboard => "leaderboard",
            ChannelKey::ChallengePanel => "challengePanel",
            ChannelKey::Request => "request",
            ChannelKey::Logs => "logs",
            ChannelKey::Admin => "admin",
            ChannelKey::Disputes => "disputes",
        }
    }

    fn state_key(&self) -> String {
        format!("channel_{}", self.as_str())
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM bot_state WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("Failed to read bot state {key}"))
}

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO bot_state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .with_context(|| format!("Failed to write bot state {key}"))?;
    Ok(())
}

pub fn remove(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM bot_state WHERE key = ?1", params![key])
        .with_context(|| format!("Failed to delete bot state {key}"))?;
    Ok(())
}

pub fn get_channel(conn: &Connection, channel: ChannelKey) -> Result<Option<String>> {
    get(conn, &channel.state_key())
}

pub fn set_channel(conn: &Connection, channel: ChannelKey, handle: &str) -> Result<()> {
    set(conn, &channel.state_key(), handle)
}
