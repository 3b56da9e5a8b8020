//! The ranking store. Rank moves keep `rank` unique at every statement by
//! parking the rows being moved on negative ranks before flipping them back.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::connection::atomically;
use super::models::{Player, PlayerChanges, Rank, from_millis, to_millis};
use crate::rating::{EloConfig, EloUpdate, rate_match};

const PLAYER_COLUMNS: &str = "player_id, rank, cooldown_until, wins, losses, win_streak, \
    best_win_streak, loss_streak, title_defenses, title_takes, perfect_matches, comeback_wins, \
    highest_rank, rank_since, total_points, total_points_conceded, dm_notifications, elo";

/// Integer columns bumped by the completion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Wins,
    Losses,
    TitleDefenses,
    TitleTakes,
    PerfectMatches,
    ComebackWins,
}

impl Counter {
    fn column(&self) -> &'static str {
        match self {
            Counter::Wins => "wins",
            Counter::Losses => "losses",
            Counter::TitleDefenses => "title_defenses",
            Counter::TitleTakes => "title_takes",
            Counter::PerfectMatches => "perfect_matches",
            Counter::ComebackWins => "comeback_wins",
        }
    }
}

fn parse_player_row(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    Ok(Player {
        player_id: row.get(0)?,
        rank: row.get(1)?,
        cooldown_until: row.get::<_, Option<i64>>(2)?.map(from_millis),
        wins: row.get(3)?,
        losses: row.get(4)?,
        win_streak: row.get(5)?,
        best_win_streak: row.get(6)?,
        loss_streak: row.get(7)?,
        title_defenses: row.get(8)?,
        title_takes: row.get(9)?,
        perfect_matches: row.get(10)?,
        comeback_wins: row.get(11)?,
        highest_rank: row.get(12)?,
        rank_since: row.get::<_, Option<i64>>(13)?.map(from_millis),
        total_points_scored: row.get(14)?,
        total_points_conceded: row.get(15)?,
        dm_notifications_enabled: row.get(16)?,
        elo: row.get(17)?,
    })
}

pub fn find(conn: &Connection, player_id: &str) -> Result<Option<Player>> {
    let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE player_id = ?1");

    conn.query_row(&sql, params![player_id], parse_player_row)
        .optional()
        .with_context(|| format!("Failed to query player {player_id}"))
}

/// Stored state, or the unranked default for an identity never seen before.
pub fn get_or_default(conn: &Connection, player_id: &str) -> Result<Player> {
    Ok(find(conn, player_id)?.unwrap_or_else(|| Player::unranked(player_id)))
}

pub fn find_by_rank(conn: &Connection, rank: Rank) -> Result<Option<Player>> {
    let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE rank = ?1");

    conn.query_row(&sql, params![rank], parse_player_row)
        .optional()
        .with_context(|| format!("Failed to query player at rank {rank}"))
}

pub fn ranked(conn: &Connection) -> Result<Vec<Player>> {
    let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE rank IS NOT NULL ORDER BY rank");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], parse_player_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list ranked players")?;

    Ok(rows)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Player>> {
    let sql = format!("SELECT {PLAYER_COLUMNS} FROM players ORDER BY rank IS NULL, rank, player_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], parse_player_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list players")?;

    Ok(rows)
}

/// Creates the row with default stats if it does not exist yet.
pub fn ensure(conn: &Connection, player_id: &str, starting_elo: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO players (player_id, elo) VALUES (?1, ?2)",
        params![player_id, starting_elo],
    )
    .with_context(|| format!("Failed to create player {player_id}"))?;
    Ok(())
}

pub fn upsert(
    conn: &Connection,
    player_id: &str,
    changes: &PlayerChanges,
    now: DateTime<Utc>,
) -> Result<Player> {
    atomically(conn, "player_upsert", |conn| {
        ensure(conn, player_id, Player::unranked(player_id).elo)?;
        let current = get_or_default(conn, player_id)?;

        match changes.rank {
            Some(rank) if rank == current.rank => {}
            Some(Some(rank)) => assign_rank(conn, player_id, rank, now)?,
            Some(None) => clear_rank(conn, player_id)?,
            None => {}
        }
        if let Some(until) = changes.cooldown_until {
            set_cooldown(conn, player_id, until)?;
        }
        if let Some(wins) = changes.wins {
            conn.execute(
                "UPDATE players SET wins = ?1 WHERE player_id = ?2",
                params![wins, player_id],
            )?;
        }
        if let Some(losses) = changes.losses {
            conn.execute(
                "UPDATE players SET losses = ?1 WHERE player_id = ?2",
                params![losses, player_id],
            )?;
        }
        if let Some(enabled) = changes.dm_notifications_enabled {
            conn.execute(
                "UPDATE players SET dm_notifications = ?1 WHERE player_id = ?2",
                params![enabled, player_id],
            )?;
        }
        if let Some(elo) = changes.elo {
            conn.execute(
                "UPDATE players SET elo = ?1 WHERE player_id = ?2",
                params![elo, player_id],
            )?;
        }

        get_or_default(conn, player_id)
    })
}

/// Puts the player on `rank`, stamping `rank_since` and improving `highest_rank`.
fn assign_rank(conn: &Connection, player_id: &str, rank: Rank, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE players SET rank = ?1, rank_since = ?2,
             highest_rank = CASE WHEN highest_rank IS NULL OR highest_rank > ?1 THEN ?1 ELSE highest_rank END
         WHERE player_id = ?3",
        params![rank, to_millis(now), player_id],
    )
    .with_context(|| format!("Failed to assign rank {rank} to {player_id}"))?;
    Ok(())
}

fn clear_rank(conn: &Connection, player_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE players SET rank = NULL, rank_since = NULL WHERE player_id = ?1",
        params![player_id],
    )
    .with_context(|| format!("Failed to clear rank of {player_id}"))?;
    Ok(())
}

/// Flips every parked (negative) rank back to positive as a fresh rank change.
fn restore_parked_ranks(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    conn.execute(
        "UPDATE players SET rank = -rank, rank_since = ?1,
             highest_rank = CASE WHEN highest_rank IS NULL OR highest_rank > -rank THEN -rank ELSE highest_rank END
         WHERE rank < 0",
        params![to_millis(now)],
    )
    .context("Failed to restore shifted ranks")
}

pub fn set_cooldown(
    conn: &Connection,
    player_id: &str,
    until: Option<DateTime<Utc>>,
) -> Result<()> {
    conn.execute(
        "UPDATE players SET cooldown_until = ?1 WHERE player_id = ?2",
        params![until.map(to_millis), player_id],
    )
    .with_context(|| format!("Failed to set cooldown for {player_id}"))?;
    Ok(())
}

pub fn is_on_cooldown(conn: &Connection, player_id: &str, now: DateTime<Utc>) -> Result<bool> {
    Ok(find(conn, player_id)?.is_some_and(|player| player.is_on_cooldown(now)))
}

/// Cooldown expiry instants that are still ahead of `now`.
pub fn future_cooldowns(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
    let mut stmt = conn.prepare(
        "SELECT cooldown_until FROM players WHERE cooldown_until > ?1 ORDER BY cooldown_until",
    )?;
    let rows = stmt
        .query_map(params![to_millis(now)], |row| row.get::<_, i64>(0))?
        .map(|millis| millis.map(from_millis))
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list active cooldowns")?;

    Ok(rows)
}

/// Moves the winner onto the loser's rank. An unranked loser, or a winner who
/// already sits higher, leaves the ladder untouched.
pub fn swap_ranks(
    conn: &Connection,
    winner_id: &str,
    loser_id: &str,
    max_rank: Rank,
    now: DateTime<Utc>,
) -> Result<()> {
    let Some(loser_rank) = get_or_default(conn, loser_id)?.rank else {
        return Ok(());
    };
    let winner_rank = get_or_default(conn, winner_id)?.rank;

    match winner_rank {
        Some(winner_rank) if winner_rank <= loser_rank => Ok(()),
        Some(winner_rank) => atomically(conn, "swap_ranks", |conn| {
            clear_rank(conn, winner_id)?;
            assign_rank(conn, loser_id, winner_rank, now)?;
            assign_rank(conn, winner_id, loser_rank, now)?;
            log::debug!("Exchanged ranks {loser_rank} and {winner_rank} between {winner_id} and {loser_id}");
            Ok(())
        }),
        None => atomically(conn, "shift_down", |conn| {
            conn.execute(
                "UPDATE players SET rank = -(rank + 1) WHERE rank >= ?1",
                params![loser_rank],
            )
            .context("Failed to park displaced ranks")?;
            let dropped = conn
                .execute(
                    "UPDATE players SET rank = NULL, rank_since = NULL WHERE rank < -?1",
                    params![max_rank],
                )
                .context("Failed to drop players pushed off the ladder")?;
            let shifted = restore_parked_ranks(conn, now)?;
            assign_rank(conn, winner_id, loser_rank, now)?;
            log::debug!(
                "{winner_id} entered at rank {loser_rank}; {shifted} shifted down, {dropped} dropped off"
            );
            Ok(())
        }),
    }
}

/// Clears the player's rank and moves everyone below up one place.
/// Returns the rank that was freed, if any.
pub fn remove_rank_and_shift_up(
    conn: &Connection,
    player_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Rank>> {
    let Some(removed) = get_or_default(conn, player_id)?.rank else {
        return Ok(None);
    };

    atomically(conn, "shift_up", |conn| {
        clear_rank(conn, player_id)?;
        conn.execute(
            "UPDATE players SET rank = -(rank - 1) WHERE rank > ?1",
            params![removed],
        )
        .context("Failed to park ranks below the removed one")?;
        restore_parked_ranks(conn, now)?;
        Ok(Some(removed))
    })
}

pub fn increment(conn: &Connection, player_id: &str, counter: Counter) -> Result<()> {
    let column = counter.column();
    conn.execute(
        &format!("UPDATE players SET {column} = {column} + 1 WHERE player_id = ?1"),
        params![player_id],
    )
    .with_context(|| format!("Failed to increment {column} for {player_id}"))?;
    Ok(())
}

pub fn record_win(conn: &Connection, player_id: &str) -> Result<()> {
    increment(conn, player_id, Counter::Wins)
}

pub fn record_loss(conn: &Connection, player_id: &str) -> Result<()> {
    increment(conn, player_id, Counter::Losses)
}

pub fn update_win_streak(conn: &Connection, player_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE players SET win_streak = win_streak + 1,
             best_win_streak = MAX(best_win_streak, win_streak + 1),
             loss_streak = 0
         WHERE player_id = ?1",
        params![player_id],
    )
    .with_context(|| format!("Failed to update win streak for {player_id}"))?;
    Ok(())
}

pub fn update_loss_streak(conn: &Connection, player_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE players SET loss_streak = loss_streak + 1, win_streak = 0 WHERE player_id = ?1",
        params![player_id],
    )
    .with_context(|| format!("Failed to update loss streak for {player_id}"))?;
    Ok(())
}

pub fn add_points(conn: &Connection, player_id: &str, scored: i64, conceded: i64) -> Result<()> {
    conn.execute(
        "UPDATE players SET total_points = total_points + ?1,
             total_points_conceded = total_points_conceded + ?2
         WHERE player_id = ?3",
        params![scored, conceded, player_id],
    )
    .with_context(|| format!("Failed to add points for {player_id}"))?;
    Ok(())
}

pub fn update_elo(
    conn: &Connection,
    winner_id: &str,
    loser_id: &str,
    config: &EloConfig,
    starting_elo: i64,
) -> Result<EloUpdate> {
    ensure(conn, winner_id, starting_elo)?;
    ensure(conn, loser_id, starting_elo)?;

    let winner = get_or_default(conn, winner_id)?;
    let loser = get_or_default(conn, loser_id)?;
    let update = rate_match(winner.elo, loser.elo, config);

    let mut stmt = conn.prepare("UPDATE players SET elo = ?1 WHERE player_id = ?2")?;
    stmt.execute(params![update.winner_after, winner_id])
        .with_context(|| format!("Failed to update elo for {winner_id}"))?;
    stmt.execute(params![update.loser_after, loser_id])
        .with_context(|| format!("Failed to update elo for {loser_id}"))?;

    Ok(update)
}

pub fn toggle_dm_notifications(conn: &Connection, player_id: &str, starting_elo: i64) -> Result<bool> {
    ensure(conn, player_id, starting_elo)?;
    conn.query_row(
        "UPDATE players SET dm_notifications = 1 - dm_notifications WHERE player_id = ?1
         RETURNING dm_notifications",
        params![player_id],
        |row| row.get(0),
    )
    .with_context(|| format!("Failed to toggle notifications for {player_id}"))
}
