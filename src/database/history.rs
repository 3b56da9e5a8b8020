//! Append-only per-player match records. Rows are never updated.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::{
    ChallengeId, HeadToHead, HistoryEntry, MatchOutcome, OpponentRecord, Rivalry, from_millis,
    to_millis,
};

const HISTORY_COLUMNS: &str = "player_id, opponent_id, result, was_challenger, sets_won, sets_lost, \
    points_scored, points_conceded, was_comeback, was_perfect, rank_before, rank_after, match_date, \
    challenge_id";

fn parse_history_row(row: &rusqlite::Row) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        player_id: row.get(0)?,
        opponent_id: row.get(1)?,
        result: row.get(2)?,
        was_challenger: row.get(3)?,
        sets_won: row.get(4)?,
        sets_lost: row.get(5)?,
        points_scored: row.get(6)?,
        points_conceded: row.get(7)?,
        was_comeback: row.get(8)?,
        was_perfect: row.get(9)?,
        rank_before: row.get(10)?,
        rank_after: row.get(11)?,
        match_date: from_millis(row.get(12)?),
        challenge_id: row.get(13)?,
    })
}

pub fn append(conn: &Connection, entry: &HistoryEntry) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO match_history ({HISTORY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            entry.player_id,
            entry.opponent_id,
            entry.result,
            entry.was_challenger,
            entry.sets_won,
            entry.sets_lost,
            entry.points_scored,
            entry.points_conceded,
            entry.was_comeback,
            entry.was_perfect,
            entry.rank_before,
            entry.rank_after,
            to_millis(entry.match_date),
            entry.challenge_id,
        ],
    )
    .with_context(|| format!("Failed to record history for {}", entry.player_id))?;
    Ok(())
}

/// True once a completion has written its records for this challenge.
pub fn exists_for_challenge(conn: &Connection, challenge_id: ChallengeId) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM match_history WHERE challenge_id = ?1)",
        params![challenge_id],
        |row| row.get(0),
    )
    .with_context(|| format!("Failed to check history of challenge {challenge_id}"))
}

pub fn recent(conn: &Connection, player_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
    let sql = format!(
        "SELECT {HISTORY_COLUMNS} FROM match_history WHERE player_id = ?1
         ORDER BY match_date DESC, id DESC LIMIT ?2"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![player_id, limit as i64], parse_history_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to query recent matches of {player_id}"))?;

    Ok(rows)
}

pub fn recent_between(
    conn: &Connection,
    player_id: &str,
    opponent_id: &str,
    limit: usize,
) -> Result<Vec<HistoryEntry>> {
    let sql = format!(
        "SELECT {HISTORY_COLUMNS} FROM match_history WHERE player_id = ?1 AND opponent_id = ?2
         ORDER BY match_date DESC, id DESC LIMIT ?3"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![player_id, opponent_id, limit as i64], parse_history_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to query matches between {player_id} and {opponent_id}"))?;

    Ok(rows)
}

/// Latest results first, e.g. `[Win, Win, Loss]`.
pub fn form_guide(conn: &Connection, player_id: &str, limit: usize) -> Result<Vec<MatchOutcome>> {
    let mut stmt = conn.prepare(
        "SELECT result FROM match_history WHERE player_id = ?1
         ORDER BY match_date DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![player_id, limit as i64], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to query form of {player_id}"))?;

    Ok(rows)
}

pub fn head_to_head(conn: &Connection, player_id: &str, opponent_id: &str) -> Result<HeadToHead> {
    conn.query_row(
        "SELECT
             COALESCE(SUM(CASE WHEN result = 'W' THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN result = 'L' THEN 1 ELSE 0 END), 0)
         FROM match_history WHERE player_id = ?1 AND opponent_id = ?2",
        params![player_id, opponent_id],
        |row| {
            Ok(HeadToHead {
                wins: row.get(0)?,
                losses: row.get(1)?,
            })
        },
    )
    .with_context(|| format!("Failed to query head-to-head {player_id} vs {opponent_id}"))
}

pub fn all_head_to_head(conn: &Connection, player_id: &str) -> Result<Vec<OpponentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT opponent_id,
             SUM(CASE WHEN result = 'W' THEN 1 ELSE 0 END),
             SUM(CASE WHEN result = 'L' THEN 1 ELSE 0 END)
         FROM match_history WHERE player_id = ?1
         GROUP BY opponent_id
         ORDER BY COUNT(*) DESC, opponent_id",
    )?;
    let rows = stmt
        .query_map(params![player_id], |row| {
            Ok(OpponentRecord {
                opponent_id: row.get(0)?,
                wins: row.get(1)?,
                losses: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to query opponents of {player_id}"))?;

    Ok(rows)
}

fn most_frequent(conn: &Connection, player_id: &str, outcome: MatchOutcome) -> Result<Option<Rivalry>> {
    conn.query_row(
        "SELECT opponent_id, COUNT(*) AS n FROM match_history
         WHERE player_id = ?1 AND result = ?2
         GROUP BY opponent_id
         ORDER BY n DESC, MAX(match_date) DESC
         LIMIT 1",
        params![player_id, outcome],
        |row| {
            Ok(Rivalry {
                opponent_id: row.get(0)?,
                count: row.get(1)?,
            })
        },
    )
    .optional()
    .with_context(|| format!("Failed to query rivalries of {player_id}"))
}

/// The opponent who has beaten the player most often.
pub fn nemesis(conn: &Connection, player_id: &str) -> Result<Option<Rivalry>> {
    most_frequent(conn, player_id, MatchOutcome::Loss)
}

/// The opponent the player has beaten most often.
pub fn victim(conn: &Connection, player_id: &str) -> Result<Option<Rivalry>> {
    most_frequent(conn, player_id, MatchOutcome::Win)
}
