//! Submitted match results waiting for the defender's confirmation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::challenges;
use super::models::{ChallengeId, MatchResult, from_millis, to_millis};
use crate::domain::scores::SetScore;

const RESULT_COLUMNS: &str = "id, challenge_id, submitted_by, winner_id, loser_id, sets_winner, \
    sets_loser, scores, confirmed, disputed, created_at, last_reminder_at";

#[derive(Debug, Clone)]
pub struct NewResult<'a> {
    pub challenge_id: ChallengeId,
    pub submitted_by: &'a str,
    pub winner_id: &'a str,
    pub loser_id: &'a str,
    pub sets_winner: u8,
    pub sets_loser: u8,
    pub scores: &'a [SetScore],
    pub created_at: DateTime<Utc>,
}

pub(crate) fn scores_to_json(scores: &[SetScore]) -> Result<String> {
    serde_json::to_string(scores).context("Failed to encode set scores")
}

pub(crate) fn scores_from_json(raw: &str) -> rusqlite::Result<Vec<SetScore>> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_result_row(row: &rusqlite::Row) -> rusqlite::Result<MatchResult> {
    Ok(MatchResult {
        id: row.get(0)?,
        challenge_id: row.get(1)?,
        submitted_by: row.get(2)?,
        winner_id: row.get(3)?,
        loser_id: row.get(4)?,
        sets_winner: row.get(5)?,
        sets_loser: row.get(6)?,
        scores: scores_from_json(&row.get::<_, String>(7)?)?,
        confirmed: row.get(8)?,
        disputed: row.get(9)?,
        created_at: from_millis(row.get(10)?),
        last_reminder_at: row.get::<_, Option<i64>>(11)?.map(from_millis),
    })
}

/// Stores the result and makes it the challenge's pending result.
pub fn submit(conn: &Connection, new: &NewResult) -> Result<MatchResult> {
    let sql = format!(
        "INSERT INTO match_results
             (challenge_id, submitted_by, winner_id, loser_id, sets_winner, sets_loser, scores, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         RETURNING {RESULT_COLUMNS}"
    );

    let result = conn
        .query_row(
            &sql,
            params![
                new.challenge_id,
                new.submitted_by,
                new.winner_id,
                new.loser_id,
                new.sets_winner,
                new.sets_loser,
                scores_to_json(new.scores)?,
                to_millis(new.created_at),
            ],
            parse_result_row,
        )
        .with_context(|| format!("Failed to store result for challenge {}", new.challenge_id))?;

    challenges::set_pending_result(conn, new.challenge_id, Some(result.id))?;
    Ok(result)
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<MatchResult>> {
    let sql = format!("SELECT {RESULT_COLUMNS} FROM match_results WHERE id = ?1");

    conn.query_row(&sql, params![id], parse_result_row)
        .optional()
        .with_context(|| format!("Failed to query result {id}"))
}

/// Most recent submission for the challenge, whatever its state.
pub fn latest_for(conn: &Connection, challenge_id: ChallengeId) -> Result<Option<MatchResult>> {
    let sql = format!(
        "SELECT {RESULT_COLUMNS} FROM match_results WHERE challenge_id = ?1 ORDER BY id DESC LIMIT 1"
    );

    conn.query_row(&sql, params![challenge_id], parse_result_row)
        .optional()
        .with_context(|| format!("Failed to query results of challenge {challenge_id}"))
}

fn settle(conn: &Connection, result: &MatchResult, column: &str) -> Result<bool> {
    let changed = conn
        .execute(
            &format!(
                "UPDATE match_results SET {column} = 1
                 WHERE id = ?1 AND confirmed = 0 AND disputed = 0"
            ),
            params![result.id],
        )
        .with_context(|| format!("Failed to mark result {} {column}", result.id))?;

    if changed == 1 {
        challenges::set_pending_result(conn, result.challenge_id, None)?;
    }
    Ok(changed == 1)
}

/// Returns false if the result was already confirmed or disputed.
pub fn confirm(conn: &Connection, result: &MatchResult) -> Result<bool> {
    settle(conn, result, "confirmed")
}

/// Returns false if the result was already confirmed or disputed.
pub fn dispute(conn: &Connection, result: &MatchResult) -> Result<bool> {
    settle(conn, result, "disputed")
}

/// Unsettled results on accepted challenges whose last nag is older than `cutoff`.
pub fn awaiting_confirmation(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<MatchResult>> {
    let columns = RESULT_COLUMNS
        .split(", ")
        .map(|column| format!("r.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {columns} FROM match_results r
         JOIN challenges c ON c.id = r.challenge_id
         WHERE r.confirmed = 0 AND r.disputed = 0 AND c.status = 'accepted'
             AND COALESCE(r.last_reminder_at, r.created_at) <= ?1
         ORDER BY r.id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![to_millis(cutoff)], parse_result_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query unconfirmed results")?;

    Ok(rows)
}

pub fn touch_reminder(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE match_results SET last_reminder_at = ?1 WHERE id = ?2",
        params![to_millis(now), id],
    )
    .with_context(|| format!("Failed to stamp reminder on result {id}"))?;
    Ok(())
}
