use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::challenges;
use super::models::{ChallengeId, CorrectionStatus, ScoreCorrection, from_millis, to_millis};
use super::results::{scores_from_json, scores_to_json};
use crate::domain::scores::SetScore;

const CORRECTION_COLUMNS: &str = "id, challenge_id, requested_by, proposed_scores, \
    proposed_winner_id, approved_by, status, created_at";

#[derive(Debug, Clone)]
pub struct NewCorrection<'a> {
    pub challenge_id: ChallengeId,
    pub requested_by: &'a str,
    pub proposed_scores: &'a [SetScore],
    pub proposed_winner_id: &'a str,
    pub created_at: DateTime<Utc>,
}

fn parse_correction_row(row: &rusqlite::Row) -> rusqlite::Result<ScoreCorrection> {
    Ok(ScoreCorrection {
        id: row.get(0)?,
        challenge_id: row.get(1)?,
        requested_by: row.get(2)?,
        proposed_scores: scores_from_json(&row.get::<_, String>(3)?)?,
        proposed_winner_id: row.get(4)?,
        approved_by: row.get(5)?,
        status: row.get(6)?,
        created_at: from_millis(row.get(7)?),
    })
}

/// Stores the request and makes it the challenge's pending correction.
pub fn create(conn: &Connection, new: &NewCorrection) -> Result<ScoreCorrection> {
    let sql = format!(
        "INSERT INTO score_corrections
             (challenge_id, requested_by, proposed_scores, proposed_winner_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING {CORRECTION_COLUMNS}"
    );

    let correction = conn
        .query_row(
            &sql,
            params![
                new.challenge_id,
                new.requested_by,
                scores_to_json(new.proposed_scores)?,
                new.proposed_winner_id,
                CorrectionStatus::Pending,
                to_millis(new.created_at),
            ],
            parse_correction_row,
        )
        .with_context(|| format!("Failed to store correction for challenge {}", new.challenge_id))?;

    challenges::set_pending_correction(conn, new.challenge_id, Some(correction.id))?;
    Ok(correction)
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<ScoreCorrection>> {
    let sql = format!("SELECT {CORRECTION_COLUMNS} FROM score_corrections WHERE id = ?1");

    conn.query_row(&sql, params![id], parse_correction_row)
        .optional()
        .with_context(|| format!("Failed to query correction {id}"))
}

pub fn pending(conn: &Connection) -> Result<Vec<ScoreCorrection>> {
    let sql = format!(
        "SELECT {CORRECTION_COLUMNS} FROM score_corrections WHERE status = 'pending' ORDER BY id"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], parse_correction_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list pending corrections")?;

    Ok(rows)
}

/// Approves or rejects a pending correction. Returns false if it was already resolved.
pub fn resolve(
    conn: &Connection,
    correction: &ScoreCorrection,
    outcome: CorrectionStatus,
    resolved_by: &str,
) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE score_corrections SET status = ?1, approved_by = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![outcome, resolved_by, correction.id],
        )
        .with_context(|| format!("Failed to resolve correction {}", correction.id))?;

    if changed == 1 {
        challenges::set_pending_correction(conn, correction.challenge_id, None)?;
    }
    Ok(changed == 1)
}
