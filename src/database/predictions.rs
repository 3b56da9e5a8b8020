use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::{ChallengeId, Prediction, PredictionStats, from_millis, to_millis};

fn parse_prediction_row(row: &rusqlite::Row) -> rusqlite::Result<Prediction> {
    Ok(Prediction {
        challenge_id: row.get(0)?,
        user_id: row.get(1)?,
        predicted_winner_id: row.get(2)?,
        correct: row.get(3)?,
        created_at: from_millis(row.get(4)?),
    })
}

/// A later prediction by the same user replaces the earlier one.
pub fn upsert(
    conn: &Connection,
    challenge_id: ChallengeId,
    user_id: &str,
    predicted_winner_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO predictions (challenge_id, user_id, predicted_winner_id, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(challenge_id, user_id) DO UPDATE SET
             predicted_winner_id = excluded.predicted_winner_id,
             created_at = excluded.created_at",
        params![challenge_id, user_id, predicted_winner_id, to_millis(now)],
    )
    .with_context(|| format!("Failed to store prediction of {user_id} on challenge {challenge_id}"))?;
    Ok(())
}

pub fn for_challenge(conn: &Connection, challenge_id: ChallengeId) -> Result<Vec<Prediction>> {
    let mut stmt = conn.prepare(
        "SELECT challenge_id, user_id, predicted_winner_id, correct, created_at
         FROM predictions WHERE challenge_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![challenge_id], parse_prediction_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to list predictions for challenge {challenge_id}"))?;

    Ok(rows)
}

pub fn find(conn: &Connection, challenge_id: ChallengeId, user_id: &str) -> Result<Option<Prediction>> {
    conn.query_row(
        "SELECT challenge_id, user_id, predicted_winner_id, correct, created_at
         FROM predictions WHERE challenge_id = ?1 AND user_id = ?2",
        params![challenge_id, user_id],
        parse_prediction_row,
    )
    .optional()
    .with_context(|| format!("Failed to query prediction of {user_id}"))
}

/// Marks every prediction on the challenge right or wrong. Returns how many were resolved.
pub fn resolve(conn: &Connection, challenge_id: ChallengeId, winner_id: &str) -> Result<usize> {
    conn.execute(
        "UPDATE predictions SET correct = (predicted_winner_id = ?1) WHERE challenge_id = ?2",
        params![winner_id, challenge_id],
    )
    .with_context(|| format!("Failed to resolve predictions for challenge {challenge_id}"))
}

pub fn stats(conn: &Connection, user_id: &str) -> Result<PredictionStats> {
    conn.query_row(
        "SELECT COUNT(*),
             COALESCE(SUM(CASE WHEN correct = 1 THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN correct = 0 THEN 1 ELSE 0 END), 0)
         FROM predictions WHERE user_id = ?1 AND correct IS NOT NULL",
        params![user_id],
        |row| {
            Ok(PredictionStats {
                total: row.get(0)?,
                correct: row.get(1)?,
                incorrect: row.get(2)?,
            })
        },
    )
    .with_context(|| format!("Failed to query prediction stats of {user_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::challenges::{self, NewChallenge};
    use crate::database::players;
    use crate::database::setup::init_schema;
    use chrono::Duration;

    #[test]
    fn later_prediction_overwrites_and_resolves() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let now = from_millis(1_700_000_000_000);
        players::ensure(&conn, "a", 1200).unwrap();
        players::ensure(&conn, "b", 1200).unwrap();
        let challenge = challenges::create(
            &conn,
            &NewChallenge {
                challenger_id: "a",
                defender_id: "b",
                defender_rank: 1,
                created_at: now,
                expires_at: now + Duration::hours(1),
            },
        )
        .unwrap();

        upsert(&conn, challenge.id, "fan", "a", now).unwrap();
        upsert(&conn, challenge.id, "fan", "b", now).unwrap();
        upsert(&conn, challenge.id, "critic", "a", now).unwrap();
        assert_eq!(for_challenge(&conn, challenge.id).unwrap().len(), 2);
        assert_eq!(stats(&conn, "fan").unwrap(), PredictionStats::default());

        assert_eq!(resolve(&conn, challenge.id, "b").unwrap(), 2);

        let fan = find(&conn, challenge.id, "fan").unwrap().unwrap();
        assert_eq!(fan.predicted_winner_id, "b");
        assert_eq!(fan.correct, Some(true));
        assert_eq!(
            stats(&conn, "critic").unwrap(),
            PredictionStats { total: 1, correct: 0, incorrect: 1 }
        );
    }
}
