//! The challenge ledger. Status changes are conditional updates: the caller
//! names the statuses it expects and learns whether the row actually moved.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;

use super::models::{Challenge, ChallengeId, ChallengeStatus, PlayerId, from_millis, to_millis};

const CHALLENGE_COLUMNS: &str = "id, challenger_id, defender_id, defender_rank, status, created_at, \
    expires_at, message_ref, thread_ref, last_reminder_at, pending_result_id, pending_correction_id";

#[derive(Debug, Clone)]
pub struct NewChallenge<'a> {
    pub challenger_id: &'a str,
    pub defender_id: &'a str,
    pub defender_rank: u8,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn parse_challenge_row(row: &rusqlite::Row) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: row.get(0)?,
        challenger_id: row.get(1)?,
        defender_id: row.get(2)?,
        defender_rank: row.get(3)?,
        status: row.get(4)?,
        created_at: from_millis(row.get(5)?),
        expires_at: from_millis(row.get(6)?),
        message_ref: row.get(7)?,
        thread_ref: row.get(8)?,
        last_reminder_at: row.get::<_, Option<i64>>(9)?.map(from_millis),
        pending_result_id: row.get(10)?,
        pending_correction_id: row.get(11)?,
    })
}

fn status_list(statuses: &[ChallengeStatus]) -> String {
    statuses
        .iter()
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn query_challenges(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Challenge>> {
    let sql = format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE {filter} ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, parse_challenge_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query challenges")?;

    Ok(rows)
}

pub fn create(conn: &Connection, new: &NewChallenge) -> Result<Challenge> {
    let sql = format!(
        "INSERT INTO challenges (challenger_id, defender_id, defender_rank, status, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING {CHALLENGE_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![
            new.challenger_id,
            new.defender_id,
            new.defender_rank,
            ChallengeStatus::Pending,
            to_millis(new.created_at),
            to_millis(new.expires_at),
        ],
        parse_challenge_row,
    )
    .context("Failed to insert challenge")
}

pub fn find(conn: &Connection, id: ChallengeId) -> Result<Option<Challenge>> {
    let sql = format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1");

    conn.query_row(&sql, params![id], parse_challenge_row)
        .optional()
        .with_context(|| format!("Failed to query challenge {id}"))
}

/// The pending or accepted challenge the player takes part in, if any.
pub fn active_for(conn: &Connection, player_id: &str) -> Result<Option<Challenge>> {
    let filter = format!(
        "status IN ({}) AND (challenger_id = ?1 OR defender_id = ?1)",
        status_list(&ChallengeStatus::ACTIVE)
    );
    Ok(query_challenges(conn, &filter, params![player_id])?
        .into_iter()
        .next())
}

pub fn has_active(conn: &Connection, player_id: &str) -> Result<bool> {
    Ok(active_for(conn, player_id)?.is_some())
}

/// Everyone currently tied up in a pending or accepted challenge.
pub fn busy_players(conn: &Connection) -> Result<HashSet<PlayerId>> {
    let filter = format!("status IN ({})", status_list(&ChallengeStatus::ACTIVE));
    Ok(query_challenges(conn, &filter, params![])?
        .into_iter()
        .flat_map(|c| [c.challenger_id, c.defender_id])
        .collect())
}

pub fn with_status(conn: &Connection, statuses: &[ChallengeStatus]) -> Result<Vec<Challenge>> {
    let filter = format!("status IN ({})", status_list(statuses));
    query_challenges(conn, &filter, params![])
}

/// Moves the challenge to `to` only if it is currently in one of `from`.
/// Returns false when another actor got there first.
pub fn transition(
    conn: &Connection,
    id: ChallengeId,
    from: &[ChallengeStatus],
    to: ChallengeStatus,
) -> Result<bool> {
    let allowed: Vec<ChallengeStatus> = from
        .iter()
        .copied()
        .filter(|status| status.can_transition_to(to))
        .collect();
    if allowed.is_empty() {
        return Ok(false);
    }

    let sql = format!(
        "UPDATE challenges SET status = ?1 WHERE id = ?2 AND status IN ({})",
        status_list(&allowed)
    );
    let changed = conn
        .execute(&sql, params![to, id])
        .with_context(|| format!("Failed to move challenge {id} to {to}"))?;

    Ok(changed == 1)
}

pub fn expired_pending(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Challenge>> {
    query_challenges(
        conn,
        "status = 'pending' AND expires_at <= ?1",
        params![to_millis(now)],
    )
}

/// Accepted challenges still waiting for a score that were never nagged, or
/// whose last nag is older than `cutoff`.
pub fn awaiting_result(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<Challenge>> {
    query_challenges(
        conn,
        "status = 'accepted' AND pending_result_id IS NULL
             AND (last_reminder_at IS NULL OR last_reminder_at <= ?1)",
        params![to_millis(cutoff)],
    )
}

pub fn awaiting_review(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<Challenge>> {
    query_challenges(
        conn,
        "status = 'disputed' AND (last_reminder_at IS NULL OR last_reminder_at <= ?1)",
        params![to_millis(cutoff)],
    )
}

pub fn touch_reminder(conn: &Connection, id: ChallengeId, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET last_reminder_at = ?1 WHERE id = ?2",
        params![to_millis(now), id],
    )
    .with_context(|| format!("Failed to stamp reminder on challenge {id}"))?;
    Ok(())
}

pub fn set_pending_result(conn: &Connection, id: ChallengeId, result_id: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET pending_result_id = ?1 WHERE id = ?2",
        params![result_id, id],
    )
    .with_context(|| format!("Failed to link result to challenge {id}"))?;
    Ok(())
}

pub fn set_pending_correction(
    conn: &Connection,
    id: ChallengeId,
    correction_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET pending_correction_id = ?1 WHERE id = ?2",
        params![correction_id, id],
    )
    .with_context(|| format!("Failed to link correction to challenge {id}"))?;
    Ok(())
}

pub fn set_message_ref(conn: &Connection, id: ChallengeId, message_ref: &str) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET message_ref = ?1 WHERE id = ?2",
        params![message_ref, id],
    )
    .with_context(|| format!("Failed to store message handle for challenge {id}"))?;
    Ok(())
}

pub fn set_thread_ref(conn: &Connection, id: ChallengeId, thread_ref: &str) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET thread_ref = ?1 WHERE id = ?2",
        params![thread_ref, id],
    )
    .with_context(|| format!("Failed to store thread handle for challenge {id}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::players;
    use crate::database::setup::init_schema;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        from_millis(1_700_000_000_000)
    }

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        for id in ["a", "b", "c"] {
            players::ensure(&conn, id, 1200).unwrap();
        }
        conn
    }

    fn open(conn: &Connection, challenger: &str, defender: &str) -> Challenge {
        create(
            conn,
            &NewChallenge {
                challenger_id: challenger,
                defender_id: defender,
                defender_rank: 5,
                created_at: now(),
                expires_at: now() + Duration::hours(12),
            },
        )
        .unwrap()
    }

    #[test]
    fn created_challenge_is_pending_and_active() {
        let conn = conn();
        let challenge = open(&conn, "a", "b");

        assert_eq!(challenge.status, ChallengeStatus::Pending);
        assert_eq!(find(&conn, challenge.id).unwrap(), Some(challenge.clone()));
        assert_eq!(active_for(&conn, "b").unwrap().map(|c| c.id), Some(challenge.id));
        assert!(!has_active(&conn, "c").unwrap());
        assert_eq!(
            busy_players(&conn).unwrap(),
            HashSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn transition_is_conditional() {
        let conn = conn();
        let challenge = open(&conn, "a", "b");

        assert!(transition(&conn, challenge.id, &[ChallengeStatus::Pending], ChallengeStatus::Accepted).unwrap());
        assert!(!transition(&conn, challenge.id, &[ChallengeStatus::Pending], ChallengeStatus::Expired).unwrap());
        assert!(!transition(&conn, challenge.id, &[ChallengeStatus::Accepted], ChallengeStatus::Expired).unwrap());
        assert!(transition(&conn, challenge.id, &ChallengeStatus::ACTIVE, ChallengeStatus::Cancelled).unwrap());

        let stored = find(&conn, challenge.id).unwrap().unwrap();
        assert_eq!(stored.status, ChallengeStatus::Cancelled);
        assert!(!has_active(&conn, "a").unwrap());
    }

    #[test]
    fn sweeps_find_due_records() {
        let conn = conn();
        let pending = open(&conn, "a", "b");
        let accepted = open(&conn, "c", "a");
        transition(&conn, accepted.id, &[ChallengeStatus::Pending], ChallengeStatus::Accepted).unwrap();

        assert!(expired_pending(&conn, now()).unwrap().is_empty());
        let due = expired_pending(&conn, now() + Duration::hours(12)).unwrap();
        assert_eq!(due.iter().map(|c| c.id).collect::<Vec<_>>(), vec![pending.id]);

        let before_creation = now() - Duration::hours(1);
        assert_eq!(awaiting_result(&conn, before_creation).unwrap().len(), 1);

        let stamped = now() + Duration::minutes(1);
        touch_reminder(&conn, accepted.id, stamped).unwrap();
        assert!(awaiting_result(&conn, stamped - Duration::seconds(1)).unwrap().is_empty());
        assert_eq!(awaiting_result(&conn, stamped).unwrap().len(), 1);
    }

    #[test]
    fn disputed_challenges_are_due_for_review_until_nagged() {
        let conn = conn();
        let challenge = open(&conn, "a", "b");
        transition(&conn, challenge.id, &[ChallengeStatus::Pending], ChallengeStatus::Accepted).unwrap();
        transition(&conn, challenge.id, &[ChallengeStatus::Accepted], ChallengeStatus::Disputed).unwrap();

        assert_eq!(awaiting_review(&conn, now() - Duration::hours(1)).unwrap().len(), 1);
        assert!(awaiting_result(&conn, now()).unwrap().is_empty());

        touch_reminder(&conn, challenge.id, now()).unwrap();
        assert!(awaiting_review(&conn, now() - Duration::minutes(30)).unwrap().is_empty());
    }
}
