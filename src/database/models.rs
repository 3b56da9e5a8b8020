use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::scores::SetScore;

pub type PlayerId = String;
pub type ChallengeId = i64;
pub type Rank = u8;

pub(crate) fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub rank: Option<Rank>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub wins: i64,
    pub losses: i64,
    pub win_streak: i64,
    pub best_win_streak: i64,
    pub loss_streak: i64,
    pub title_defenses: i64,
    pub title_takes: i64,
    pub perfect_matches: i64,
    pub comeback_wins: i64,
    pub highest_rank: Option<Rank>,
    pub rank_since: Option<DateTime<Utc>>,
    pub total_points_scored: i64,
    pub total_points_conceded: i64,
    pub dm_notifications_enabled: bool,
    pub elo: i64,
}

impl Player {
    /// The state implied for an identity with no stored row.
    pub fn unranked(player_id: &str) -> Self {
        Self {
            player_id: player_id.to_string(),
            rank: None,
            cooldown_until: None,
            wins: 0,
            losses: 0,
            win_streak: 0,
            best_win_streak: 0,
            loss_streak: 0,
            title_defenses: 0,
            title_takes: 0,
            perfect_matches: 0,
            comeback_wins: 0,
            highest_rank: None,
            rank_since: None,
            total_points_scored: 0,
            total_points_conceded: 0,
            dm_notifications_enabled: false,
            elo: 1200,
        }
    }

    pub fn is_on_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    pub fn days_at_rank(&self, now: DateTime<Utc>) -> i64 {
        match (self.rank, self.rank_since) {
            (Some(_), Some(since)) => now.signed_duration_since(since).num_days().max(0),
            _ => 0,
        }
    }
}

/// Partial attributes for `players::upsert`. `None` leaves a field untouched;
/// `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct PlayerChanges {
    pub rank: Option<Option<Rank>>,
    pub cooldown_until: Option<Option<DateTime<Utc>>>,
    pub wins: Option<i64>,
    pub losses: Option<i64>,
    pub dm_notifications_enabled: Option<bool>,
    pub elo: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Completed,
    Disputed,
    Expired,
    Forfeited,
    Cancelled,
    Voided,
}

impl ChallengeStatus {
    pub const ACTIVE: [ChallengeStatus; 2] = [ChallengeStatus::Pending, ChallengeStatus::Accepted];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Accepted => "accepted",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Disputed => "disputed",
            ChallengeStatus::Expired => "expired",
            ChallengeStatus::Forfeited => "forfeited",
            ChallengeStatus::Cancelled => "cancelled",
            ChallengeStatus::Voided => "voided",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Edges of the challenge state machine. Everything else is rejected.
    pub fn can_transition_to(&self, next: ChallengeStatus) -> bool {
        use ChallengeStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted | Expired | Cancelled | Forfeited)
                | (Accepted, Completed | Disputed | Cancelled | Voided)
                | (Disputed, Completed | Voided)
        )
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChallengeStatus::Pending),
            "accepted" => Ok(ChallengeStatus::Accepted),
            "completed" => Ok(ChallengeStatus::Completed),
            "disputed" => Ok(ChallengeStatus::Disputed),
            "expired" => Ok(ChallengeStatus::Expired),
            "forfeited" => Ok(ChallengeStatus::Forfeited),
            "cancelled" => Ok(ChallengeStatus::Cancelled),
            "voided" => Ok(ChallengeStatus::Voided),
            other => Err(format!("unknown challenge status: {other}")),
        }
    }
}

impl ToSql for ChallengeStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ChallengeStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub challenger_id: PlayerId,
    pub defender_id: PlayerId,
    /// Rank at stake; 0 for unranked matches.
    pub defender_rank: u8,
    pub status: ChallengeStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub message_ref: Option<String>,
    pub thread_ref: Option<String>,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub pending_result_id: Option<i64>,
    pub pending_correction_id: Option<i64>,
}

impl Challenge {
    pub fn is_participant(&self, player_id: &str) -> bool {
        self.challenger_id == player_id || self.defender_id == player_id
    }

    pub fn opponent_of(&self, player_id: &str) -> &str {
        if self.challenger_id == player_id {
            &self.defender_id
        } else {
            &self.challenger_id
        }
    }

    pub fn is_unranked_match(&self) -> bool {
        self.defender_rank == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub id: i64,
    pub challenge_id: ChallengeId,
    pub submitted_by: PlayerId,
    pub winner_id: PlayerId,
    pub loser_id: PlayerId,
    pub sets_winner: u8,
    pub sets_loser: u8,
    /// Always in challenger/defender orientation.
    pub scores: Vec<SetScore>,
    pub confirmed: bool,
    pub disputed: bool,
    pub created_at: DateTime<Utc>,
    pub last_reminder_at: Option<DateTime<Utc>>,
}

impl MatchResult {
    pub fn is_pending(&self) -> bool {
        !self.confirmed && !self.disputed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    Pending,
    Approved,
    Rejected,
}

impl CorrectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionStatus::Pending => "pending",
            CorrectionStatus::Approved => "approved",
            CorrectionStatus::Rejected => "rejected",
        }
    }
}

impl ToSql for CorrectionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CorrectionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pending" => Ok(CorrectionStatus::Pending),
            "approved" => Ok(CorrectionStatus::Approved),
            "rejected" => Ok(CorrectionStatus::Rejected),
            other => Err(FromSqlError::Other(
                format!("unknown correction status: {other}").into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCorrection {
    pub id: i64,
    pub challenge_id: ChallengeId,
    pub requested_by: PlayerId,
    pub proposed_scores: Vec<SetScore>,
    pub proposed_winner_id: PlayerId,
    pub approved_by: Option<PlayerId>,
    pub status: CorrectionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub challenge_id: ChallengeId,
    pub user_id: PlayerId,
    pub predicted_winner_id: PlayerId,
    pub correct: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PredictionStats {
    pub total: i64,
    pub correct: i64,
    pub incorrect: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "L")]
    Loss,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Win => "W",
            MatchOutcome::Loss => "L",
        }
    }
}

impl ToSql for MatchOutcome {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MatchOutcome {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "W" => Ok(MatchOutcome::Win),
            "L" => Ok(MatchOutcome::Loss),
            other => Err(FromSqlError::Other(
                format!("unknown match outcome: {other}").into(),
            )),
        }
    }
}

/// One participant's view of a finished match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub player_id: PlayerId,
    pub opponent_id: PlayerId,
    pub result: MatchOutcome,
    pub was_challenger: bool,
    pub sets_won: u8,
    pub sets_lost: u8,
    pub points_scored: i64,
    pub points_conceded: i64,
    pub was_comeback: bool,
    pub was_perfect: bool,
    pub rank_before: Option<Rank>,
    pub rank_after: Option<Rank>,
    pub match_date: DateTime<Utc>,
    pub challenge_id: Option<ChallengeId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeadToHead {
    pub wins: i64,
    pub losses: i64,
}

impl HeadToHead {
    pub fn total(&self) -> i64 {
        self.wins + self.losses
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpponentRecord {
    pub opponent_id: PlayerId,
    pub wins: i64,
    pub losses: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rivalry {
    pub opponent_id: PlayerId,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_edges() {
        use ChallengeStatus::*;
        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Expired));
        assert!(Accepted.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Completed));
        assert!(Disputed.can_transition_to(Voided));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Voided));
        assert!(!Accepted.can_transition_to(Expired));
        assert!(!Disputed.can_transition_to(Cancelled));
        for terminal in [Completed, Expired, Forfeited, Cancelled, Voided] {
            for next in [Pending, Accepted, Completed, Disputed, Expired, Forfeited, Cancelled, Voided] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ChallengeStatus::Pending,
            ChallengeStatus::Disputed,
            ChallengeStatus::Voided,
        ] {
            assert_eq!(status.as_str().parse::<ChallengeStatus>(), Ok(status));
        }
        assert!("archived".parse::<ChallengeStatus>().is_err());
    }

    #[test]
    fn cooldown_is_strictly_in_the_future() {
        let now = from_millis(1_700_000_000_000);
        let mut player = Player::unranked("p1");
        assert!(!player.is_on_cooldown(now));

        player.cooldown_until = Some(now);
        assert!(!player.is_on_cooldown(now));

        player.cooldown_until = Some(now + chrono::Duration::milliseconds(1));
        assert!(player.is_on_cooldown(now));
    }
}
