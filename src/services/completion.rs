//! The match completion pipeline: every win, loss and forfeit goes through
//! `complete_match`, which applies ranks, cooldowns, counters, history, ELO and
//! prediction results as one unit.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::Connection;

use crate::config::settings::LadderSettings;
use crate::database::models::{ChallengeId, HistoryEntry, MatchOutcome, PlayerId, Rank};
use crate::database::{atomically, history, players, predictions};
use crate::domain::scores::{SetScore, Side, match_stats};
use crate::rating::{EloConfig, EloUpdate};

#[derive(Debug, Clone)]
pub struct MatchInput<'a> {
    /// `None` for admin-forced results with no challenge behind them.
    pub challenge_id: Option<ChallengeId>,
    pub challenger_id: &'a str,
    pub defender_id: &'a str,
    /// 0 when no rank is at stake.
    pub defended_rank: u8,
    pub winner: Side,
    pub sets_winner: u8,
    pub sets_loser: u8,
    /// Challenger-first set scores; `None` or empty when nothing was played.
    pub scores: Option<&'a [SetScore]>,
    pub is_forfeit: bool,
    pub skip_cooldown: bool,
}

impl MatchInput<'_> {
    pub fn id_of(&self, side: Side) -> &str {
        match side {
            Side::Challenger => self.challenger_id,
            Side::Defender => self.defender_id,
        }
    }

    pub fn winner_id(&self) -> &str {
        self.id_of(self.winner)
    }

    pub fn loser_id(&self) -> &str {
        self.id_of(self.winner.other())
    }

    fn played_scores(&self) -> Option<&[SetScore]> {
        self.scores
            .filter(|scores| !self.is_forfeit && !scores.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub winner_id: PlayerId,
    pub loser_id: PlayerId,
    pub winner_rank: Option<Rank>,
    pub loser_rank: Option<Rank>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub elo: Option<EloUpdate>,
    /// True when this challenge had already been completed and nothing was changed.
    pub already_applied: bool,
}

pub fn complete_match(
    conn: &Connection,
    input: &MatchInput,
    settings: &LadderSettings,
    now: DateTime<Utc>,
) -> Result<CompletionOutcome> {
    let winner_id = input.winner_id();
    let loser_id = input.loser_id();

    if let Some(challenge_id) = input.challenge_id {
        if history::exists_for_challenge(conn, challenge_id)? {
            info!("Challenge #{challenge_id} was already completed, skipping");
            return Ok(CompletionOutcome {
                winner_id: winner_id.to_string(),
                loser_id: loser_id.to_string(),
                winner_rank: players::get_or_default(conn, winner_id)?.rank,
                loser_rank: players::get_or_default(conn, loser_id)?.rank,
                cooldown_until: None,
                elo: None,
                already_applied: true,
            });
        }
    }

    debug!(
        "Completing match {} vs {} for rank {}",
        input.challenger_id, input.defender_id, input.defended_rank
    );

    atomically(conn, "complete_match", |conn| {
        // Step 1: make sure both rows exist
        players::ensure(conn, input.challenger_id, settings.starting_elo)?;
        players::ensure(conn, input.defender_id, settings.starting_elo)?;

        // Step 2: pre-match snapshot
        let winner_before = players::get_or_default(conn, winner_id)?.rank;
        let loser_before = players::get_or_default(conn, loser_id)?.rank;

        // Step 3: cooldowns
        let cooldown_until = (!input.skip_cooldown).then(|| now + settings.cooldown());
        if cooldown_until.is_some() {
            players::set_cooldown(conn, input.challenger_id, cooldown_until)?;
            players::set_cooldown(conn, input.defender_id, cooldown_until)?;
        }

        // Step 4: a winning challenger takes the rank; a winning defender holds
        if input.winner == Side::Challenger {
            players::swap_ranks(conn, winner_id, loser_id, settings.max_rank, now)?;
        }
        let winner_after = players::get_or_default(conn, winner_id)?.rank;
        let loser_after = players::get_or_default(conn, loser_id)?.rank;

        // Step 5: counters
        players::record_win(conn, winner_id)?;
        players::record_loss(conn, loser_id)?;
        players::update_win_streak(conn, winner_id)?;
        players::update_loss_streak(conn, loser_id)?;

        let counts_for_titles = input.challenge_id.is_some();
        if counts_for_titles && input.winner == Side::Challenger {
            players::increment(conn, winner_id, players::Counter::TitleTakes)?;
        }

        // Step 6: points, perfect and comeback only when sets were played
        let stats = input
            .played_scores()
            .map(|scores| match_stats(scores, input.winner));
        let (winner_points, loser_points) = match stats {
            Some(stats) => {
                let winner_points = stats.points_for(input.winner);
                let loser_points = stats.points_for(input.winner.other());
                players::add_points(conn, winner_id, winner_points, loser_points)?;
                players::add_points(conn, loser_id, loser_points, winner_points)?;
                if stats.is_perfect {
                    players::increment(conn, winner_id, players::Counter::PerfectMatches)?;
                }
                if stats.is_comeback {
                    players::increment(conn, winner_id, players::Counter::ComebackWins)?;
                }
                if counts_for_titles && input.winner == Side::Defender {
                    players::increment(conn, winner_id, players::Counter::TitleDefenses)?;
                }
                (winner_points, loser_points)
            }
            None => (0, 0),
        };

        // Step 7: one history record per side
        let was_comeback = stats.is_some_and(|s| s.is_comeback);
        // Forced results carry only a set count.
        let was_perfect = match stats {
            Some(stats) => stats.is_perfect,
            None => !input.is_forfeit && input.sets_loser == 0,
        };
        history::append(
            conn,
            &HistoryEntry {
                player_id: winner_id.to_string(),
                opponent_id: loser_id.to_string(),
                result: MatchOutcome::Win,
                was_challenger: input.winner == Side::Challenger,
                sets_won: input.sets_winner,
                sets_lost: input.sets_loser,
                points_scored: winner_points,
                points_conceded: loser_points,
                was_comeback,
                was_perfect,
                rank_before: winner_before,
                rank_after: winner_after,
                match_date: now,
                challenge_id: input.challenge_id,
            },
        )?;
        history::append(
            conn,
            &HistoryEntry {
                player_id: loser_id.to_string(),
                opponent_id: winner_id.to_string(),
                result: MatchOutcome::Loss,
                was_challenger: input.winner == Side::Defender,
                sets_won: input.sets_loser,
                sets_lost: input.sets_winner,
                points_scored: loser_points,
                points_conceded: winner_points,
                was_comeback: false,
                was_perfect: false,
                rank_before: loser_before,
                rank_after: loser_after,
                match_date: now,
                challenge_id: input.challenge_id,
            },
        )?;

        // Step 8: ELO, forfeits included
        let elo = players::update_elo(
            conn,
            winner_id,
            loser_id,
            &EloConfig::from(settings),
            settings.starting_elo,
        )?;

        // Step 9: settle predictions
        if let Some(challenge_id) = input.challenge_id {
            predictions::resolve(conn, challenge_id, winner_id)?;
        }

        info!(
            "Match complete: {winner_id} beat {loser_id} (ranks {} -> {}, {} -> {})",
            format_rank(winner_before),
            format_rank(winner_after),
            format_rank(loser_before),
            format_rank(loser_after),
        );

        Ok(CompletionOutcome {
            winner_id: winner_id.to_string(),
            loser_id: loser_id.to_string(),
            winner_rank: winner_after,
            loser_rank: loser_after,
            cooldown_until,
            elo: Some(elo),
            already_applied: false,
        })
    })
}

pub fn format_rank(rank: Option<Rank>) -> String {
    rank.map_or_else(|| "unranked".to_string(), |rank| format!("#{rank}"))
}
