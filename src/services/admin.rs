use log::info;
use serde::Serialize;

use super::challenges::load_challenge;
use super::completion::{CompletionOutcome, MatchInput, complete_match};
use super::ladder::{Actor, LadderService};
use super::results::scored_input;
use crate::config::settings::{validate_cooldown_hours, validate_response_window_hours};
use crate::database::bot_state::{self, ChannelKey};
use crate::database::models::{
    Challenge, ChallengeId, ChallengeStatus, PlayerChanges, Rank, ScoreCorrection,
};
use crate::database::{challenges, corrections, players};
use crate::domain::scores::{ScoreRules, Side, parse_sets, validate_match};
use crate::errors::{LadderError, LadderResult};
use crate::integrations::Audience;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PendingItems {
    pub pending: Vec<Challenge>,
    pub accepted: Vec<Challenge>,
    pub disputed: Vec<Challenge>,
    pub corrections: Vec<ScoreCorrection>,
}

impl LadderService {
    /// Puts a player on a free rank, releasing whatever rank they held before.
    pub fn set_rank(&self, actor: &Actor, player_id: &str, rank: Rank) -> LadderResult<()> {
        actor.require_admin("set ranks")?;

        self.transact(|tx, settings, now| {
            if rank < 1 || rank > settings.max_rank {
                return Err(LadderError::invalid(format!(
                    "Rank must be between 1 and {}.",
                    settings.max_rank
                )));
            }
            if let Some(holder) = players::find_by_rank(tx, rank)? {
                if holder.player_id != player_id {
                    return Err(LadderError::conflict(format!(
                        "Rank #{rank} is already held by {}. Remove them first.",
                        self.name(&holder.player_id)
                    )));
                }
            }
            let changes = PlayerChanges {
                rank: Some(Some(rank)),
                ..Default::default()
            };
            players::upsert(tx, player_id, &changes, now)?;
            info!("Admin {} set {player_id} to rank #{rank}", actor.id);
            Ok(())
        })?;

        self.refresh_leaderboard();
        Ok(())
    }

    /// Takes a player off the ladder; everyone below moves up one place.
    pub fn remove_rank(&self, actor: &Actor, player_id: &str) -> LadderResult<Rank> {
        actor.require_admin("remove ranks")?;

        let freed = self.transact(|tx, _, now| {
            let freed = players::remove_rank_and_shift_up(tx, player_id, now)?.ok_or_else(|| {
                LadderError::invalid(format!("{} is not ranked.", self.name(player_id)))
            })?;
            info!("Admin {} removed {player_id} from rank #{freed}", actor.id);
            Ok(freed)
        })?;

        self.refresh_leaderboard();
        self.notify(
            Audience::MatchLog,
            format!("{} was removed from rank #{freed}. The ladder below moved up.", self.name(player_id)),
        );
        Ok(freed)
    }

    pub fn clear_cooldown(&self, actor: &Actor, player_id: &str) -> LadderResult<()> {
        actor.require_admin("clear cooldowns")?;

        self.transact(|tx, _, _| {
            if players::find(tx, player_id)?.is_none() {
                return Err(LadderError::NotFound(format!("Player {player_id}")));
            }
            players::set_cooldown(tx, player_id, None)?;
            info!("Admin {} cleared cooldown of {player_id}", actor.id);
            Ok(())
        })?;

        self.refresh_leaderboard();
        Ok(())
    }

    /// Records a 2-0 or 2-1 win between two players with no challenge behind it.
    /// Ranks only move when the loser sits above the winner.
    pub fn force_result(
        &self,
        actor: &Actor,
        winner_id: &str,
        loser_id: &str,
        sets_loser: u8,
    ) -> LadderResult<CompletionOutcome> {
        actor.require_admin("force results")?;
        if winner_id == loser_id {
            return Err(LadderError::invalid("Winner and loser must be different players."));
        }
        if sets_loser > 1 {
            return Err(LadderError::invalid("A forced result must be 2-0 or 2-1."));
        }

        let outcome = self.transact(|tx, settings, now| {
            let loser = players::get_or_default(tx, loser_id)?;
            let input = MatchInput {
                challenge_id: None,
                challenger_id: winner_id,
                defender_id: loser_id,
                defended_rank: loser.rank.unwrap_or(0),
                winner: Side::Challenger,
                sets_winner: 2,
                sets_loser,
                scores: None,
                is_forfeit: false,
                skip_cooldown: false,
            };
            let outcome = complete_match(tx, &input, settings, now)?;
            info!("Admin {} forced result: {winner_id} beat {loser_id} 2-{sets_loser}", actor.id);
            Ok(outcome)
        })?;

        self.after_completion(&outcome);
        self.notify(
            Audience::MatchLog,
            format!(
                "Admin result: {} beat {} 2-{sets_loser}.",
                self.name(winner_id),
                self.name(loser_id)
            ),
        );
        Ok(outcome)
    }

    /// Completes an accepted challenge with scores entered by an admin, challenger first.
    pub fn record_result<S: AsRef<str>>(
        &self,
        actor: &Actor,
        challenge_id: ChallengeId,
        raw_sets: &[S],
    ) -> LadderResult<CompletionOutcome> {
        actor.require_admin("record results")?;
        self.complete_with_scores(actor, challenge_id, raw_sets, ChallengeStatus::Accepted)
    }

    /// Settles a disputed challenge with the final scores, challenger first.
    pub fn resolve_dispute<S: AsRef<str>>(
        &self,
        actor: &Actor,
        challenge_id: ChallengeId,
        raw_sets: &[S],
    ) -> LadderResult<CompletionOutcome> {
        actor.require_admin("resolve disputes")?;
        self.complete_with_scores(actor, challenge_id, raw_sets, ChallengeStatus::Disputed)
    }

    fn complete_with_scores<S: AsRef<str>>(
        &self,
        actor: &Actor,
        challenge_id: ChallengeId,
        raw_sets: &[S],
        expected: ChallengeStatus,
    ) -> LadderResult<CompletionOutcome> {
        let rules = ScoreRules::from(&self.settings()?);
        let sets = parse_sets(raw_sets, Side::Challenger)?;
        let score = validate_match(&sets, &rules)?;

        let (challenge, outcome) = self.transact(|tx, settings, now| {
            let challenge = load_challenge(tx, challenge_id)?;
            if challenge.status != expected {
                return Err(LadderError::conflict(format!(
                    "Challenge #{challenge_id} is {}, not {expected}.",
                    challenge.status
                )));
            }
            if !challenges::transition(tx, challenge_id, &[expected], ChallengeStatus::Completed)? {
                return Err(LadderError::conflict(format!(
                    "Challenge #{challenge_id} is no longer {expected}."
                )));
            }
            challenges::set_pending_result(tx, challenge_id, None)?;

            let outcome = complete_match(tx, &scored_input(&challenge, &score), settings, now)?;
            info!(
                "Admin {} completed challenge #{challenge_id} from {expected}",
                actor.id
            );
            Ok((challenge, outcome))
        })?;

        self.after_completion(&outcome);
        self.announce_completion(&challenge, &score, &outcome);
        Ok(outcome)
    }

    /// Cancels a pending or accepted challenge. Nobody's rank or cooldown changes.
    pub fn cancel(&self, actor: &Actor, challenge_id: ChallengeId) -> LadderResult<Challenge> {
        actor.require_admin("cancel challenges")?;
        self.close_without_result(actor, challenge_id, &ChallengeStatus::ACTIVE, ChallengeStatus::Cancelled)
    }

    /// Voids an accepted or disputed match. Nobody's rank or cooldown changes.
    pub fn void(&self, actor: &Actor, challenge_id: ChallengeId) -> LadderResult<Challenge> {
        actor.require_admin("void matches")?;
        self.close_without_result(
            actor,
            challenge_id,
            &[ChallengeStatus::Accepted, ChallengeStatus::Disputed],
            ChallengeStatus::Voided,
        )
    }

    fn close_without_result(
        &self,
        actor: &Actor,
        challenge_id: ChallengeId,
        from: &[ChallengeStatus],
        to: ChallengeStatus,
    ) -> LadderResult<Challenge> {
        let challenge = self.transact(|tx, _, _| {
            let challenge = load_challenge(tx, challenge_id)?;
            if !challenges::transition(tx, challenge_id, from, to)? {
                return Err(LadderError::conflict(format!(
                    "Challenge #{challenge_id} is {} and can't be {to}.",
                    challenge.status
                )));
            }
            challenges::set_pending_result(tx, challenge_id, None)?;
            info!("Admin {} moved challenge #{challenge_id} to {to}", actor.id);
            load_challenge(tx, challenge_id)
        })?;

        let body = format!(
            "Challenge #{challenge_id} between {} and {} was {to} by an admin. No ranks changed.",
            self.name(&challenge.challenger_id),
            self.name(&challenge.defender_id),
        );
        self.notify(Audience::MatchLog, body.clone());
        if let Some(thread) = &challenge.thread_ref {
            self.notify(Audience::Thread(thread.clone()), body);
        }
        Ok(challenge)
    }

    pub fn set_cooldown_hours(&self, actor: &Actor, hours: i64) -> LadderResult<()> {
        actor.require_admin("change settings")?;
        validate_cooldown_hours(hours)?;
        self.store_setting(bot_state::COOLDOWN_HOURS_KEY, hours)?;
        info!("Admin {} set cooldown to {hours}h", actor.id);
        Ok(())
    }

    pub fn set_response_window_hours(&self, actor: &Actor, hours: i64) -> LadderResult<()> {
        actor.require_admin("change settings")?;
        validate_response_window_hours(hours)?;
        self.store_setting(bot_state::RESPONSE_WINDOW_HOURS_KEY, hours)?;
        info!("Admin {} set response window to {hours}h", actor.id);
        Ok(())
    }

    fn store_setting(&self, key: &str, hours: i64) -> LadderResult<()> {
        self.transact(|tx, _, _| Ok(bot_state::set(tx, key, &hours.to_string())?))?;
        self.invalidate_settings();
        Ok(())
    }

    pub fn set_channel(&self, actor: &Actor, channel: ChannelKey, handle: &str) -> LadderResult<()> {
        actor.require_admin("configure channels")?;
        self.transact(|tx, _, _| Ok(bot_state::set_channel(tx, channel, handle)?))?;
        info!("Admin {} set {channel} channel to {handle}", actor.id);
        Ok(())
    }

    pub fn channel(&self, channel: ChannelKey) -> LadderResult<Option<String>> {
        self.read(|conn| bot_state::get_channel(conn, channel))
    }

    pub fn pending_items(&self, actor: &Actor) -> LadderResult<PendingItems> {
        actor.require_admin("view pending items")?;
        self.read(|conn| {
            Ok(PendingItems {
                pending: challenges::with_status(conn, &[ChallengeStatus::Pending])?,
                accepted: challenges::with_status(conn, &[ChallengeStatus::Accepted])?,
                disputed: challenges::with_status(conn, &[ChallengeStatus::Disputed])?,
                corrections: corrections::pending(conn)?,
            })
        })
    }
}
