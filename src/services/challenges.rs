use log::info;

use super::completion::{CompletionOutcome, MatchInput, complete_match, format_rank};
use super::ladder::{Actor, LadderService};
use crate::database::challenges::{self, NewChallenge};
use crate::database::models::{Challenge, ChallengeId, ChallengeStatus, Player};
use crate::database::{players, predictions};
use crate::domain::eligibility::{self, EligibleTarget, Refusal};
use crate::domain::scores::Side;
use crate::errors::{LadderError, LadderResult};
use crate::integrations::Audience;

pub(crate) fn load_challenge(conn: &rusqlite::Connection, id: ChallengeId) -> LadderResult<Challenge> {
    challenges::find(conn, id)?.ok_or(LadderError::ChallengeNotFound(id))
}

fn require_defender(challenge: &Challenge, actor: &Actor, what: &str) -> LadderResult<()> {
    if challenge.defender_id != actor.id {
        return Err(LadderError::unauthorized(format!(
            "Only the defender can {what} this challenge."
        )));
    }
    Ok(())
}

fn require_pending(challenge: &Challenge) -> LadderResult<()> {
    if challenge.status != ChallengeStatus::Pending {
        return Err(LadderError::conflict("This challenge is no longer pending."));
    }
    Ok(())
}

/// A forfeit: the challenger wins 2-0 with nothing played and no cooldown.
fn forfeit_input(challenge: &Challenge) -> MatchInput<'_> {
    MatchInput {
        challenge_id: Some(challenge.id),
        challenger_id: &challenge.challenger_id,
        defender_id: &challenge.defender_id,
        defended_rank: challenge.defender_rank,
        winner: Side::Challenger,
        sets_winner: 2,
        sets_loser: 0,
        scores: None,
        is_forfeit: true,
        skip_cooldown: true,
    }
}

impl LadderService {
    /// Challenges a ranked player within reach.
    pub fn challenge(&self, actor: &Actor, target_id: &str) -> LadderResult<Challenge> {
        if self.is_bot(target_id) {
            return Err(Refusal::BotTarget.into());
        }

        let (challenge, notify_defender) = self.transact(|tx, settings, now| {
            let challenger = players::get_or_default(tx, &actor.id)?;
            let target = players::get_or_default(tx, target_id)?;
            let rank = eligibility::check_ranked(&challenger, &target, settings)?;
            let busy = challenges::busy_players(tx)?;
            eligibility::check_availability(&challenger, &target, &busy, now)?;

            players::ensure(tx, &actor.id, settings.starting_elo)?;
            let challenge = challenges::create(
                tx,
                &NewChallenge {
                    challenger_id: &actor.id,
                    defender_id: target_id,
                    defender_rank: rank,
                    created_at: now,
                    expires_at: now + settings.response_window(),
                },
            )?;
            info!(
                "Challenge #{} created: {} -> {} for rank #{rank}",
                challenge.id, actor.id, target_id
            );
            Ok((challenge, target.dm_notifications_enabled))
        })?;

        self.announce_challenge(&challenge, notify_defender);
        Ok(challenge)
    }

    /// Challenges another unranked player; no rank is at stake.
    pub fn challenge_unranked(&self, actor: &Actor, target_id: &str) -> LadderResult<Challenge> {
        let target_is_bot = self.is_bot(target_id);

        let (challenge, notify_defender) = self.transact(|tx, settings, now| {
            let challenger = players::get_or_default(tx, &actor.id)?;
            let target = players::get_or_default(tx, target_id)?;
            eligibility::check_unranked(&challenger, &target, target_is_bot)?;
            let busy = challenges::busy_players(tx)?;
            eligibility::check_availability(&challenger, &target, &busy, now)?;

            players::ensure(tx, &actor.id, settings.starting_elo)?;
            players::ensure(tx, target_id, settings.starting_elo)?;
            let challenge = challenges::create(
                tx,
                &NewChallenge {
                    challenger_id: &actor.id,
                    defender_id: target_id,
                    defender_rank: 0,
                    created_at: now,
                    expires_at: now + settings.response_window(),
                },
            )?;
            info!(
                "Unranked challenge #{} created: {} -> {}",
                challenge.id, actor.id, target_id
            );
            Ok((challenge, target.dm_notifications_enabled))
        })?;

        self.announce_challenge(&challenge, notify_defender);
        Ok(challenge)
    }

    fn announce_challenge(&self, challenge: &Challenge, notify_defender: bool) {
        let stake = if challenge.is_unranked_match() {
            "(Unranked Match)".to_string()
        } else {
            format!("for Rank #{}", challenge.defender_rank)
        };
        if notify_defender {
            self.notify(
                Audience::Player(challenge.defender_id.clone()),
                format!(
                    "You've been challenged! {} has challenged you {stake}. Respond by {}.",
                    self.name(&challenge.challenger_id),
                    challenge.expires_at.format("%Y-%m-%d %H:%M UTC"),
                ),
            );
        }
        self.notify(
            Audience::MatchLog,
            format!(
                "New challenge #{}: {} challenges {} {stake}.",
                challenge.id,
                self.name(&challenge.challenger_id),
                self.name(&challenge.defender_id),
            ),
        );
    }

    pub fn accept(&self, actor: &Actor, challenge_id: ChallengeId) -> LadderResult<Challenge> {
        let challenge = self.transact(|tx, _, _| {
            let challenge = load_challenge(tx, challenge_id)?;
            require_defender(&challenge, actor, "accept")?;
            require_pending(&challenge)?;

            if !challenges::transition(tx, challenge_id, &[ChallengeStatus::Pending], ChallengeStatus::Accepted)? {
                return Err(LadderError::conflict("This challenge is no longer pending."));
            }
            info!("Challenge #{challenge_id} accepted by {}", actor.id);
            Ok(load_challenge(tx, challenge_id)?)
        })?;

        self.notify(
            Self::challenge_channel(&challenge),
            format!(
                "Match in progress: {} vs {}. {} submits the result when done.",
                self.name(&challenge.challenger_id),
                self.name(&challenge.defender_id),
                self.name(&challenge.challenger_id),
            ),
        );
        Ok(challenge)
    }

    /// Declining is a forfeit: the challenger wins as if 2-0.
    pub fn decline(&self, actor: &Actor, challenge_id: ChallengeId) -> LadderResult<CompletionOutcome> {
        let (challenge, outcome) = self.transact(|tx, settings, now| {
            let challenge = load_challenge(tx, challenge_id)?;
            require_defender(&challenge, actor, "decline")?;
            require_pending(&challenge)?;

            if !challenges::transition(tx, challenge_id, &[ChallengeStatus::Pending], ChallengeStatus::Forfeited)? {
                return Err(LadderError::conflict("This challenge is no longer pending."));
            }
            let outcome = complete_match(tx, &forfeit_input(&challenge), settings, now)?;
            info!("Challenge #{challenge_id} declined by {}, forfeited", actor.id);
            Ok((challenge, outcome))
        })?;

        self.after_completion(&outcome);
        self.notify(
            Audience::MatchLog,
            format!(
                "Forfeit: {} declined the challenge from {}. {} wins by forfeit and stands at {}. No cooldown applied.",
                self.name(&challenge.defender_id),
                self.name(&challenge.challenger_id),
                self.name(&challenge.challenger_id),
                format_rank(outcome.winner_rank),
            ),
        );
        Ok(outcome)
    }

    /// Auto-forfeits a pending challenge whose response window has passed.
    /// Returns `None` if it is no longer pending or not yet due.
    pub fn expire(&self, challenge_id: ChallengeId) -> LadderResult<Option<CompletionOutcome>> {
        let expired = self.transact(|tx, settings, now| {
            let challenge = load_challenge(tx, challenge_id)?;
            if challenge.status != ChallengeStatus::Pending || challenge.expires_at > now {
                return Ok(None);
            }
            if !challenges::transition(tx, challenge_id, &[ChallengeStatus::Pending], ChallengeStatus::Expired)? {
                return Ok(None);
            }
            let outcome = complete_match(tx, &forfeit_input(&challenge), settings, now)?;
            info!("Challenge #{challenge_id} expired, {} wins by forfeit", challenge.challenger_id);
            Ok(Some((challenge, outcome)))
        })?;

        let Some((challenge, outcome)) = expired else {
            return Ok(None);
        };
        self.after_completion(&outcome);
        self.notify(
            Audience::MatchLog,
            format!(
                "Auto-forfeit: {} did not respond to the challenge from {}. {} wins by forfeit and stands at {}. No cooldown applied.",
                self.name(&challenge.defender_id),
                self.name(&challenge.challenger_id),
                self.name(&challenge.challenger_id),
                format_rank(outcome.winner_rank),
            ),
        );
        if let Some(thread) = &challenge.thread_ref {
            self.notify(
                Audience::Thread(thread.clone()),
                format!(
                    "Challenge expired. {} wins by forfeit.",
                    self.name(&challenge.challenger_id)
                ),
            );
        }
        Ok(Some(outcome))
    }

    /// Ranked players the actor may challenge, with whether each is free right now.
    pub fn eligible_targets(&self, actor: &Actor) -> LadderResult<Vec<EligibleTarget>> {
        let settings = self.settings()?;
        let now = self.now();
        self.read(|conn| {
            let challenger = players::get_or_default(conn, &actor.id)?;
            let ladder = players::ranked(conn)?;
            let busy = challenges::busy_players(conn)?;
            Ok(eligibility::eligible_targets(&challenger, &ladder, &busy, now, &settings))
        })
    }

    pub fn active_challenge(&self, player_id: &str) -> LadderResult<Option<Challenge>> {
        self.read(|conn| challenges::active_for(conn, player_id))
    }

    pub fn challenge_details(&self, challenge_id: ChallengeId) -> LadderResult<Challenge> {
        let conn = self.connection()?;
        load_challenge(&conn, challenge_id)
    }

    /// Stores the handles of the externally rendered challenge post and thread.
    pub fn link_presentation(
        &self,
        challenge_id: ChallengeId,
        message_ref: Option<&str>,
        thread_ref: Option<&str>,
    ) -> LadderResult<Challenge> {
        self.transact(|tx, _, _| {
            load_challenge(tx, challenge_id)?;
            if let Some(message_ref) = message_ref {
                challenges::set_message_ref(tx, challenge_id, message_ref)?;
            }
            if let Some(thread_ref) = thread_ref {
                challenges::set_thread_ref(tx, challenge_id, thread_ref)?;
            }
            load_challenge(tx, challenge_id)
        })
    }

    /// Records or replaces the actor's pick for an accepted match.
    pub fn predict(&self, actor: &Actor, challenge_id: ChallengeId, winner_id: &str) -> LadderResult<()> {
        self.transact(|tx, _, now| {
            let challenge = load_challenge(tx, challenge_id)?;
            if challenge.status != ChallengeStatus::Accepted {
                return Err(LadderError::conflict(
                    "Predictions are only open while the match is in progress.",
                ));
            }
            if challenge.is_participant(&actor.id) {
                return Err(LadderError::unauthorized("You can't predict your own match."));
            }
            if !challenge.is_participant(winner_id) {
                return Err(LadderError::invalid("Pick one of the two players in this match."));
            }
            predictions::upsert(tx, challenge_id, &actor.id, winner_id, now)?;
            info!("{} predicts {winner_id} in challenge #{challenge_id}", actor.id);
            Ok(())
        })
    }

    pub fn toggle_dm_notifications(&self, actor: &Actor) -> LadderResult<bool> {
        self.transact(|tx, settings, _| {
            Ok(players::toggle_dm_notifications(tx, &actor.id, settings.starting_elo)?)
        })
    }

    /// Lets a player end their own cooldown early.
    pub fn remove_my_cooldown(&self, actor: &Actor) -> LadderResult<()> {
        self.transact(|tx, _, now| {
            let player: Player = players::get_or_default(tx, &actor.id)?;
            if !player.is_on_cooldown(now) {
                return Err(LadderError::conflict("You're not on cooldown."));
            }
            players::set_cooldown(tx, &actor.id, None)?;
            info!("{} removed their own cooldown", actor.id);
            Ok(())
        })?;
        self.refresh_leaderboard();
        Ok(())
    }
}
