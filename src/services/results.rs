use log::info;

use super::challenges::load_challenge;
use super::completion::{CompletionOutcome, MatchInput, complete_match, format_rank};
use super::ladder::{Actor, LadderService};
use crate::database::challenges;
use crate::database::models::{Challenge, ChallengeStatus, MatchResult};
use crate::database::results::{self, NewResult};
use crate::domain::scores::{MatchScore, ScoreRules, Side, parse_sets, validate_match};
use crate::errors::{LadderError, LadderResult};
use crate::integrations::Audience;

fn load_result(conn: &rusqlite::Connection, id: i64) -> LadderResult<MatchResult> {
    results::find(conn, id)?.ok_or_else(|| LadderError::NotFound("This result".to_string()))
}

/// The result's challenge, checked to be accepted with `actor` as the confirming defender.
fn settle_checks(conn: &rusqlite::Connection, result: &MatchResult, actor: &Actor, what: &str) -> LadderResult<Challenge> {
    let challenge = load_challenge(conn, result.challenge_id)?;
    if challenge.defender_id != actor.id {
        return Err(LadderError::unauthorized(format!(
            "Only the defender can {what} this result."
        )));
    }
    if !result.is_pending() {
        return Err(LadderError::conflict(
            "This result has already been confirmed or disputed.",
        ));
    }
    if challenge.status != ChallengeStatus::Accepted {
        return Err(LadderError::conflict("This match is no longer active."));
    }
    Ok(challenge)
}

pub(crate) fn scored_input<'a>(challenge: &'a Challenge, score: &'a MatchScore) -> MatchInput<'a> {
    MatchInput {
        challenge_id: Some(challenge.id),
        challenger_id: &challenge.challenger_id,
        defender_id: &challenge.defender_id,
        defended_rank: challenge.defender_rank,
        winner: score.winner,
        sets_winner: score.sets_winner,
        sets_loser: score.sets_loser,
        scores: Some(&score.sets),
        is_forfeit: false,
        skip_cooldown: false,
    }
}

pub(crate) fn describe_sets(score: &MatchScore) -> String {
    score
        .sets
        .iter()
        .map(|set| format!("{}-{}", set.challenger, set.defender))
        .collect::<Vec<_>>()
        .join(", ")
}

impl LadderService {
    /// The challenger reports the match, each set written as "YOUR-THEIR".
    pub fn submit_result<S: AsRef<str>>(
        &self,
        actor: &Actor,
        challenge_id: i64,
        raw_sets: &[S],
    ) -> LadderResult<MatchResult> {
        let rules = ScoreRules::from(&self.settings()?);
        let sets = parse_sets(raw_sets, Side::Challenger)?;
        let score = validate_match(&sets, &rules)?;

        let (challenge, result) = self.transact(|tx, _, now| {
            let challenge = load_challenge(tx, challenge_id)?;
            if challenge.status != ChallengeStatus::Accepted {
                return Err(LadderError::conflict("This match is no longer active."));
            }
            if challenge.challenger_id != actor.id {
                return Err(LadderError::unauthorized(
                    "Only the challenger submits the result.",
                ));
            }
            if challenge.pending_result_id.is_some() {
                return Err(LadderError::conflict(format!(
                    "A result was already submitted! Waiting for {} to confirm or dispute it.",
                    self.name(&challenge.defender_id)
                )));
            }

            let winner_id = match score.winner {
                Side::Challenger => &challenge.challenger_id,
                Side::Defender => &challenge.defender_id,
            };
            let loser_id = challenge.opponent_of(winner_id);
            let result = results::submit(
                tx,
                &NewResult {
                    challenge_id,
                    submitted_by: &actor.id,
                    winner_id,
                    loser_id,
                    sets_winner: score.sets_winner,
                    sets_loser: score.sets_loser,
                    scores: &score.sets,
                    created_at: now,
                },
            )?;
            info!(
                "Result #{} submitted for challenge #{challenge_id}: {winner_id} won {}-{}",
                result.id, score.sets_winner, score.sets_loser
            );
            Ok((challenge, result))
        })?;

        self.notify(
            Self::challenge_channel(&challenge),
            format!(
                "Result submitted: {} won {}-{} ({}). {}, please confirm or dispute.",
                self.name(&result.winner_id),
                result.sets_winner,
                result.sets_loser,
                describe_sets(&score),
                self.name(&challenge.defender_id),
            ),
        );
        Ok(result)
    }

    /// The defender agrees with the submitted result; the match completes.
    pub fn confirm_result(&self, actor: &Actor, result_id: i64) -> LadderResult<CompletionOutcome> {
        let (challenge, score, outcome) = self.transact(|tx, settings, now| {
            let result = load_result(tx, result_id)?;
            let challenge = settle_checks(tx, &result, actor, "confirm")?;

            if !results::confirm(tx, &result)? {
                return Err(LadderError::conflict(
                    "This result has already been confirmed or disputed.",
                ));
            }
            if !challenges::transition(tx, challenge.id, &[ChallengeStatus::Accepted], ChallengeStatus::Completed)? {
                return Err(LadderError::conflict("This match is no longer active."));
            }

            let score = validate_match(&result.scores, &ScoreRules::from(settings))?;
            let outcome = complete_match(tx, &scored_input(&challenge, &score), settings, now)?;
            info!("Result #{result_id} confirmed, challenge #{} completed", challenge.id);
            Ok((challenge, score, outcome))
        })?;

        self.after_completion(&outcome);
        self.announce_completion(&challenge, &score, &outcome);
        Ok(outcome)
    }

    /// The defender rejects the submitted result; reviewers take over.
    pub fn dispute_result(&self, actor: &Actor, result_id: i64) -> LadderResult<Challenge> {
        let challenge = self.transact(|tx, _, _| {
            let result = load_result(tx, result_id)?;
            let challenge = settle_checks(tx, &result, actor, "dispute")?;

            if !results::dispute(tx, &result)? {
                return Err(LadderError::conflict(
                    "This result has already been confirmed or disputed.",
                ));
            }
            if !challenges::transition(tx, challenge.id, &[ChallengeStatus::Accepted], ChallengeStatus::Disputed)? {
                return Err(LadderError::conflict("This match is no longer active."));
            }
            info!("Result #{result_id} disputed, challenge #{} needs review", challenge.id);
            load_challenge(tx, challenge.id)
        })?;

        self.notify(
            Audience::Reviewers,
            format!(
                "Dispute on challenge #{}: {} disputes the result submitted by {} (rank at stake {}).",
                challenge.id,
                self.name(&challenge.defender_id),
                self.name(&challenge.challenger_id),
                challenge.defender_rank,
            ),
        );
        Ok(challenge)
    }

    pub(crate) fn announce_completion(
        &self,
        challenge: &Challenge,
        score: &MatchScore,
        outcome: &CompletionOutcome,
    ) {
        let verdict = if score.winner == Side::Challenger && !challenge.is_unranked_match() {
            "takes the rank"
        } else if challenge.is_unranked_match() {
            "wins the unranked match"
        } else {
            "defends the rank"
        };
        let body = format!(
            "{} {verdict} {}-{} against {} ({}). Now {} and {}.",
            self.name(&outcome.winner_id),
            score.sets_winner,
            score.sets_loser,
            self.name(&outcome.loser_id),
            describe_sets(score),
            format_rank(outcome.winner_rank),
            format_rank(outcome.loser_rank),
        );
        self.notify(Audience::MatchLog, body.clone());
        if let Some(thread) = &challenge.thread_ref {
            self.notify(Audience::Thread(thread.clone()), body);
        }
    }
}
