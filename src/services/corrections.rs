//! Score corrections on completed matches. Approval records the corrected
//! score; ranks, stats and ELO from the original completion stay as they are.

use log::info;

use super::challenges::load_challenge;
use super::ladder::{Actor, LadderService};
use crate::database::corrections::{self, NewCorrection};
use crate::database::models::{ChallengeId, ChallengeStatus, CorrectionStatus, ScoreCorrection};
use crate::domain::scores::{ScoreRules, Side, parse_sets, validate_match};
use crate::errors::{LadderError, LadderResult};
use crate::integrations::Audience;

impl LadderService {
    /// Either participant proposes new scores, written challenger first.
    pub fn request_correction<S: AsRef<str>>(
        &self,
        actor: &Actor,
        challenge_id: ChallengeId,
        raw_sets: &[S],
    ) -> LadderResult<ScoreCorrection> {
        let rules = ScoreRules::from(&self.settings()?);
        let sets = parse_sets(raw_sets, Side::Challenger)?;
        let score = validate_match(&sets, &rules)?;

        let (correction, opponent) = self.transact(|tx, _, now| {
            let challenge = load_challenge(tx, challenge_id)?;
            if !challenge.is_participant(&actor.id) {
                return Err(LadderError::unauthorized(
                    "Only the players in this match can request a correction.",
                ));
            }
            if challenge.status != ChallengeStatus::Completed {
                return Err(LadderError::conflict(
                    "Only completed matches can be corrected.",
                ));
            }
            if challenge.pending_correction_id.is_some() {
                return Err(LadderError::conflict(
                    "There's already a pending correction request for this match.",
                ));
            }

            let winner_id = match score.winner {
                Side::Challenger => &challenge.challenger_id,
                Side::Defender => &challenge.defender_id,
            };
            let correction = corrections::create(
                tx,
                &NewCorrection {
                    challenge_id,
                    requested_by: &actor.id,
                    proposed_scores: &score.sets,
                    proposed_winner_id: winner_id,
                    created_at: now,
                },
            )?;
            info!(
                "Correction #{} requested by {} for challenge #{challenge_id}",
                correction.id, actor.id
            );
            Ok((correction, challenge.opponent_of(&actor.id).to_string()))
        })?;

        self.notify(
            Audience::Player(opponent),
            format!(
                "{} requested a score correction for challenge #{challenge_id}. Approve or reject correction #{}.",
                self.name(&actor.id),
                correction.id
            ),
        );
        Ok(correction)
    }

    pub fn approve_correction(&self, actor: &Actor, correction_id: i64) -> LadderResult<ScoreCorrection> {
        self.resolve_correction(actor, correction_id, CorrectionStatus::Approved)
    }

    pub fn reject_correction(&self, actor: &Actor, correction_id: i64) -> LadderResult<ScoreCorrection> {
        self.resolve_correction(actor, correction_id, CorrectionStatus::Rejected)
    }

    fn resolve_correction(
        &self,
        actor: &Actor,
        correction_id: i64,
        outcome: CorrectionStatus,
    ) -> LadderResult<ScoreCorrection> {
        let verb = match outcome {
            CorrectionStatus::Rejected => "reject",
            _ => "approve",
        };

        let correction = self.transact(|tx, _, _| {
            let correction = corrections::find(tx, correction_id)?
                .ok_or_else(|| LadderError::NotFound("This correction request".to_string()))?;
            if correction.status != CorrectionStatus::Pending {
                return Err(LadderError::conflict("This correction has already been processed."));
            }
            let challenge = load_challenge(tx, correction.challenge_id)?;
            if correction.requested_by == actor.id {
                return Err(LadderError::unauthorized(format!(
                    "You can't {verb} your own correction request."
                )));
            }
            if !challenge.is_participant(&actor.id) {
                return Err(LadderError::unauthorized(format!(
                    "Only the other player in this match can {verb} corrections."
                )));
            }

            if !corrections::resolve(tx, &correction, outcome, &actor.id)? {
                return Err(LadderError::conflict("This correction has already been processed."));
            }
            info!("Correction #{correction_id} {}: {}", outcome.as_str(), actor.id);
            corrections::find(tx, correction_id)?
                .ok_or_else(|| LadderError::NotFound("This correction request".to_string()))
        })?;

        let scores = correction
            .proposed_scores
            .iter()
            .map(|set| format!("{}-{}", set.challenger, set.defender))
            .collect::<Vec<_>>()
            .join(", ");
        self.notify(
            Audience::MatchLog,
            format!(
                "Score correction for challenge #{} {} by {}: {} won ({scores}). Ladder positions are unchanged.",
                correction.challenge_id,
                outcome.as_str(),
                self.name(&actor.id),
                self.name(&correction.proposed_winner_id),
            ),
        );
        Ok(correction)
    }
}
