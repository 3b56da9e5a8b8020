//! The closed set of things a player or admin can ask the ladder to do.

use clap::Subcommand;

use crate::database::bot_state::ChannelKey;
use crate::database::models::{ChallengeId, Rank};
use crate::domain::eligibility::Availability;
use crate::errors::LadderResult;
use crate::services::completion::{CompletionOutcome, format_rank};
use crate::services::{Actor, LadderService};

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Action {
    /// Challenge a ranked player within reach
    Challenge { target: String },
    /// Challenge another unranked player
    ChallengeUnranked { target: String },
    /// Accept a challenge addressed to you
    Accept { challenge: ChallengeId },
    /// Decline a challenge; counts as a forfeit
    Decline { challenge: ChallengeId },
    /// Submit the score as challenger, each set as YOUR-THEIR
    Submit {
        challenge: ChallengeId,
        #[arg(required = true, num_args = 1..)]
        sets: Vec<String>,
    },
    /// Confirm a submitted result
    Confirm { result: i64 },
    /// Dispute a submitted result
    Dispute { result: i64 },
    /// Propose corrected scores for a completed match, challenger first
    Correct {
        challenge: ChallengeId,
        #[arg(required = true, num_args = 1..)]
        sets: Vec<String>,
    },
    ApproveCorrection { correction: i64 },
    RejectCorrection { correction: i64 },
    /// Predict the winner of a match in progress
    Predict { challenge: ChallengeId, winner: String },
    /// Turn challenge DMs on or off
    ToggleDm,
    /// End your own cooldown early
    RemoveCooldown,
    /// Attach presentation handles to a challenge
    Link {
        challenge: ChallengeId,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        thread: Option<String>,
    },
    /// List the players you may challenge
    Targets,
    /// [admin] Put a player on a rank
    SetRank { player: String, rank: Rank },
    /// [admin] Remove a player's rank; everyone below moves up
    RemoveRank { player: String },
    /// [admin] Clear a player's cooldown
    ClearCooldown { player: String },
    /// [admin] Record a 2-0 or 2-1 win with no challenge behind it
    ForceResult {
        winner: String,
        loser: String,
        /// Sets the loser took, 0 or 1
        #[arg(long, default_value_t = 0)]
        sets_lost: u8,
    },
    /// [admin] Enter the score of an accepted challenge, challenger first
    RecordResult {
        challenge: ChallengeId,
        #[arg(required = true, num_args = 1..)]
        sets: Vec<String>,
    },
    /// [admin] Settle a disputed challenge, challenger first
    ResolveDispute {
        challenge: ChallengeId,
        #[arg(required = true, num_args = 1..)]
        sets: Vec<String>,
    },
    /// [admin] Cancel a pending or accepted challenge
    Cancel { challenge: ChallengeId },
    /// [admin] Void an accepted or disputed match
    Void { challenge: ChallengeId },
    /// [admin] Set the cooldown after a match, in hours
    SetCooldownHours { hours: i64 },
    /// [admin] Set how long a defender has to respond, in hours
    SetResponseWindow { hours: i64 },
    /// [admin] Point a channel at a handle
    SetChannel {
        #[arg(value_enum)]
        channel: ChannelKey,
        handle: String,
    },
    /// [admin] Everything waiting on someone
    Pending,
}

impl Action {
    /// Runs the action as `actor` and returns a one-paragraph reply.
    pub fn dispatch(&self, service: &LadderService, actor: &Actor) -> LadderResult<String> {
        let reply = match self {
            Action::Challenge { target } => {
                let challenge = service.challenge(actor, target)?;
                format!(
                    "Challenge #{} sent to {target} for rank #{}.",
                    challenge.id, challenge.defender_rank
                )
            }
            Action::ChallengeUnranked { target } => {
                let challenge = service.challenge_unranked(actor, target)?;
                format!("Unranked challenge #{} sent to {target}.", challenge.id)
            }
            Action::Accept { challenge } => {
                service.accept(actor, *challenge)?;
                format!("Challenge #{challenge} accepted.")
            }
            Action::Decline { challenge } => describe_outcome(&service.decline(actor, *challenge)?),
            Action::Submit { challenge, sets } => {
                let result = service.submit_result(actor, *challenge, sets.as_slice())?;
                format!("Result #{} submitted, waiting for confirmation.", result.id)
            }
            Action::Confirm { result } => describe_outcome(&service.confirm_result(actor, *result)?),
            Action::Dispute { result } => {
                let challenge = service.dispute_result(actor, *result)?;
                format!("Challenge #{} is now disputed.", challenge.id)
            }
            Action::Correct { challenge, sets } => {
                let correction = service.request_correction(actor, *challenge, sets.as_slice())?;
                format!("Correction #{} requested.", correction.id)
            }
            Action::ApproveCorrection { correction } => {
                service.approve_correction(actor, *correction)?;
                format!("Correction #{correction} approved.")
            }
            Action::RejectCorrection { correction } => {
                service.reject_correction(actor, *correction)?;
                format!("Correction #{correction} rejected.")
            }
            Action::Predict { challenge, winner } => {
                service.predict(actor, *challenge, winner)?;
                format!("Prediction saved: {winner} wins challenge #{challenge}.")
            }
            Action::ToggleDm => {
                if service.toggle_dm_notifications(actor)? {
                    "Challenge DMs are on.".to_string()
                } else {
                    "Challenge DMs are off.".to_string()
                }
            }
            Action::RemoveCooldown => {
                service.remove_my_cooldown(actor)?;
                "Your cooldown is cleared.".to_string()
            }
            Action::Link {
                challenge,
                message,
                thread,
            } => {
                service.link_presentation(*challenge, message.as_deref(), thread.as_deref())?;
                format!("Challenge #{challenge} linked.")
            }
            Action::Targets => {
                let targets = service.eligible_targets(actor)?;
                if targets.is_empty() {
                    "Nobody is within reach.".to_string()
                } else {
                    targets
                        .iter()
                        .map(|target| {
                            let status = match target.availability {
                                Availability::Available => "available".to_string(),
                                Availability::OnCooldown(until) => {
                                    format!("cooldown until {}", until.format("%Y-%m-%d %H:%M"))
                                }
                                Availability::InChallenge => "in a challenge".to_string(),
                            };
                            format!(
                                "{} {} ({status})",
                                format_rank(target.player.rank),
                                target.player.player_id
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Action::SetRank { player, rank } => {
                service.set_rank(actor, player, *rank)?;
                format!("{player} is now #{rank}.")
            }
            Action::RemoveRank { player } => {
                let freed = service.remove_rank(actor, player)?;
                format!("{player} removed from #{freed}.")
            }
            Action::ClearCooldown { player } => {
                service.clear_cooldown(actor, player)?;
                format!("Cooldown cleared for {player}.")
            }
            Action::ForceResult {
                winner,
                loser,
                sets_lost,
            } => describe_outcome(&service.force_result(actor, winner, loser, *sets_lost)?),
            Action::RecordResult { challenge, sets } => {
                describe_outcome(&service.record_result(actor, *challenge, sets.as_slice())?)
            }
            Action::ResolveDispute { challenge, sets } => {
                describe_outcome(&service.resolve_dispute(actor, *challenge, sets.as_slice())?)
            }
            Action::Cancel { challenge } => {
                service.cancel(actor, *challenge)?;
                format!("Challenge #{challenge} cancelled.")
            }
            Action::Void { challenge } => {
                service.void(actor, *challenge)?;
                format!("Challenge #{challenge} voided.")
            }
            Action::SetCooldownHours { hours } => {
                service.set_cooldown_hours(actor, *hours)?;
                format!("Cooldown set to {hours} hours.")
            }
            Action::SetResponseWindow { hours } => {
                service.set_response_window_hours(actor, *hours)?;
                format!("Response window set to {hours} hours.")
            }
            Action::SetChannel { channel, handle } => {
                service.set_channel(actor, *channel, handle)?;
                format!("{channel} channel set to {handle}.")
            }
            Action::Pending => {
                let items = service.pending_items(actor)?;
                format!(
                    "{} pending, {} in progress, {} disputed, {} corrections waiting.",
                    items.pending.len(),
                    items.accepted.len(),
                    items.disputed.len(),
                    items.corrections.len()
                )
            }
        };
        Ok(reply)
    }
}

fn describe_outcome(outcome: &CompletionOutcome) -> String {
    if outcome.already_applied {
        return "This match was already recorded.".to_string();
    }
    format!(
        "{} beat {}. {} is {}, {} is {}.",
        outcome.winner_id,
        outcome.loser_id,
        outcome.winner_id,
        format_rank(outcome.winner_rank),
        outcome.loser_id,
        format_rank(outcome.loser_rank),
    )
}
