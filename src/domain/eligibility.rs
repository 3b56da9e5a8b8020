//! Who may challenge whom. Pure functions over ranks and ladder snapshots;
//! the live gates (cooldowns, active challenges) are applied by the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::config::settings::LadderSettings;
use crate::database::models::{Player, PlayerId, Rank};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("You can't challenge yourself.")]
    SelfChallenge,
    #[error("You can't challenge a bot.")]
    BotTarget,
    #[error("That player is not on the ladder.")]
    TargetUnranked,
    #[error("You can only challenge rank {allowed}. Rank {target} is out of reach.")]
    OutOfReach { allowed: String, target: Rank },
    #[error("Unranked challenges are only between two unranked players.")]
    NotBothUnranked,
    #[error("You already have an active challenge.")]
    ChallengerBusy,
    #[error("That player is already in a challenge.")]
    DefenderBusy,
    #[error("You are on cooldown until {0}.")]
    ChallengerCooldown(DateTime<Utc>),
    #[error("That player is on cooldown until {0}.")]
    DefenderCooldown(DateTime<Utc>),
}

/// Ranks a player holding `rank` may challenge, best first.
pub fn challengeable_ranks(rank: Option<Rank>, settings: &LadderSettings) -> Vec<Rank> {
    let max = settings.max_rank;
    match rank {
        None => {
            let mut open = settings.open_challenge_ranks.clone();
            open.sort_unstable();
            open
        }
        Some(rank) if rank <= 1 => Vec::new(),
        Some(rank) if rank == max && max > 2 => vec![max - 2, max - 1],
        Some(rank) if rank + 1 == max && max > 2 => vec![max - 2],
        Some(rank) => vec![rank - 1],
    }
}

pub fn can_challenge(challenger: Option<Rank>, target: Option<Rank>, settings: &LadderSettings) -> bool {
    target.is_some_and(|target| challengeable_ranks(challenger, settings).contains(&target))
}

pub fn check_ranked(
    challenger: &Player,
    target: &Player,
    settings: &LadderSettings,
) -> Result<Rank, Refusal> {
    if challenger.player_id == target.player_id {
        return Err(Refusal::SelfChallenge);
    }
    let Some(target_rank) = target.rank else {
        return Err(Refusal::TargetUnranked);
    };
    if !can_challenge(challenger.rank, Some(target_rank), settings) {
        let allowed = challengeable_ranks(challenger.rank, settings)
            .iter()
            .map(Rank::to_string)
            .collect::<Vec<_>>();
        let allowed = if allowed.is_empty() {
            "nobody (you are at the top)".to_string()
        } else {
            allowed.join(" or ")
        };
        return Err(Refusal::OutOfReach {
            allowed,
            target: target_rank,
        });
    }
    Ok(target_rank)
}

pub fn check_unranked(challenger: &Player, target: &Player, target_is_bot: bool) -> Result<(), Refusal> {
    if challenger.player_id == target.player_id {
        return Err(Refusal::SelfChallenge);
    }
    if target_is_bot {
        return Err(Refusal::BotTarget);
    }
    if challenger.rank.is_some() || target.rank.is_some() {
        return Err(Refusal::NotBothUnranked);
    }
    Ok(())
}

/// Neither party may be mid-challenge or cooling down.
pub fn check_availability(
    challenger: &Player,
    target: &Player,
    busy: &HashSet<PlayerId>,
    now: DateTime<Utc>,
) -> Result<(), Refusal> {
    if busy.contains(&challenger.player_id) {
        return Err(Refusal::ChallengerBusy);
    }
    if let Some(until) = challenger.cooldown_until.filter(|_| challenger.is_on_cooldown(now)) {
        return Err(Refusal::ChallengerCooldown(until));
    }
    if busy.contains(&target.player_id) {
        return Err(Refusal::DefenderBusy);
    }
    if let Some(until) = target.cooldown_until.filter(|_| target.is_on_cooldown(now)) {
        return Err(Refusal::DefenderCooldown(until));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Availability {
    Available,
    OnCooldown(DateTime<Utc>),
    InChallenge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibleTarget {
    pub player: Player,
    pub availability: Availability,
}

pub fn eligible_targets(
    challenger: &Player,
    ladder: &[Player],
    busy: &HashSet<PlayerId>,
    now: DateTime<Utc>,
    settings: &LadderSettings,
) -> Vec<EligibleTarget> {
    let ranks = challengeable_ranks(challenger.rank, settings);
    ladder
        .iter()
        .filter(|player| player.player_id != challenger.player_id)
        .filter(|player| player.rank.is_some_and(|rank| ranks.contains(&rank)))
        .map(|player| {
            let availability = if busy.contains(&player.player_id) {
                Availability::InChallenge
            } else if let Some(until) = player.cooldown_until.filter(|_| player.is_on_cooldown(now)) {
                Availability::OnCooldown(until)
            } else {
                Availability::Available
            };
            EligibleTarget {
                player: player.clone(),
                availability,
            }
        })
        .collect()
}
