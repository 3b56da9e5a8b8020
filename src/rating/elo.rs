use serde::Serialize;

use crate::config::settings::LadderSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloConfig {
    pub k_factor: f64,
    pub floor: i64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            floor: 100,
        }
    }
}

impl From<&LadderSettings> for EloConfig {
    fn from(settings: &LadderSettings) -> Self {
        Self {
            k_factor: settings.elo_k_factor,
            floor: settings.elo_floor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EloUpdate {
    pub winner_before: i64,
    pub winner_after: i64,
    pub loser_before: i64,
    pub loser_after: i64,
}

/// Probability that a player rated `rating` beats one rated `opponent`.
pub fn expected_score(rating: i64, opponent: i64) -> f64 {
    let diff = (opponent - rating) as f64;
    1.0 / (1.0 + 10f64.powf(diff / 400.0))
}

fn adjust(rating: i64, opponent: i64, actual: f64, config: &EloConfig) -> i64 {
    let delta = config.k_factor * (actual - expected_score(rating, opponent));
    let updated = (rating as f64 + delta).round() as i64;
    updated.max(config.floor)
}

pub fn rate_match(winner: i64, loser: i64, config: &EloConfig) -> EloUpdate {
    EloUpdate {
        winner_before: winner,
        winner_after: adjust(winner, loser, 1.0, config),
        loser_before: loser,
        loser_after: adjust(loser, winner, 0.0, config),
    }
}
