//! Set and match score rules shared by result submission, score corrections and
//! dispute resolution.
//!
//! A set is won by the side that reaches `points_per_set` while strictly ahead.
//! A match is won by the first side to take `sets_to_win` sets, and no set may
//! follow once the match is decided.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

use crate::config::settings::LadderSettings;

static SET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\s*[-–]\s*(\d{1,2})$").expect("set score pattern is valid")
});

/// Points of one set, oriented challenger first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub challenger: u32,
    pub defender: u32,
}

impl SetScore {
    pub fn new(challenger: u32, defender: u32) -> Self {
        Self { challenger, defender }
    }

    pub fn points_for(&self, side: Side) -> u32 {
        match side {
            Side::Challenger => self.challenger,
            Side::Defender => self.defender,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Challenger,
    Defender,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Challenger => Side::Defender,
            Side::Defender => Side::Challenger,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("Invalid score format \"{0}\". Use \"10-6\" format.")]
    Format(String),
    #[error("Invalid set score: {0}-{1}. Winner must reach {2}+ and be ahead.")]
    UndecidedSet(u32, u32, u32),
    #[error("A match has between {min} and {max} sets, got {got}.")]
    SetCount { min: usize, max: usize, got: usize },
    #[error("Invalid result - no one has won {0} sets yet.")]
    NoWinner(u8),
    #[error("Invalid result - both players can't win {0}+ sets.")]
    BothWon(u8),
    #[error("Invalid result - set {0} was played after the match was already decided.")]
    PlayedAfterDecided(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRules {
    pub sets_to_win: u8,
    pub points_per_set: u32,
}

impl ScoreRules {
    pub fn max_sets(&self) -> usize {
        usize::from(self.sets_to_win) * 2 - 1
    }
}

impl Default for ScoreRules {
    fn default() -> Self {
        Self {
            sets_to_win: 2,
            points_per_set: 10,
        }
    }
}

impl From<&LadderSettings> for ScoreRules {
    fn from(settings: &LadderSettings) -> Self {
        Self {
            sets_to_win: settings.sets_to_win,
            points_per_set: settings.points_per_set,
        }
    }
}

/// A validated best-of-N outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchScore {
    pub sets: Vec<SetScore>,
    pub winner: Side,
    pub sets_winner: u8,
    pub sets_loser: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchStats {
    pub challenger_points: i64,
    pub defender_points: i64,
    pub is_perfect: bool,
    pub is_comeback: bool,
}

impl MatchStats {
    pub fn points_for(&self, side: Side) -> i64 {
        match side {
            Side::Challenger => self.challenger_points,
            Side::Defender => self.defender_points,
        }
    }
}

/// Splits "10-6" into its two numbers, in the order written.
pub fn parse_set(raw: &str) -> Result<(u32, u32), ScoreError> {
    let trimmed = raw.trim();
    let captures = SET_PATTERN
        .captures(trimmed)
        .ok_or_else(|| ScoreError::Format(trimmed.to_string()))?;

    let first = captures[1]
        .parse()
        .map_err(|_| ScoreError::Format(trimmed.to_string()))?;
    let second = captures[2]
        .parse()
        .map_err(|_| ScoreError::Format(trimmed.to_string()))?;
    Ok((first, second))
}

/// Parses set strings written as "OWN-OPPONENT" by `author` and orients them
/// challenger first. Blank entries (an unplayed third set) are skipped.
pub fn parse_sets<S: AsRef<str>>(raw_sets: &[S], author: Side) -> Result<Vec<SetScore>, ScoreError> {
    raw_sets
        .iter()
        .map(AsRef::as_ref)
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            let (own, opponent) = parse_set(raw)?;
            Ok(match author {
                Side::Challenger => SetScore::new(own, opponent),
                Side::Defender => SetScore::new(opponent, own),
            })
        })
        .collect()
}

pub fn set_winner(set: &SetScore, rules: &ScoreRules) -> Result<Side, ScoreError> {
    let target = rules.points_per_set;
    if set.challenger >= target && set.challenger > set.defender {
        Ok(Side::Challenger)
    } else if set.defender >= target && set.defender > set.challenger {
        Ok(Side::Defender)
    } else {
        Err(ScoreError::UndecidedSet(set.challenger, set.defender, target))
    }
}

pub fn validate_match(sets: &[SetScore], rules: &ScoreRules) -> Result<MatchScore, ScoreError> {
    let min = usize::from(rules.sets_to_win);
    let max = rules.max_sets();
    if sets.len() < min || sets.len() > max {
        return Err(ScoreError::SetCount {
            min,
            max,
            got: sets.len(),
        });
    }

    let mut challenger_sets = 0u8;
    let mut defender_sets = 0u8;
    for (idx, set) in sets.iter().enumerate() {
        if challenger_sets >= rules.sets_to_win || defender_sets >= rules.sets_to_win {
            return Err(ScoreError::PlayedAfterDecided(idx + 1));
        }
        match set_winner(set, rules)? {
            Side::Challenger => challenger_sets += 1,
            Side::Defender => defender_sets += 1,
        }
    }

    let challenger_won = challenger_sets >= rules.sets_to_win;
    let defender_won = defender_sets >= rules.sets_to_win;
    let winner = match (challenger_won, defender_won) {
        (true, true) => return Err(ScoreError::BothWon(rules.sets_to_win)),
        (false, false) => return Err(ScoreError::NoWinner(rules.sets_to_win)),
        (true, false) => Side::Challenger,
        (false, true) => Side::Defender,
    };

    Ok(MatchScore {
        sets: sets.to_vec(),
        winner,
        sets_winner: challenger_sets.max(defender_sets),
        sets_loser: challenger_sets.min(defender_sets),
    })
}

pub fn match_stats(sets: &[SetScore], winner: Side) -> MatchStats {
    let challenger_points = sets.iter().map(|s| i64::from(s.challenger)).sum();
    let defender_points = sets.iter().map(|s| i64::from(s.defender)).sum();

    let loser = winner.other();
    let loser_sets = sets
        .iter()
        .filter(|s| s.points_for(loser) > s.points_for(winner))
        .count();
    let is_comeback = sets
        .first()
        .is_some_and(|first| first.points_for(winner) < first.points_for(loser));

    MatchStats {
        challenger_points,
        defender_points,
        is_perfect: loser_sets == 0,
        is_comeback,
    }
}
