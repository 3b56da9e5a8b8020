use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::{MatchOutcome, Player, PredictionStats, Rivalry};

/// Rivalries are only worth mentioning once they have repeated.
pub const RIVALRY_THRESHOLD: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub player: Player,
    pub form: Vec<MatchOutcome>,
    pub days_at_rank: Option<i64>,
    pub on_cooldown: bool,
    pub nemesis: Option<Rivalry>,
    pub victim: Option<Rivalry>,
    pub predictions: PredictionStats,
}

impl Profile {
    pub fn build(
        player: Player,
        form: Vec<MatchOutcome>,
        nemesis: Option<Rivalry>,
        victim: Option<Rivalry>,
        predictions: PredictionStats,
        now: DateTime<Utc>,
    ) -> Self {
        let days_at_rank = player.rank.map(|_| player.days_at_rank(now));
        let on_cooldown = player.is_on_cooldown(now);
        Self {
            player,
            form,
            days_at_rank,
            on_cooldown,
            nemesis: nemesis.filter(|r| r.count >= RIVALRY_THRESHOLD),
            victim: victim.filter(|r| r.count >= RIVALRY_THRESHOLD),
            predictions,
        }
    }

    pub fn matches_played(&self) -> i64 {
        self.player.wins + self.player.losses
    }

    /// Whole-percent win rate, or `None` before the first match.
    pub fn win_rate(&self) -> Option<i64> {
        let played = self.matches_played();
        (played > 0).then(|| (self.player.wins * 100 + played / 2) / played)
    }

    pub fn point_difference(&self) -> i64 {
        self.player.total_points_scored - self.player.total_points_conceded
    }

    pub fn form_string(&self) -> String {
        form_string(&self.form)
    }
}

/// "WWLWW", or "-" with no matches.
pub fn form_string(form: &[MatchOutcome]) -> String {
    if form.is_empty() {
        return "-".to_string();
    }
    form.iter().map(MatchOutcome::as_str).collect()
}

pub fn describe_days(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "1 day".to_string(),
        n => format!("{n} days"),
    }
}
