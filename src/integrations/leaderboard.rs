use anyhow::Result;
use colored::Colorize;
use log::{info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::database::models::Player;

pub trait LeaderboardRenderer: Send + Sync {
    fn render(&self, ladder: &[Player]) -> Result<()>;
}

pub fn refresh(renderer: &dyn LeaderboardRenderer, ladder: &[Player]) {
    if let Err(err) = renderer.render(ladder) {
        warn!("Could not refresh leaderboard: {err:#}");
    }
}

/// One line per rank, `#3 alice (5W-2L)`.
pub fn format_ladder(ladder: &[Player]) -> Vec<String> {
    ladder
        .iter()
        .filter_map(|player| {
            player.rank.map(|rank| {
                format!(
                    "#{rank:<2} {} ({}W-{}L)",
                    player.player_id, player.wins, player.losses
                )
            })
        })
        .collect()
}

pub struct LogRenderer;

impl LeaderboardRenderer for LogRenderer {
    fn render(&self, ladder: &[Player]) -> Result<()> {
        info!("Leaderboard refreshed ({} ranked)", ladder.len());
        for line in format_ladder(ladder) {
            info!("{}", line.bold());
        }
        Ok(())
    }
}

/// Counts renders without drawing anything.
#[derive(Default)]
pub struct CountingRenderer {
    renders: AtomicUsize,
}

impl CountingRenderer {
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl LeaderboardRenderer for CountingRenderer {
    fn render(&self, _ladder: &[Player]) -> Result<()> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
