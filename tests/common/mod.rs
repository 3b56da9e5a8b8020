#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use rank_ladder::config::LadderSettings;
use rank_ladder::database::{self, Player};
use rank_ladder::integrations::{CountingRenderer, ManualClock, RecordingSink};
use rank_ladder::services::{Actor, LadderService};

pub struct Ladder {
    pub service: LadderService,
    pub clock: Arc<ManualClock>,
    pub notices: Arc<RecordingSink>,
    pub renders: Arc<CountingRenderer>,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
}

pub fn ladder() -> Ladder {
    ladder_with(LadderSettings::default())
}

pub fn ladder_with(settings: LadderSettings) -> Ladder {
    let pool = database::create_memory_pool().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let notices = Arc::new(RecordingSink::default());
    let renders = Arc::new(CountingRenderer::default());
    let service = LadderService::new(pool, settings)
        .with_clock(clock.clone())
        .with_notifier(notices.clone())
        .with_renderer(renders.clone());
    Ladder {
        service,
        clock,
        notices,
        renders,
    }
}

pub fn admin() -> Actor {
    Actor::admin("admin")
}

impl Ladder {
    /// Puts each player on the rank matching their position, starting at #1.
    pub fn seed(&self, players: &[&str]) {
        for (index, player) in players.iter().enumerate() {
            self.service
                .set_rank(&admin(), player, (index + 1) as u8)
                .unwrap();
        }
    }

    pub fn player(&self, player_id: &str) -> Player {
        self.service.profile(player_id).unwrap().player
    }

    pub fn rank(&self, player_id: &str) -> Option<u8> {
        self.player(player_id).rank
    }

    pub fn ranks(&self) -> Vec<(String, u8)> {
        self.service
            .leaderboard()
            .unwrap()
            .into_iter()
            .filter_map(|player| player.rank.map(|rank| (player.player_id, rank)))
            .collect()
    }
}
