use serde::Serialize;

use super::ladder::LadderService;
use crate::database::models::{HeadToHead, HistoryEntry, OpponentRecord, Player, PredictionStats};
use crate::database::{history, players, predictions};
use crate::domain::profile::Profile;
use crate::errors::LadderResult;

const FORM_LENGTH: usize = 5;
const RECENT_MEETINGS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadToHeadReport {
    pub player_id: String,
    pub opponent_id: String,
    pub record: HeadToHead,
    pub recent: Vec<HistoryEntry>,
}

impl LadderService {
    /// Ranked players, best first.
    pub fn leaderboard(&self) -> LadderResult<Vec<Player>> {
        self.read(players::ranked)
    }

    pub fn profile(&self, player_id: &str) -> LadderResult<Profile> {
        let now = self.now();
        self.read(|conn| {
            let player = players::get_or_default(conn, player_id)?;
            let form = history::form_guide(conn, player_id, FORM_LENGTH)?;
            let nemesis = history::nemesis(conn, player_id)?;
            let victim = history::victim(conn, player_id)?;
            let predictions = predictions::stats(conn, player_id)?;
            Ok(Profile::build(player, form, nemesis, victim, predictions, now))
        })
    }

    pub fn head_to_head(&self, player_id: &str, opponent_id: &str) -> LadderResult<HeadToHeadReport> {
        self.read(|conn| {
            Ok(HeadToHeadReport {
                player_id: player_id.to_string(),
                opponent_id: opponent_id.to_string(),
                record: history::head_to_head(conn, player_id, opponent_id)?,
                recent: history::recent_between(conn, player_id, opponent_id, RECENT_MEETINGS)?,
            })
        })
    }

    pub fn all_head_to_head(&self, player_id: &str) -> LadderResult<Vec<OpponentRecord>> {
        self.read(|conn| history::all_head_to_head(conn, player_id))
    }

    pub fn history(&self, player_id: &str, limit: usize) -> LadderResult<Vec<HistoryEntry>> {
        self.read(|conn| history::recent(conn, player_id, limit))
    }

    pub fn prediction_stats(&self, player_id: &str) -> LadderResult<PredictionStats> {
        self.read(|conn| predictions::stats(conn, player_id))
    }
}
