//! Best-effort delivery of notices. A failed delivery is logged and dropped.

use anyhow::Result;
use log::{info, warn};
use std::fmt;
use std::sync::Mutex;

use crate::database::models::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Direct message to one player.
    Player(PlayerId),
    /// Whoever reviews disputes.
    Reviewers,
    /// The public match log.
    MatchLog,
    /// The discussion thread of one challenge.
    Thread(String),
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Player(id) => write!(f, "player {id}"),
            Audience::Reviewers => f.write_str("reviewers"),
            Audience::MatchLog => f.write_str("match log"),
            Audience::Thread(handle) => write!(f, "thread {handle}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub audience: Audience,
    pub body: String,
}

impl Notice {
    pub fn new(audience: Audience, body: impl Into<String>) -> Self {
        Self {
            audience,
            body: body.into(),
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notice: &Notice) -> Result<()>;
}

pub fn notify(sink: &dyn NotificationSink, notice: Notice) {
    if let Err(err) = sink.deliver(&notice) {
        warn!("Could not notify {}: {err:#}", notice.audience);
    }
}

/// Writes notices to the log.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notice: &Notice) -> Result<()> {
        info!("[{}] {}", notice.audience, notice.body);
        Ok(())
    }
}

/// Keeps every delivered notice in memory.
#[derive(Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }

    pub fn count_for(&self, audience: &Audience) -> usize {
        self.notices()
            .iter()
            .filter(|notice| &notice.audience == audience)
            .count()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notice: &Notice) -> Result<()> {
        self.notices
            .lock()
            .map_err(|_| anyhow::anyhow!("notice log poisoned"))?
            .push(notice.clone());
        Ok(())
    }
}
