use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Arc;

use super::completion::CompletionOutcome;
use super::refresh::RefreshQueue;
use crate::config::settings::{LadderSettings, SettingsProvider};
use crate::database::models::{Challenge, PlayerId};
use crate::database::{self, DbConn, DbPool, players};
use crate::errors::{LadderError, LadderResult};
use crate::integrations::leaderboard;
use crate::integrations::{
    Audience, Clock, Directory, IdentityResolver, LeaderboardRenderer, LogRenderer, LogSink,
    Notice, NotificationSink, SystemClock, identity, notify,
};

/// Who is acting, and whether they hold admin rights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: PlayerId,
    pub is_admin: bool,
}

impl Actor {
    pub fn player(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_admin: false,
        }
    }

    pub fn admin(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_admin: true,
        }
    }

    pub fn require_admin(&self, what: &str) -> LadderResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(LadderError::unauthorized(format!(
                "Only administrators can {what}."
            )))
        }
    }
}

/// Entry point for every ladder operation. Each operation takes a fresh
/// settings snapshot, runs in one IMMEDIATE transaction, and only talks to
/// the outside world after it has committed.
pub struct LadderService {
    pool: DbPool,
    settings: SettingsProvider,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    renderer: Arc<dyn LeaderboardRenderer>,
    identities: Arc<dyn IdentityResolver>,
    refreshes: RefreshQueue,
}

impl LadderService {
    pub fn new(pool: DbPool, settings: LadderSettings) -> Self {
        Self {
            pool,
            settings: SettingsProvider::new(settings),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogSink),
            renderer: Arc::new(LogRenderer),
            identities: Arc::new(Directory::default()),
            refreshes: RefreshQueue::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn LeaderboardRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_identities(mut self, identities: Arc<dyn IdentityResolver>) -> Self {
        self.identities = identities;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn settings(&self) -> LadderResult<LadderSettings> {
        let conn = self.connection()?;
        Ok(self.settings.snapshot(&conn)?)
    }

    pub(crate) fn invalidate_settings(&self) {
        self.settings.invalidate();
    }

    pub(crate) fn connection(&self) -> LadderResult<DbConn> {
        Ok(database::get_connection(&self.pool)?)
    }

    /// Runs `work` in a single IMMEDIATE transaction. Nothing is kept if it fails.
    pub(crate) fn transact<T>(
        &self,
        work: impl FnOnce(&Transaction, &LadderSettings, DateTime<Utc>) -> LadderResult<T>,
    ) -> LadderResult<T> {
        let mut conn = self.connection()?;
        let settings = self.settings.snapshot(&conn)?;
        let now = self.clock.now();

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin transaction")?;
        let value = work(&tx, &settings, now)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    pub(crate) fn read<T>(&self, work: impl FnOnce(&Connection) -> anyhow::Result<T>) -> LadderResult<T> {
        let conn = self.connection()?;
        Ok(work(&conn)?)
    }

    pub(crate) fn name(&self, player_id: &str) -> String {
        identity::display(self.identities.as_ref(), player_id)
    }

    pub(crate) fn is_bot(&self, player_id: &str) -> bool {
        self.identities.is_bot(player_id)
    }

    pub(crate) fn notify(&self, audience: Audience, body: impl Into<String>) {
        notify::notify(self.notifier.as_ref(), Notice::new(audience, body));
    }

    /// The challenge thread when one exists, else the match log.
    pub(crate) fn challenge_channel(challenge: &Challenge) -> Audience {
        match &challenge.thread_ref {
            Some(thread) => Audience::Thread(thread.clone()),
            None => Audience::MatchLog,
        }
    }

    pub fn refresh_leaderboard(&self) {
        match self.read(players::ranked) {
            Ok(ladder) => leaderboard::refresh(self.renderer.as_ref(), &ladder),
            Err(err) => warn!("Could not load ladder for refresh: {err}"),
        }
    }

    pub(crate) fn after_completion(&self, outcome: &CompletionOutcome) {
        if outcome.already_applied {
            return;
        }
        self.refresh_leaderboard();
        if let Some(until) = outcome.cooldown_until {
            self.refreshes.schedule(until);
        }
    }

    /// Queues a refresh for every cooldown still running. Used at startup.
    pub fn seed_refresh_queue(&self) -> LadderResult<usize> {
        let now = self.now();
        let pending = self.read(|conn| players::future_cooldowns(conn, now))?;
        for until in &pending {
            self.refreshes.schedule(*until);
        }
        info!("Queued {} leaderboard refreshes for running cooldowns", pending.len());
        Ok(pending.len())
    }

    /// Redraws the leaderboard if a cooldown ended since the last check.
    pub fn refresh_if_due(&self) -> bool {
        let due = self.refreshes.take_due(self.now());
        if due {
            self.refresh_leaderboard();
        }
        due
    }

    pub fn queued_refreshes(&self) -> usize {
        self.refreshes.len()
    }
}
