use anyhow::Result;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};

use super::ladder::LadderService;
use crate::config::settings::SchedulerSettings;
use crate::database::models::{Challenge, MatchResult};
use crate::database::{challenges, results};
use crate::errors::LadderResult;
use crate::integrations::Audience;

/// How many nags of each kind one reminder pass sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub challenges: usize,
    pub results: usize,
    pub disputes: usize,
}

impl ReminderReport {
    pub fn total(&self) -> usize {
        self.challenges + self.results + self.disputes
    }
}

impl LadderService {
    /// Auto-forfeits every pending challenge past its response window.
    /// A failing challenge is logged and left for the next pass.
    pub fn sweep_expired(&self) -> LadderResult<usize> {
        let now = self.now();
        let due = self.read(|conn| challenges::expired_pending(conn, now))?;

        let mut forfeited = 0;
        for challenge in &due {
            match self.expire(challenge.id) {
                Ok(Some(_)) => forfeited += 1,
                Ok(None) => {}
                Err(err) => error!("Failed to expire challenge #{}: {err}", challenge.id),
            }
        }
        if forfeited > 0 {
            info!("Expired {forfeited} challenges");
        }
        Ok(forfeited)
    }

    /// Nags whoever is holding up an accepted challenge, an unconfirmed result,
    /// or a dispute. Each record is stamped so it is nagged once per interval.
    pub fn send_reminders(&self) -> LadderResult<ReminderReport> {
        let (scoreless, unconfirmed, disputed) = self.transact(|tx, settings, now| {
            let cutoff = now - settings.reminder_interval();

            let scoreless = challenges::awaiting_result(tx, cutoff)?;
            for challenge in &scoreless {
                challenges::touch_reminder(tx, challenge.id, now)?;
            }

            let mut unconfirmed: Vec<(MatchResult, Challenge)> = Vec::new();
            for result in results::awaiting_confirmation(tx, cutoff)? {
                results::touch_reminder(tx, result.id, now)?;
                match challenges::find(tx, result.challenge_id)? {
                    Some(challenge) => unconfirmed.push((result, challenge)),
                    None => warn!("Result {} has no challenge", result.id),
                }
            }

            let disputed = challenges::awaiting_review(tx, cutoff)?;
            for challenge in &disputed {
                challenges::touch_reminder(tx, challenge.id, now)?;
            }

            Ok((scoreless, unconfirmed, disputed))
        })?;

        for challenge in &scoreless {
            self.notify(
                Self::challenge_channel(challenge),
                format!(
                    "Reminder: {}, please submit the score for challenge #{} against {}.",
                    self.name(&challenge.challenger_id),
                    challenge.id,
                    self.name(&challenge.defender_id),
                ),
            );
        }
        for (result, challenge) in &unconfirmed {
            self.notify(
                Audience::Player(challenge.defender_id.clone()),
                format!(
                    "Reminder: please confirm or dispute result #{} submitted by {} for challenge #{}.",
                    result.id,
                    self.name(&result.submitted_by),
                    challenge.id,
                ),
            );
        }
        for challenge in &disputed {
            self.notify(
                Audience::Reviewers,
                format!(
                    "Reminder: challenge #{} between {} and {} is still disputed.",
                    challenge.id,
                    self.name(&challenge.challenger_id),
                    self.name(&challenge.defender_id),
                ),
            );
        }

        let report = ReminderReport {
            challenges: scoreless.len(),
            results: unconfirmed.len(),
            disputes: disputed.len(),
        };
        if report.total() > 0 {
            info!(
                "Sent {} reminders ({} scores, {} confirmations, {} disputes)",
                report.total(),
                report.challenges,
                report.results,
                report.disputes
            );
        }
        Ok(report)
    }
}

/// Drives time-based transitions: expiry sweeps on a short tick, reminders on
/// a longer one, and leaderboard refreshes when cooldowns run out.
pub struct ExpirationScheduler {
    service: Arc<LadderService>,
    settings: SchedulerSettings,
}

impl ExpirationScheduler {
    pub fn new(service: Arc<LadderService>, settings: SchedulerSettings) -> Self {
        Self { service, settings }
    }

    /// One expiry pass followed by one reminder pass.
    pub fn run_once(&self) -> LadderResult<(usize, ReminderReport)> {
        let expired = self.service.sweep_expired()?;
        let reminded = self.service.send_reminders()?;
        Ok((expired, reminded))
    }

    pub async fn run(&self) -> Result<()> {
        info!("=== Starting Ladder Scheduler ===");

        // Step 1: Queue refreshes for cooldowns that outlived the last run
        let service = Arc::clone(&self.service);
        let seeded = tokio::task::spawn_blocking(move || service.seed_refresh_queue()).await??;
        info!("  → {seeded} cooldown refreshes queued");

        // Step 2: Tick forever; both intervals fire immediately on the first tick
        let mut expiry = interval(self.settings.expiry_interval);
        let mut reminders = interval(self.settings.reminder_interval);
        expiry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        reminders.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = expiry.tick() => self.tick(Sweep::Expiry).await,
                _ = reminders.tick() => self.tick(Sweep::Reminders).await,
                _ = tokio::signal::ctrl_c() => {
                    info!("=== Scheduler stopped ===");
                    return Ok(());
                }
            }
        }
    }

    async fn tick(&self, sweep: Sweep) {
        let service = Arc::clone(&self.service);
        let outcome = tokio::task::spawn_blocking(move || -> LadderResult<()> {
            match sweep {
                Sweep::Expiry => {
                    service.sweep_expired()?;
                    service.refresh_if_due();
                }
                Sweep::Reminders => {
                    service.send_reminders()?;
                }
            }
            Ok(())
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("{sweep:?} sweep failed: {err}"),
            Err(err) => error!("{sweep:?} sweep panicked: {err}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Sweep {
    Expiry,
    Reminders,
}
