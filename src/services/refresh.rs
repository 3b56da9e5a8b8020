use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;

/// Instants at which the leaderboard should be redrawn because a cooldown ends.
#[derive(Default)]
pub struct RefreshQueue {
    due: Mutex<BinaryHeap<Reverse<DateTime<Utc>>>>,
}

impl RefreshQueue {
    pub fn schedule(&self, at: DateTime<Utc>) {
        let mut due = self.due.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        due.push(Reverse(at));
    }

    /// Removes every entry at or before `now`; true if there was any.
    pub fn take_due(&self, now: DateTime<Utc>) -> bool {
        let mut due = self.due.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut fired = false;
        while due.peek().is_some_and(|Reverse(at)| *at <= now) {
            due.pop();
            fired = true;
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.due.lock().map(|due| due.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
