//! Narrow interfaces to everything outside the ladder domain.

pub mod clock;
pub mod identity;
pub mod leaderboard;
pub mod notify;

pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{Directory, IdentityResolver};
pub use leaderboard::{CountingRenderer, LeaderboardRenderer, LogRenderer};
pub use notify::{Audience, LogSink, Notice, NotificationSink, RecordingSink};
