pub mod admin;
pub mod challenges;
pub mod completion;
pub mod corrections;
pub mod ladder;
pub mod queries;
pub mod refresh;
pub mod results;
pub mod scheduler;

pub use admin::PendingItems;
pub use completion::{CompletionOutcome, MatchInput};
pub use ladder::{Actor, LadderService};
pub use queries::HeadToHeadReport;
pub use scheduler::{ExpirationScheduler, ReminderReport};
