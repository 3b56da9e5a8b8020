pub mod eligibility;
pub mod profile;
pub mod scores;

pub use eligibility::{Availability, EligibleTarget, Refusal};
pub use scores::{MatchScore, ScoreError, ScoreRules, SetScore, Side};
