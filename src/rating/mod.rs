pub mod elo;

pub use elo::{EloConfig, EloUpdate, expected_score, rate_match};
