pub mod bot_state;
pub mod challenges;
pub mod connection;
pub mod corrections;
pub mod history;
pub mod models;
pub mod players;
pub mod predictions;
pub mod results;
pub mod setup;

pub use connection::{DbConn, DbPool, atomically, create_memory_pool, create_pool, get_connection};
pub use models::*;
