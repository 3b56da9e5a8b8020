use clap::{Parser, Subcommand};

use crate::actions::Action;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ranked 1v1 challenge ladder")]
pub struct Cli {
    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
#[clap(rename_all = "lower_case")]
pub enum Command {
    /// Run the expiry and reminder scheduler until interrupted
    Serve,
    /// Run one expiry pass and one reminder pass, then exit
    Sweep,
    /// Create the database schema
    Init,
    /// Drop every table and recreate the schema
    Reset,
    /// Print the ranked ladder
    Leaderboard,
    /// Show a player's record, form and rivalries
    Profile { player: String },
    /// Head-to-head record between two players
    H2h { player: String, opponent: String },
    /// Recent matches of a player
    History {
        player: String,
        /// Number of matches to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Perform a ladder action as the given identity
    Act {
        /// Identity performing the action
        #[arg(long = "as")]
        actor: String,
        /// Act with administrator rights
        #[arg(long)]
        admin: bool,
        #[clap(subcommand)]
        action: Action,
    },
}
