use anyhow::Result;

use rank_ladder::cli::Command;
use rank_ladder::{
    handle_act, handle_head_to_head, handle_history, handle_init, handle_leaderboard,
    handle_profile, handle_reset, handle_serve, handle_sweep, interpret,
};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::Serve => handle_serve(),
        Command::Sweep => handle_sweep(),
        Command::Init => handle_init(),
        Command::Reset => handle_reset(),
        Command::Leaderboard => handle_leaderboard(),
        Command::Profile { player } => handle_profile(player),
        Command::H2h { player, opponent } => handle_head_to_head(player, opponent),
        Command::History { player, limit } => handle_history(player, *limit),
        Command::Act {
            actor,
            admin,
            action,
        } => handle_act(actor, *admin, action),
    }
}
