pub mod actions;
pub mod cli;
pub mod config;
pub mod database;
pub mod domain;
pub mod errors;
pub mod integrations;
pub mod rating;
pub mod services;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use log::info;
use std::sync::Arc;

use crate::actions::Action;
use crate::cli::Command;
use crate::config::settings::AppConfig;
use crate::database::models::MatchOutcome;
use crate::database::setup;
use crate::domain::profile::describe_days;
use crate::integrations::Directory;
use crate::services::completion::format_rank;
use crate::services::{Actor, ExpirationScheduler, LadderService};

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

fn open_service(config: &AppConfig) -> Result<LadderService> {
    let pool = database::create_pool(&config.database_path)?;
    setup::init_schema(&*database::get_connection(&pool)?)?;
    let service = LadderService::new(pool, config.ladder.clone())
        .with_identities(Arc::new(Directory::new(&config.bot_ids)));
    Ok(service)
}

pub fn handle_serve() -> Result<()> {
    let config = AppConfig::new();
    let service = Arc::new(open_service(&config)?);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let scheduler = ExpirationScheduler::new(service, config.scheduler.clone());
        scheduler.run().await
    })
}

pub fn handle_sweep() -> Result<()> {
    let config = AppConfig::new();
    let service = Arc::new(open_service(&config)?);
    let scheduler = ExpirationScheduler::new(service, config.scheduler.clone());
    let (expired, reminded) = scheduler.run_once()?;
    info!("Sweep done: {expired} expired, {} reminders", reminded.total());
    Ok(())
}

pub fn handle_init() -> Result<()> {
    let config = AppConfig::new();
    let pool = database::create_pool(&config.database_path)?;
    setup::init_schema(&*database::get_connection(&pool)?)?;
    Ok(())
}

pub fn handle_reset() -> Result<()> {
    let config = AppConfig::new();
    let pool = database::create_pool(&config.database_path)?;
    setup::reset_database(&*database::get_connection(&pool)?)?;
    Ok(())
}

pub fn handle_leaderboard() -> Result<()> {
    let service = open_service(&AppConfig::new())?;
    let now = service.now();
    let ladder = service.leaderboard()?;
    if ladder.is_empty() {
        println!("The ladder is empty.");
    }
    for player in ladder {
        let cooldown = if player.is_on_cooldown(now) { " (cooldown)".yellow().to_string() } else { String::new() };
        println!(
            "{:<4} {:<20} {}W-{}L  elo {}{cooldown}",
            format_rank(player.rank).bold(),
            player.player_id,
            player.wins,
            player.losses,
            player.elo,
        );
    }
    Ok(())
}

pub fn handle_profile(player_id: &str) -> Result<()> {
    let service = open_service(&AppConfig::new())?;
    let profile = service.profile(player_id)?;
    let player = &profile.player;

    println!("{} {}", player.player_id.bold(), format_rank(player.rank));
    if let Some(days) = profile.days_at_rank {
        println!("  Held for {}", describe_days(days));
    }
    println!(
        "  Record {}W-{}L{}  elo {}",
        player.wins,
        player.losses,
        profile.win_rate().map(|rate| format!(" ({rate}%)")).unwrap_or_default(),
        player.elo
    );
    println!("  Form {}", profile.form_string());
    println!(
        "  Streak {} (best {})  titles {} taken, {} defended",
        player.win_streak, player.best_win_streak, player.title_takes, player.title_defenses
    );
    println!("  Points {:+}", profile.point_difference());
    if let Some(nemesis) = &profile.nemesis {
        println!("  Nemesis {} ({} losses)", nemesis.opponent_id.red(), nemesis.count);
    }
    if let Some(victim) = &profile.victim {
        println!("  Victim {} ({} wins)", victim.opponent_id.green(), victim.count);
    }
    if profile.predictions.total > 0 {
        println!(
            "  Predictions {}/{} correct",
            profile.predictions.correct, profile.predictions.total
        );
    }
    if profile.on_cooldown {
        println!("  {}", "On cooldown".yellow());
    }
    Ok(())
}

pub fn handle_head_to_head(player_id: &str, opponent_id: &str) -> Result<()> {
    let service = open_service(&AppConfig::new())?;
    let report = service.head_to_head(player_id, opponent_id)?;
    println!(
        "{} vs {}: {}-{}",
        report.player_id.bold(),
        report.opponent_id.bold(),
        report.record.wins,
        report.record.losses
    );
    for entry in report.recent {
        println!(
            "  {} {} {}-{}",
            entry.match_date.format("%Y-%m-%d"),
            entry.result.as_str(),
            entry.sets_won,
            entry.sets_lost
        );
    }
    Ok(())
}

pub fn handle_history(player_id: &str, limit: usize) -> Result<()> {
    let service = open_service(&AppConfig::new())?;
    for entry in service.history(player_id, limit)? {
        let verdict = match entry.result {
            MatchOutcome::Win => "W".green(),
            MatchOutcome::Loss => "L".red(),
        };
        println!(
            "{} {verdict} vs {:<20} {}-{}  {} -> {}",
            entry.match_date.format("%Y-%m-%d %H:%M"),
            entry.opponent_id,
            entry.sets_won,
            entry.sets_lost,
            format_rank(entry.rank_before),
            format_rank(entry.rank_after),
        );
    }
    Ok(())
}

pub fn handle_act(actor_id: &str, admin: bool, action: &Action) -> Result<()> {
    let service = open_service(&AppConfig::new())?;
    let actor = if admin { Actor::admin(actor_id) } else { Actor::player(actor_id) };
    let reply = action.dispatch(&service, &actor)?;
    println!("{reply}");
    Ok(())
}
