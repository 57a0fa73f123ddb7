//! Headless driver for the Scramble simulation.
//!
//! Loads a catalog (a data directory, or the stock one), runs a whole timed
//! session at a fixed frame rate with a scripted bot sorting items, and
//! prints a summary.

mod bot;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use scramble_core::catalog::Catalog;
use scramble_core::config::SessionConfig;
use scramble_core::event::{Event, EventKind};
use scramble_core::fixed::f64_to_fixed64;
use scramble_core::session::{Session, SessionStatus};
use scramble_core::upgrade::{Upgrade, UpgradeSet};
use scramble_data::load_game_data;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::bot::{BotConfig, SortBot};

#[derive(Parser)]
#[command(
    name = "scramble-headless",
    about = "Run a Scramble sorting session with a scripted bot",
    version
)]
struct Cli {
    /// Data directory with items, receptacles, requesters, overlays and
    /// session files. Uses the built-in catalog when omitted.
    #[arg(short, long)]
    data: Option<PathBuf>,

    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Host frame rate.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Probability the bot picks the right receptacle.
    #[arg(long, default_value_t = 0.85)]
    accuracy: f64,

    /// How long an item must be on the lane before the bot reacts.
    #[arg(long, default_value_t = 600)]
    reaction_ms: u64,

    /// Installed upgrade keys (repeatable), e.g. `fragile_handling`.
    #[arg(short, long = "upgrade")]
    upgrades: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!("{e}");
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (catalog, config) = match &cli.data {
        Some(dir) => {
            let data = load_game_data(dir)?;
            (data.catalog, data.config)
        }
        None => (Catalog::standard(), SessionConfig::default()),
    };

    let mut upgrades = UpgradeSet::new();
    for key in &cli.upgrades {
        let upgrade = Upgrade::from_key(key).ok_or_else(|| format!("unknown upgrade '{key}'"))?;
        upgrades.install(upgrade);
    }
    if !(0.0..=1.0).contains(&cli.accuracy) {
        return Err(format!("accuracy {} is not in [0, 1]", cli.accuracy).into());
    }

    let mut session = Session::new(catalog, config, Box::new(upgrades), cli.seed);
    session.on_event(
        EventKind::OrderCompleted,
        Box::new(|event| {
            if let Event::OrderCompleted { reward, .. } = event {
                info!(reward, "order completed");
            }
        }),
    );
    session.on_event(
        EventKind::DifficultyChanged,
        Box::new(|event| {
            if let Event::DifficultyChanged { to, .. } = event {
                info!(level = to, "level changed");
            }
        }),
    );
    session.start()?;

    let mut bot = SortBot::new(
        BotConfig {
            accuracy: f64_to_fixed64(cli.accuracy),
            reaction: cli.reaction_ms,
        },
        cli.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15),
    );
    let frame = u64::from(1000 / cli.fps.clamp(1, 1000));
    info!(seed = cli.seed, frame_ms = frame, "running session");

    while session.status() == SessionStatus::Running {
        bot.act(&mut session);
        session.advance(frame);
    }

    print_summary(&session, &bot);
    Ok(())
}

fn print_summary(session: &Session, bot: &SortBot) {
    let snapshot = session.snapshot();
    let stats = session.stats();
    println!("=== Shift summary (seed {}) ===", session.seed());
    println!("final score      {}", snapshot.score);
    println!("level            {}", snapshot.level);
    println!("orders completed {}", snapshot.orders_completed);
    println!("orders failed    {}", snapshot.orders_failed);
    println!("items spawned    {}", stats.spawned);
    println!("items sorted     {} ({} rejected)", stats.sorted, stats.rejected);
    println!("items missed     {}", stats.missed);
    println!("items exploded   {}", stats.exploded);
    println!("bot drops        {}", bot.drops());
    println!("simulated        {} ms in {} steps", session.now(), session.steps());
}
