use std::time::Duration;

use battleship_link::autopilot::run_match;
use battleship_link::{init_logging, AppConfig};
use clap::Parser;
use serde_json::json;

/// Play one headless autopilot-vs-autopilot game and print a JSON summary.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    seed1: u64,
    seed2: u64,
    /// Virtual time advanced per tick, in milliseconds.
    #[arg(long, default_value_t = 100)]
    step_ms: u64,
    #[arg(long, default_value_t = 100_000)]
    max_ticks: u64,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AppConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };

    let report = run_match(
        (args.seed1, args.seed2),
        &config.session,
        Duration::from_millis(args.step_ms),
        args.max_ticks,
    );

    let result = json!({
        "master": {"outcome": report.master.map(|o| format!("{:?}", o)), "shots": report.master_shots},
        "slave": {"outcome": report.slave.map(|o| format!("{:?}", o)), "shots": report.slave_shots},
        "winner": report.winner().map(|r| r.to_string()),
        "ticks": report.ticks,
    });

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
