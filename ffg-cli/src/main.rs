//! FFG finality simulator CLI
//!
//! Runs a number of weighted voting rounds over a checkpoint tree and prints
//! the justification and finalization of each round.
//!
//! # Example
//!
//! ```bash
//! # Ten rounds with the reference roster
//! ffg-sim
//!
//! # Three reproducible rounds
//! ffg-sim 3 --seed 42
//! ```

mod narrator;

use anyhow::Context;
use clap::Parser;
use ffg_consensus::{FfgEngine, IndexScheme, SimulationConfig};
use narrator::Narrator;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Casper FFG finality simulator
#[derive(Parser, Debug)]
#[command(name = "ffg-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of voting rounds; missing or non-positive runs 10
    #[arg(allow_negative_numbers = true)]
    rounds: Option<i64>,

    /// Seed for the validators' votes
    #[arg(long, env = "FFG_SEED")]
    seed: Option<u64>,

    /// JSON simulation config (roster, seed, index scheme)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number checkpoints structurally (2n+1, 2n+2 under node n)
    #[arg(long)]
    structural: bool,

    /// Print the established links as JSON instead of the trace
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if let Some(rounds) = args.rounds {
        config.max_rounds = rounds;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if args.structural {
        config.index_scheme = IndexScheme::Structural;
    }

    let (mut engine, seed) = FfgEngine::from_config(&config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    if !args.json {
        engine.set_event_sender(tx);
    }

    info!(rounds = engine.max_rounds(), seed, "Starting simulation");

    let stdout = io::stdout();
    let mut narrator = Narrator::new(stdout.lock());
    if !args.json {
        narrator.banner(engine.max_rounds(), seed)?;
    }

    let result = narrator.follow(&mut engine, &mut rx)?;

    match result {
        Ok(links) => {
            if args.json {
                let mut out = narrator.into_inner();
                writeln!(out, "{}", serde_json::to_string_pretty(&links)?)?;
            } else {
                narrator.summary(&links)?;
            }
            Ok(())
        }
        Err(failure) => {
            if args.json {
                let mut out = narrator.into_inner();
                writeln!(out, "{}", serde_json::to_string_pretty(&failure.links)?)?;
            } else {
                narrator.summary(&failure.links)?;
            }
            Err(failure).context("Simulation aborted")
        }
    }
}
