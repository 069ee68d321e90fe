use std::fs;

use anyhow::{bail, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use mallpark_kernel::clock::{Clock, SystemClock};
use mallpark_kernel::config::ParkingConfig;
use mallpark_kernel::manager::Outcome;
use mallpark_kernel::simulate::{Dashboard, Simulation, Step};
use mallpark_kernel::source::RandomPlateSource;

/// MallPark parking terminal simulator
#[derive(Parser, Debug)]
#[command(name = "mallpark")]
#[command(about = "Automated mall parking terminal (simulated)", long_about = None)]
struct Cli {
    /// Path to terminal config JSON
    #[arg(long)]
    config: Option<String>,

    /// Path to step script JSON
    #[arg(long)]
    script: Option<String>,

    /// Run the built-in demo before the script
    #[arg(long)]
    demo: bool,

    /// Seed for simulated plate recognition
    #[arg(long)]
    seed: Option<u64>,
}

/// Wrapper for JSON output
#[derive(Debug, Serialize)]
struct CliOutput {
    outcomes: Vec<Outcome>,
    dashboard: Dashboard,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.script.is_none() && !cli.demo {
        bail!("nothing to run: pass --script <FILE> and/or --demo");
    }

    // ----------------------------
    // Load config
    // ----------------------------
    let config = if let Some(path) = &cli.config {
        ParkingConfig::from_json(&fs::read_to_string(path)?)?
    } else {
        ParkingConfig::default()
    };

    // ----------------------------
    // Load script
    // ----------------------------
    let mut steps = Vec::new();
    if cli.demo {
        steps.extend([Step::Demo, Step::Settle]);
    }
    if let Some(path) = &cli.script {
        let data = fs::read_to_string(path)?;
        steps.extend(serde_json::from_str::<Vec<Step>>(&data)?);
    }

    // ----------------------------
    // Run simulation
    // ----------------------------
    let source = match cli.seed {
        Some(seed) => RandomPlateSource::from_seed(seed),
        None => RandomPlateSource::new(),
    };
    let mut simulation = Simulation::new(config, SystemClock.now(), source)?;

    let outcomes = simulation.run(&steps)?;
    tracing::info!(
        steps = steps.len(),
        outcomes = outcomes.len(),
        "simulation finished"
    );

    // ----------------------------
    // Output
    // ----------------------------
    let output = CliOutput {
        outcomes,
        dashboard: simulation.dashboard()?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
