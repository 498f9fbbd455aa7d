//! Emitter location from one to three direction-finding reports.
//!
//! Usage:
//!   emitter-fix scenario.json --precision 10m --output estimate.json

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use emitter_fix::FixResolver;
use emitter_fix::geo::grid::GridPrecision;
use emitter_fix::io::{load_scenario_from_json, save_estimate_to_json, write_estimate_json};

#[derive(Parser, Debug)]
#[command(name = "emitter-fix", about = "Resolve LOB / CUT / FIX estimates from DF reports")]
struct Args {
    /// Scenario JSON with `rf` parameters and up to three `sensors`
    scenario: PathBuf,

    /// Grid reference precision: 1km, 100m, 10m or 1m
    #[arg(short, long, default_value = "1m")]
    precision: GridPrecision,

    /// Write the estimate here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let scenario = load_scenario_from_json(&args.scenario)?;
    scenario
        .validate()
        .with_context(|| format!("validating {}", args.scenario.display()))?;

    let estimate = FixResolver::new(args.precision)
        .resolve(&scenario.sensors, &scenario.rf)
        .context("resolving emitter location")?;

    info!(
        classification = %estimate.classification,
        targets = estimate.targets.len(),
        "emitter resolved"
    );
    for target in &estimate.targets {
        let grid = target
            .grid
            .as_ref()
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(kind = %target.kind, location = %target.location, %grid, area = ?target.error_area, "target");
    }

    match &args.output {
        Some(path) => save_estimate_to_json(path, &estimate)?,
        None => write_estimate_json(std::io::stdout().lock(), &estimate)?,
    }
    Ok(())
}
