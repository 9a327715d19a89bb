//! Money-muling detection CLI.
//!
//! Reads a transaction CSV, runs the detector, and writes the JSON report.

use anyhow::Context;
use clap::Parser;
use rust_mule_detector::{ingest, DetectorConfig, MuleDetector};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mule-detect")]
#[command(version, about = "Detect money-muling rings in a transaction CSV", long_about = None)]
struct Cli {
    /// Transaction CSV (sender_id, receiver_id, amount, timestamp)
    input: PathBuf,

    /// Write the JSON report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Detector configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit single-line JSON
    #[arg(long)]
    compact: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so the report can be piped
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            DetectorConfig::from_json(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => DetectorConfig::default(),
    };
    let detector = MuleDetector::with_config(config)?;

    let outcome = ingest::load_csv_path(&cli.input)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;
    for warning in outcome.warnings.iter().take(20) {
        warn!(row = warning.row, "{}", warning.message);
    }
    info!(
        transactions = outcome.transactions.len(),
        warnings = outcome.warnings.len(),
        "ledger loaded"
    );

    let run = detector.run(&outcome.transactions);
    info!(
        started_at = %run.started_at,
        processed = run.transactions_processed,
        skipped = run.transactions_skipped,
        edges = run.graph_stats.edge_count,
        "run finished in {:.2}s",
        run.processing_time_seconds
    );

    let json = if cli.compact {
        run.report.to_json_compact()?
    } else {
        run.report.to_json()?
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, json + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{}", json),
    }

    Ok(())
}
