// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! defectfit - Defect-Count Distribution Fitting
//!
//! Reads batch records (items inspected, defects found), fits Poisson,
//! Binomial and Negative Binomial models and prints the chi-square
//! goodness-of-fit analysis as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use defectfit::{BatchRecord, BatchSimulator, Config, Database, Engine, VERSION};

/// defectfit - Defect-Count Distribution Fitting
#[derive(Parser, Debug)]
#[command(name = "defectfit")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Fit discrete distributions to batch defect counts")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file with an array of {"total": .., "defects": ..} records
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Analyse simulated batches
    #[arg(long)]
    demo: bool,

    /// Significance level of the goodness-of-fit test
    #[arg(short, long)]
    alpha: Option<f64>,

    /// Filter outliers before fitting
    #[arg(long)]
    no_outliers: bool,

    /// IQR multiplier used when filtering outliers
    #[arg(long)]
    threshold: Option<f64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Record the run in the history database
    #[arg(long)]
    history: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("defectfit v{}", VERSION);

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    info!("Configuration loaded from {:?}", config_path);

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(alpha) = args.alpha {
        config.analysis.significance_level = alpha;
    }
    if args.no_outliers {
        config.analysis.include_outliers = false;
    }
    if let Some(threshold) = args.threshold {
        config.analysis.outlier_threshold = threshold;
    }
    if args.history {
        config.database.enabled = true;
    }

    let records = match &args.input {
        Some(path) => read_records(path)?,
        None if config.demo_mode => {
            info!("Demo mode: simulating {} batches", config.simulator.batches);
            BatchSimulator::new(config.simulator.clone())?.generate()?
        }
        None => bail!("no input given; pass --input <file> or --demo"),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, records))
}

fn read_records(path: &Path) -> Result<Vec<BatchRecord>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    let records: Vec<BatchRecord> = serde_json::from_str(&content)
        .with_context(|| format!("{:?} is not a JSON array of batch records", path))?;
    info!("Read {} batch records from {:?}", records.len(), path);
    Ok(records)
}

async fn run(config: Config, records: Vec<BatchRecord>) -> Result<()> {
    let database = if config.database.enabled {
        let db = Database::open(&config.database)?;
        db.cleanup(config.database.retention_days)?;
        Some(Arc::new(db))
    } else {
        None
    };

    let mut engine = Engine::new(config);
    if let Some(db) = database {
        engine = engine.with_history(db);
    }

    let result = engine.run(records).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
