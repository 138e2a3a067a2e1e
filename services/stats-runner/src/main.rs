//! Statistics task planner.
//!
//! Loads and validates a statistics configuration, expands it into the
//! (tile, epoch) task plan the statistics engine executes, and optionally
//! writes the plan out as JSON.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use stats_config::load_config;
use stats_tasks::build_plan;

#[derive(Parser, Debug)]
#[command(name = "stats-runner")]
#[command(about = "Task planner for the datacube statistics pipeline")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/wofs_summary.yaml")]
    config: PathBuf,

    /// Write the task plan as JSON to this path
    #[arg(long)]
    plan_out: Option<PathBuf>,

    /// Drop tasks whose outputs all exist already
    #[arg(long)]
    skip_existing: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(config = %args.config.display(), "Loading configuration");
    let config = load_config(&args.config)
        .with_context(|| format!("Invalid configuration {}", args.config.display()))?;

    info!(
        location = %config.location,
        sources = config.sources.len(),
        products = config.output_products.len(),
        "Configuration valid"
    );

    let mut plan = build_plan(&config).context("Failed to build task plan")?;
    info!(
        tasks = plan.len(),
        products = ?plan.products,
        crs = %plan.crs,
        "Task plan built"
    );

    if args.skip_existing {
        let before = plan.len();
        plan.tasks.retain(|planned| {
            !planned
                .outputs
                .values()
                .all(|path| PathBuf::from(path).exists())
        });
        let skipped = before - plan.len();
        if skipped > 0 {
            warn!(skipped, remaining = plan.len(), "Skipped completed tasks");
        }
    }

    if plan.is_empty() {
        warn!("Plan contains no tasks");
    }

    match &args.plan_out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &plan)?;
            info!(path = %path.display(), "Wrote task plan");
        }
        None => {
            for planned in &plan.tasks {
                for (product, path) in &planned.outputs {
                    println!(
                        "{}\t{}\t{}\t{}",
                        planned.task.tile, planned.task.period, product, path
                    );
                }
            }
        }
    }

    Ok(())
}
