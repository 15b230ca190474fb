//! Main entry point for drift-rates
//!
//! `dashboard` runs the interactive terminal view, `sample` runs the
//! headless poll-and-append loop, `history` prints the rate history once.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drift_rates::dashboard::run_dashboard;
use drift_rates::rates::apy::{format_percent, format_timestamp};
use drift_rates::rates::config::{MAX_HISTORY_DAYS, MIN_HISTORY_DAYS};
use drift_rates::rates::sampler::RateSampler;
use drift_rates::rates::{
    CsvSampleStore, HistorySource, OnChainRateReader, RateHistoryClient, RatesConfig,
};
use drift_rates::RateKind;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "drift-rates", about = "Drift lending rate history and live APY dashboard")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal dashboard (default)
    Dashboard,
    /// Sample every configured token on the refresh interval without a UI
    Sample,
    /// Print the rate history of one token and exit
    History {
        #[arg(short, long, default_value = "SOL")]
        token: String,
        #[arg(short, long, default_value_t = MAX_HISTORY_DAYS as u16,
              value_parser = clap::value_parser!(u16).range(MIN_HISTORY_DAYS as i64..=MAX_HISTORY_DAYS as i64))]
        days: u16,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_stdout_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

/// Log to a file so the terminal UI is not overwritten.
fn init_file_logging(config: &RatesConfig, level: Level) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    let log_path = config.log_file();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    info!(path = %log_path.display(), "Logging initialized");
    Ok(())
}

fn build_sampler(config: &RatesConfig) -> Result<RateSampler> {
    let history = Arc::new(RateHistoryClient::new(config)?);
    let current = Arc::new(OnChainRateReader::new(config));
    let storage = Arc::new(CsvSampleStore::new(&config.data_dir));
    Ok(RateSampler::new(history, current, storage, config))
}

async fn print_history(config: &RatesConfig, token: &str, days: usize, json: bool) -> Result<()> {
    let client = RateHistoryClient::new(config)?;
    let history = client.fetch_rate_history(token, days).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    for kind in RateKind::all() {
        println!("{} {} (UTC{:+})", token, kind, config.display_utc_offset_hours);
        println!("{:<16}  {:>10}  {:>10}", "date", "rate", "apy");
        for point in history.side(kind) {
            println!(
                "{:<16}  {:>10}  {:>10}",
                format_timestamp(point.timestamp, config.display_utc_offset_hours),
                format_percent(point.rate),
                format_percent(point.apy),
            );
        }
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RatesConfig::load(cli.config.as_deref())?;
    let level = config.log_level()?;

    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Dashboard => {
            init_file_logging(&config, level)?;
            let sampler = build_sampler(&config)?;
            run_dashboard(&config, sampler).await
        }
        Command::Sample => {
            init_stdout_logging(level);
            info!("Starting drift-rates sampler");
            let sampler = build_sampler(&config)?;
            tokio::select! {
                _ = sampler.run_headless(&config.tokens, config.history_days, config.refresh_interval()) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping sampler");
                }
            }
            Ok(())
        }
        Command::History { token, days, json } => {
            init_stdout_logging(Level::WARN.min(level));
            print_history(&config, &token, usize::from(days), json).await
        }
    }
}
