//! Ticker demo
//!
//! Prints a line on every wall clock boundary until interrupted or until the
//! requested number of ticks has been seen.

mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::Parser;
use tracing::info;

use wallclock_ticker::{Ticker, TickerConfig};

#[derive(Parser)]
#[command(name = "ticker-demo")]
#[command(about = "Tick on wall clock boundaries, e.g. every minute on the minute")]
#[command(version)]
struct Cli {
    /// Tick period in milliseconds
    #[arg(short, long, default_value = "60000")]
    period_ms: u64,

    /// Sampling accuracy in milliseconds
    #[arg(short, long, default_value = "1000")]
    accuracy_ms: u64,

    /// TOML configuration file; overrides --period-ms and --accuracy-ms
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exit after this many ticks
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format: compact, pretty or json
    #[arg(long, default_value = "compact")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize_logging(&cli.log_level, &cli.log_format)?;

    let config = match &cli.config {
        Some(path) => TickerConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => TickerConfig::new(
            Duration::from_millis(cli.period_ms),
            Duration::from_millis(cli.accuracy_ms),
        ),
    };

    let mut ticker = Ticker::from_config(&config).context("Invalid ticker configuration")?;
    info!("Ticking every {:?} with accuracy {:?}", ticker.period(), ticker.accuracy());

    let handle = ticker.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping ticker");
            handle.stop_close();
        }
    });

    let mut seen = 0u64;
    while let Some(tick) = ticker.recv().await {
        println!("tick: {}", tick.to_rfc3339_opts(SecondsFormat::Millis, true));
        seen += 1;
        if cli.count.is_some_and(|count| seen >= count) {
            ticker.stop_close();
        }
    }

    println!("{}", serde_json::to_string_pretty(&ticker.metrics())?);
    Ok(())
}
