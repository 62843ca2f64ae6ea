use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use kline_ingestor::providers::binance_rest::{BinanceCredentials, BinanceFuturesSource};
use rth_sessions::{config::Config, pipeline::Pipeline};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Regular-trading-hours daily bars from Binance futures klines")]
struct Cli {
    #[arg(long, value_name = "FILE")]
    config: PathBuf,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch the configured range, then write raw and daily outputs.
    Fetch {
        /// Pretend the run happens at this instant (RFC 3339).
        #[arg(long, value_name = "RFC3339")]
        now: Option<String>,
    },
    /// Rebuild the daily outputs from a raw CSV written by an earlier fetch.
    Aggregate {
        #[arg(long, value_name = "CSV")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // Klines are public; a key only raises the rate limit.
    let credentials = BinanceCredentials::from_env_if_present()
        .context("reading BINANCE_API_KEY / BINANCE_SECRET_KEY")?;
    if credentials.is_none() {
        debug!("no API key set, using the public endpoint");
    }
    let source = BinanceFuturesSource::new(config.source.clone(), credentials)
        .context("building the Binance client")?;
    let pipeline = Pipeline::new(&config, source).context("building the pipeline")?;

    match cli.cmd {
        Cmd::Fetch { now } => {
            let now = match now {
                Some(text) => DateTime::parse_from_rfc3339(&text)
                    .with_context(|| format!("--now {text:?} is not RFC 3339"))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let report = pipeline.run(now).await?;
            info!(
                bars = report.bars,
                daily_bars = report.daily_bars,
                gaps = report.gaps.len(),
                coverage = ?report.coverage,
                "done"
            );
        }
        Cmd::Aggregate { input } => {
            let report = pipeline
                .aggregate_file(&input)
                .await
                .with_context(|| format!("aggregating {}", input.display()))?;
            info!(bars = report.bars, daily_bars = report.daily_bars, "done");
        }
    }

    Ok(())
}
