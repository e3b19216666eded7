//! # PHLX Core Replay CLI
//!
//! Replays a scenario file through the geofence, fire risk and command
//! services and writes every derived event to stdout as JSON lines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use phlx_service::{
    AppContext, Config, EventSink, JsonLinesSink, LogFormat, LogSink, Scenario, ScenarioRunner,
};

#[derive(Parser, Debug)]
#[command(name = "phlx-core", version)]
#[command(about = "Replay a scenario through the PHLX core engines")]
struct Args {
    /// Scenario JSON file
    #[arg(short, long)]
    scenario: PathBuf,

    /// Log events instead of writing them to stdout
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the event stream, logs go to stderr
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config);

    tracing::info!(
        version = phlx_service::VERSION,
        scenario = %args.scenario.display(),
        dry_run = args.dry_run,
        "Starting PHLX core replay"
    );

    let text = tokio::fs::read_to_string(&args.scenario)
        .await
        .with_context(|| format!("reading {}", args.scenario.display()))?;
    let scenario = Scenario::from_json(&text)?;

    let sink: Arc<dyn EventSink> = if args.dry_run {
        Arc::new(LogSink)
    } else {
        Arc::new(JsonLinesSink::stdout())
    };

    let ctx = AppContext::new(config, sink)?;
    let summary = ScenarioRunner::new(ctx).run(scenario).await?;

    if summary.rejected > 0 {
        tracing::warn!(rejected = summary.rejected, "Some messages were rejected");
    }
    Ok(())
}
