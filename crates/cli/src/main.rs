//! Hourglass CLI
//!
//! Inspect and drive daily per-user feature quotas stored in Redis.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use hourglass_quota::QuotaEngine;
use hourglass_redis::RedisCounterStore;

use crate::config::HourglassConfig;

/// Hourglass CLI — daily per-user feature quotas.
#[derive(Parser, Debug)]
#[command(name = "hourglass", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        env = "HOURGLASS_CONFIG",
        default_value = "hourglass.toml",
        global = true
    )]
    config: PathBuf,

    /// Override the Redis URL from the configuration file.
    #[arg(long, env = "HOURGLASS_REDIS_URL", global = true)]
    redis_url: Option<String>,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show today's usage without consuming.
    Peek(commands::quota::QuotaArgs),
    /// Consume one unit; exits 1 when the daily limit is reached.
    Consume(commands::quota::QuotaArgs),
    /// Refund one previously consumed unit.
    Credit(commands::quota::QuotaArgs),
    /// List configured limits and time until the daily reset.
    Limits,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = HourglassConfig::load(&cli.config)?;
    if let Some(url) = cli.redis_url {
        config.redis.url = url;
    }
    tracing::debug!(
        path = %cli.config.display(),
        features = config.limits.len(),
        "configuration loaded"
    );

    let store = RedisCounterStore::connect(&config.redis.redis_config()).await?;
    let engine = QuotaEngine::connect(Arc::new(store), config.engine_config()).await?;

    let result = match cli.command {
        Command::Peek(args) => commands::quota::run_peek(&engine, &args, &cli.format).await,
        Command::Consume(args) => commands::quota::run_consume(&engine, &args, &cli.format).await,
        Command::Credit(args) => commands::quota::run_credit(&engine, &args, &cli.format).await,
        Command::Limits => commands::limits::run(&engine, &cli.format),
    };

    engine.close().await?;
    result
}
