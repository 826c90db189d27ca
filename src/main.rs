use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchwatch::api::{ApiClient, QuotaCaps, QuotaManager, SessionHandle, TelemetryApi};
use matchwatch::config::Config;
use matchwatch::spider::Spider;
use matchwatch::storage::SqliteMatchStore;

#[derive(Parser)]
#[command(
    name = "matchwatch",
    version,
    about = "Quota-aware match telemetry spider with durable crawl catalog",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the harvesting spider until interrupted
    Run,

    /// Show remote data usage for the configured credentials
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Status => status(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    tracing::info!(
        mode = ?config.api.mode,
        sessions = config.spider.sessions,
        "matchwatch starting"
    );

    let quota = Arc::new(QuotaManager::new(QuotaCaps::from(&config.api)));
    let api = Arc::new(ApiClient::new(
        &config.api,
        config.credentials.clone(),
        quota.clone(),
    )?);
    let store = Arc::new(SqliteMatchStore::new(&config.storage.sqlite_path)?);

    let spider = Spider::new(config, api, store, quota)?;
    spider.run().await?;
    Ok(())
}

async fn status(config: Config) -> Result<()> {
    let quota = Arc::new(QuotaManager::new(QuotaCaps::from(&config.api)));
    let api: Arc<dyn TelemetryApi> = Arc::new(ApiClient::new(
        &config.api,
        config.credentials.clone(),
        quota.clone(),
    )?);

    let session = SessionHandle::create(api.clone(), quota, config.session_ttl()).await?;
    let usage = api.data_usage(&session.ensure_live().await?).await?;

    println!("Remote data usage:");
    println!("  Requests today:  {} / {}", usage.total_requests_today, usage.request_limit_daily);
    println!("  Sessions today:  {}", usage.total_sessions_today);
    println!("  Active sessions: {} / {}", usage.active_sessions, usage.session_cap);
    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("matchwatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("matchwatch=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
