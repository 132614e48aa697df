//! Tally coordinator binary.
//!
//! # Usage
//!
//! ```bash
//! # In-memory ledger with the default counters and accounts
//! tally-server --bind 127.0.0.1:3000
//!
//! # Persistent ledger with a config file
//! tally-server --config tally.json --data-dir ./data
//! ```

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use tally_coordinator::{Coordinator, Server};
use tally_ledger::{JsonFileStore, LedgerStore, MemoryStore};
use tally_types::{CoordinatorConfig, constants};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Tally lock-and-ledger coordinator
#[derive(Parser, Debug)]
#[command(name = "tally-server")]
#[command(about = "Shared decimal counters with per-counter and global locks")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Directory for the JSON file store (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let fmt_layer = if args.json_logs {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };
    tracing_subscriber::registry().with(fmt_layer).with(filter).init();

    tracing::info!("{} coordinator v{} starting", constants::ENGINE_NAME, constants::VERSION);

    let mut config = match &args.config {
        Some(path) => CoordinatorConfig::from_json_file(path)?,
        None => CoordinatorConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listen_addr = bind;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }
    config.validate()?;

    match config.data_dir.clone() {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Using JSON file store");
            serve(&config, JsonFileStore::open(dir)?).await?;
        }
        None => {
            tracing::warn!("No data directory configured - balances live in memory only");
            serve(&config, MemoryStore::new()).await?;
        }
    }

    Ok(())
}

async fn serve<S: LedgerStore>(
    config: &CoordinatorConfig,
    store: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = Coordinator::with_credentials(config, store)?;
    let server = Server::bind(config.listen_addr, coordinator).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
