use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use logbook::config::Config;
use logbook::server::{self, AppState, BasicCredentials};
use logbook_db::Storage;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(version, about = "Logbook log collection server")]
struct Cli {
    /// Path to configuration file (TOML)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config file)
    #[clap(long)]
    bind: Option<String>,

    /// Port (overrides config file)
    #[clap(long)]
    port: Option<u16>,

    /// Database path (overrides config file)
    #[clap(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db_path) = cli.db_path {
        config.database.path = db_path;
    }

    init_tracing(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid bind address")?;

    // Storage is unusable if open fails; treat it as fatal.
    let storage = Arc::new(
        Storage::open(&config.database.path, config.storage_config())
            .context("can't open database")?,
    );

    let state = AppState {
        storage: storage.clone(),
        auth: config
            .auth
            .credentials()
            .map(|(username, password)| BasicCredentials { username, password }),
    };

    server::run(addr, server::router(state)).await?;

    // The router is gone once the server stops, so this is the last handle.
    match Arc::try_unwrap(storage) {
        Ok(storage) => storage.close(),
        Err(_) => tracing::warn!("storage handle still shared at shutdown"),
    }

    Ok(())
}

/// Initialize the tracing subscriber, teeing output to the configured log
/// file when one is set.
fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log.path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("error opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout.and(Arc::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}
