//! The `vonnegut` server binary: loads a TOML config, opens the storage
//! engine, and serves the wire protocol until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vonnegut::chain::{ChainClient, ChainMap, Supervisor};
use vonnegut::config::{ChainConfig, Config};
use vonnegut::server;
use vonnegut::storage::{FdCache, TopicRegistry};

#[derive(Debug, Error)]
enum Error {
    #[error("usage: vonnegut --config <path>")]
    Usage,

    #[error(transparent)]
    Config(#[from] vonnegut::config::Error),

    #[error(transparent)]
    Storage(#[from] vonnegut::storage::Error),

    #[error(transparent)]
    Server(#[from] server::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "vonnegut exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let config_path = parse_args()?;
    let config = Config::load(&config_path)?;

    let registry = Arc::new(TopicRegistry::new(
        config.log_dirs.clone(),
        config.segment_bytes,
        config.index_interval_bytes,
    ));
    registry.recover()?;

    let downstream = match &config.chain {
        ChainConfig::Tail => None,
        ChainConfig::Forward { next } => Some(Arc::new(ChainClient::new(
            *next,
            config.client.replicate_timeout(),
        ))),
    };

    let role = config.role.into();
    let supervisor = Arc::new(Supervisor::new(Arc::clone(&registry), role, downstream));
    let chain_map = Arc::new(ChainMap::new(
        config.chains.iter().cloned().map(Into::into).collect(),
    ));
    let fd_cache = Arc::new(FdCache::new(config.fd_cache_capacity()));

    let addr = format!("0.0.0.0:{}", config.port)
        .parse()
        .expect("formatted from a valid u16 port");

    let shutdown = Arc::new(Notify::new());
    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, shutting down");
        }
        signal_shutdown.notify_waiters();
    });

    server::serve(addr, role, supervisor, chain_map, fd_cache, shutdown.notified()).await?;
    Ok(())
}

fn parse_args() -> Result<PathBuf, Error> {
    let mut args = std::env::args().skip(1);
    loop {
        match args.next() {
            Some(flag) if flag == "--config" => {
                return args.next().map(PathBuf::from).ok_or(Error::Usage);
            }
            Some(_) => continue,
            None => return Err(Error::Usage),
        }
    }
}
