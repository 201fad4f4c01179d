use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use inksync_lib::config::Config;
use inksync_lib::server;
use inksync_lib::storage::FileStorage;

#[derive(Parser)]
#[command(name = "inksync", about = "Page and stroke store served over HTTP", version)]
struct Args {
    /// Config file (default: <config dir>/inksync/inksync.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address from the config
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Override the data directory from the config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Re-derive the page index from the notebook directories before serving
    #[arg(long)]
    rebuild_index: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(dir) = args.data_dir {
        config.server.data_dir = Some(dir);
    }

    let data_dir = config
        .resolved_data_dir()
        .context("Failed to get data directory")?;

    // Opening replays any page move that was interrupted by a crash.
    let rebuild_index = args.rebuild_index;
    let storage = tokio::task::spawn_blocking(move || {
        let storage = FileStorage::open(data_dir)?;
        if rebuild_index {
            storage.rebuild_index()?;
        }
        Ok::<_, inksync_lib::storage::StorageError>(storage)
    })
    .await
    .context("Storage task panicked")?
    .context("Failed to open storage")?;
    log::info!("Serving data from {}", storage.base_path().display());

    let server = server::start_server(Arc::new(storage), config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    log::info!("Ctrl-C received, stopping");
    server.stop().await;
    Ok(())
}
