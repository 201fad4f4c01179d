use std::sync::Arc;

use anyhow::{Context, Result};

use inksync_lib::config::Config;
use inksync_lib::sync::{
    DurableQueue, HttpStrokeClient, MemoryStrokeCache, NetworkStatusMonitor, SyncDrainLoop,
};

/// Services shared by the CLI commands, built once from the config
pub struct App {
    pub config: Config,
    pub queue: Arc<DurableQueue>,
    pub client: Arc<HttpStrokeClient>,
    pub network: NetworkStatusMonitor,
    pub engine: SyncDrainLoop,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let queue_dir = config
            .resolved_queue_dir()
            .context("Failed to get queue directory")?;
        let queue = Arc::new(
            DurableQueue::open(&queue_dir)
                .with_context(|| format!("Failed to open queue in {}", queue_dir.display()))?,
        );

        let client = Arc::new(
            HttpStrokeClient::new(&config.client.server_url, config.client.request_timeout())
                .context("Failed to create HTTP client")?,
        );

        let network = NetworkStatusMonitor::default();
        let engine = SyncDrainLoop::new(
            queue.clone(),
            client.clone(),
            Arc::new(MemoryStrokeCache::new()),
            network.clone(),
            config.client.drain_settings(),
        );

        Ok(Self {
            config,
            queue,
            client,
            network,
            engine,
        })
    }

    /// Refresh the online signal from a single health probe, unless the
    /// probe is disabled in the config.
    pub async fn probe_once(&self) -> bool {
        if self.config.client.probe_interval().is_some() {
            let reachable = self.client.ping().await;
            self.network.set_online(reachable);
        }
        self.network.is_online()
    }
}
