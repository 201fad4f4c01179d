use anyhow::{Context, Result};

use crate::app::App;

pub async fn run(app: &App) -> Result<()> {
    let probe = app
        .config
        .client
        .probe_interval()
        .map(|interval| app.network.spawn_probe(app.client.clone(), interval));

    let handle = app.engine.spawn();
    let mut status = app.engine.subscribe();

    log::info!(
        "Draining {} pending batch(es) to {}; press Ctrl-C to stop",
        app.queue.len(),
        app.client.base_url()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let s = status.borrow_and_update().clone();
                log::debug!(
                    "Sync status: {:?}, online={}, pending={}, backoff={}s",
                    s.state,
                    s.online,
                    s.pending,
                    s.backoff_secs
                );
            }
        }
    }

    log::info!("Stopping; {} batch(es) remain queued", app.queue.len());
    handle.shutdown().await;
    if let Some(probe) = probe {
        probe.abort();
    }
    Ok(())
}
