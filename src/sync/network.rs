use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::client::HttpStrokeClient;

/// Shared online/offline signal.
///
/// Cloning yields another handle onto the same signal. The value defaults
/// to online so a client without any reachability feed still drains.
#[derive(Clone)]
pub struct NetworkStatusMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for NetworkStatusMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkStatusMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the signal. Returns `true` if this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                log::info!("Network: back online");
            } else {
                log::info!("Network: offline");
            }
        }
        changed
    }

    /// Receiver that wakes on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Periodically probe the server and feed the result into this monitor.
    pub fn spawn_probe(&self, client: Arc<HttpStrokeClient>, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            log::info!(
                "Network: probing {} every {}s",
                client.base_url(),
                interval.as_secs()
            );
            loop {
                let reachable = client.ping().await;
                monitor.set_online(reachable);
                tokio::time::sleep(interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_online() {
        assert!(NetworkStatusMonitor::default().is_online());
    }

    #[test]
    fn test_repeated_value_is_not_a_transition() {
        let monitor = NetworkStatusMonitor::new(true);
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let monitor = NetworkStatusMonitor::new(true);
        let mut rx = monitor.subscribe();

        let other = monitor.clone();
        other.set_online(false);

        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
        assert!(!monitor.is_online());
    }
}
