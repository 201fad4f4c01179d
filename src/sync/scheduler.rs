use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::cache::StrokeCache;
use super::client::{FailureKind, StrokeApi, SubmitError};
use super::network::NetworkStatusMonitor;
use super::queue::DurableQueue;
use crate::storage::lock;

/// Delay between drain passes when nothing is failing
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(5);
/// First backoff step after a transient failure
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(5);
/// Backoff never grows past this
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);
/// Pending batches older than this are dropped when the loop starts
pub const DEFAULT_STALE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct DrainSettings {
    pub base_interval: Duration,
    pub backoff_unit: Duration,
    pub backoff_max: Duration,
    pub stale_max_age: Duration,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            backoff_max: DEFAULT_BACKOFF_MAX,
            stale_max_age: DEFAULT_STALE_MAX_AGE,
        }
    }
}

/// Exponential backoff: 0, then `unit`, doubling up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    unit: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(unit: Duration, max: Duration) -> Self {
        Self {
            unit,
            max,
            current: Duration::ZERO,
        }
    }

    /// Record a transient failure and return the new backoff.
    pub fn fail(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            self.unit
        } else {
            self.current.saturating_mul(2)
        }
        .min(self.max);
        self.current
    }

    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DrainState {
    Idle,
    Draining,
    BackingOff,
}

/// Snapshot published to observers after every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: DrainState,
    pub online: bool,
    pub pending: usize,
    pub backoff_secs: u64,
    pub last_error_kind: Option<FailureKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DrainOutcome {
    /// Every entry was either accepted or discarded
    Completed,
    /// A transient failure stopped the pass
    BackingOff,
    /// The network dropped; remaining entries wait for reconnection
    WentOffline,
    /// The engine was shut down mid-pass
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub submitted: usize,
    pub discarded: usize,
    pub outcome: DrainOutcome,
}

/// Messages to control a running drain loop
#[derive(Debug)]
pub enum DrainMessage {
    /// Start a pass now instead of waiting for the timer
    TriggerNow,
    Shutdown,
}

/// Held for the duration of a pass; releases the single-flight flag even
/// if the pass future is dropped.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct Inner {
    queue: Arc<DurableQueue>,
    api: Arc<dyn StrokeApi>,
    cache: Arc<dyn StrokeCache>,
    network: NetworkStatusMonitor,
    settings: DrainSettings,
    draining: AtomicBool,
    torn_down: AtomicBool,
    backoff: Mutex<Backoff>,
    last_error: Mutex<Option<FailureKind>>,
    status: watch::Sender<SyncStatus>,
}

impl Inner {
    fn publish(&self, state: DrainState) {
        let status = SyncStatus {
            state,
            online: self.network.is_online(),
            pending: self.queue.len(),
            backoff_secs: lock(&self.backoff).current().as_secs(),
            last_error_kind: *lock(&self.last_error),
        };
        self.status.send_replace(status);
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    async fn drain_guarded(&self) -> Option<DrainReport> {
        let _guard = DrainGuard::acquire(&self.draining)?;
        Some(self.run_pass().await)
    }

    /// One drain pass over a snapshot of the queue, oldest first.
    async fn run_pass(&self) -> DrainReport {
        let entries = self.queue.peek_all_pending();
        let mut submitted = 0;
        let mut discarded = 0;
        let mut outcome = DrainOutcome::Completed;

        if !entries.is_empty() {
            log::debug!("Sync: draining {} pending batch(es)", entries.len());
        }
        self.publish(DrainState::Draining);

        for entry in entries {
            if self.is_torn_down() {
                outcome = DrainOutcome::Cancelled;
                break;
            }
            if !self.network.is_online() {
                outcome = DrainOutcome::WentOffline;
                break;
            }

            let result = self.api.append_strokes(&entry.page_id, &entry.strokes).await;

            // Teardown while the request was in flight: forget the result so
            // the entry is retried on the next start.
            if self.is_torn_down() {
                outcome = DrainOutcome::Cancelled;
                break;
            }

            match result {
                Ok(count) => {
                    if let Err(e) = self.queue.remove_pending_entry(entry.id) {
                        // The server dedupes by stroke id, so resending later is harmless.
                        log::error!("Sync: failed to remove delivered batch {}: {}", entry.id, e);
                    }
                    self.cache.mirror(&entry.page_id, &entry.strokes);
                    lock(&self.backoff).reset();
                    submitted += 1;
                    log::debug!(
                        "Sync: batch {} delivered to page {} ({} stroke(s) on page)",
                        entry.id,
                        entry.page_id,
                        count
                    );
                }
                Err(SubmitError::Permanent(message)) => {
                    log::warn!(
                        "Sync: discarding batch {} for page {} ({} stroke(s)): {}",
                        entry.id,
                        entry.page_id,
                        entry.strokes.len(),
                        message
                    );
                    if let Err(e) = self.queue.remove_pending_entry(entry.id) {
                        log::error!("Sync: failed to remove rejected batch {}: {}", entry.id, e);
                    }
                    *lock(&self.last_error) = Some(FailureKind::Permanent);
                    discarded += 1;
                }
                Err(SubmitError::Transient(message)) => {
                    *lock(&self.last_error) = Some(FailureKind::Transient);
                    if !self.network.is_online() {
                        outcome = DrainOutcome::WentOffline;
                        break;
                    }
                    let backoff = lock(&self.backoff).fail();
                    log::info!(
                        "Sync: batch {} for page {} failed ({}), backing off {}s",
                        entry.id,
                        entry.page_id,
                        message,
                        backoff.as_secs()
                    );
                    outcome = DrainOutcome::BackingOff;
                    break;
                }
            }

            tokio::task::yield_now().await;
        }

        match outcome {
            DrainOutcome::Completed => {
                lock(&self.backoff).reset();
                self.publish(DrainState::Idle);
            }
            DrainOutcome::WentOffline => {
                lock(&self.backoff).reset();
                self.publish(DrainState::Idle);
            }
            DrainOutcome::BackingOff => self.publish(DrainState::BackingOff),
            DrainOutcome::Cancelled => {}
        }

        if submitted > 0 || discarded > 0 || outcome != DrainOutcome::Completed {
            log::info!(
                "Sync: pass finished ({:?}), {} delivered, {} discarded, {} pending",
                outcome,
                submitted,
                discarded,
                self.queue.len()
            );
        }

        DrainReport {
            submitted,
            discarded,
            outcome,
        }
    }
}

/// Drains the durable queue into the remote stroke API.
///
/// Cloning is cheap and every clone drives the same engine, so at most one
/// pass runs at a time no matter how many callers trigger one.
#[derive(Clone)]
pub struct SyncDrainLoop {
    inner: Arc<Inner>,
}

impl SyncDrainLoop {
    pub fn new(
        queue: Arc<DurableQueue>,
        api: Arc<dyn StrokeApi>,
        cache: Arc<dyn StrokeCache>,
        network: NetworkStatusMonitor,
        settings: DrainSettings,
    ) -> Self {
        let initial = SyncStatus {
            state: DrainState::Idle,
            online: network.is_online(),
            pending: queue.len(),
            backoff_secs: 0,
            last_error_kind: None,
        };
        let (status, _rx) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                queue,
                api,
                cache,
                network,
                backoff: Mutex::new(Backoff::new(settings.backoff_unit, settings.backoff_max)),
                settings,
                draining: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
                last_error: Mutex::new(None),
                status,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    /// Wait before the next timer-driven pass: base interval plus backoff.
    pub fn next_delay(&self) -> Duration {
        self.inner.settings.base_interval + lock(&self.inner.backoff).current()
    }

    /// Run a single pass now. Returns `None` if a pass is already running.
    pub async fn drain_once(&self) -> Option<DrainReport> {
        self.inner.drain_guarded().await
    }

    /// Start the timer-driven loop on the current tokio runtime.
    pub fn spawn(&self) -> SyncHandle {
        let (tx, rx) = mpsc::channel(16);
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            drain_loop(inner, rx).await;
        });

        SyncHandle {
            sender: tx,
            inner: self.inner.clone(),
            task: Some(task),
        }
    }
}

async fn drain_loop(inner: Arc<Inner>, mut receiver: mpsc::Receiver<DrainMessage>) {
    log::info!("Sync drain loop started");

    match inner.queue.purge_stale_entries(inner.settings.stale_max_age) {
        Ok(removed) => log::info!("Sync: startup purge removed {} stale batch(es)", removed),
        Err(e) => log::error!("Sync: startup purge failed: {}", e),
    }

    let mut online_rx = inner.network.subscribe();
    online_rx.borrow_and_update();
    inner.publish(DrainState::Idle);

    let mut drain_now = true;

    'outer: loop {
        if drain_now && inner.network.is_online() && !inner.is_torn_down() {
            let pass = inner.drain_guarded();
            tokio::pin!(pass);
            loop {
                tokio::select! {
                    _ = &mut pass => break,
                    msg = receiver.recv() => match msg {
                        // Already draining.
                        Some(DrainMessage::TriggerNow) => continue,
                        Some(DrainMessage::Shutdown) | None => break 'outer,
                    },
                }
            }
        }
        drain_now = false;

        let delay = inner.settings.base_interval + lock(&inner.backoff).current();

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                drain_now = true;
            }

            Ok(()) = online_rx.changed() => {
                let online = *online_rx.borrow_and_update();
                if online {
                    log::info!("Sync: connectivity restored, draining now");
                    drain_now = true;
                } else {
                    lock(&inner.backoff).reset();
                    inner.publish(DrainState::Idle);
                }
            }

            msg = receiver.recv() => match msg {
                Some(DrainMessage::TriggerNow) => {
                    drain_now = true;
                }
                Some(DrainMessage::Shutdown) | None => break 'outer,
            },
        }
    }

    inner.publish(DrainState::Idle);
    log::info!("Sync drain loop stopped");
}

/// Handle for a running drain loop. Dropping it tears the loop down.
pub struct SyncHandle {
    sender: mpsc::Sender<DrainMessage>,
    inner: Arc<Inner>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Ask for a pass now. Ignored if one is already running.
    pub fn trigger(&self) {
        let _ = self.sender.try_send(DrainMessage::TriggerNow);
    }

    /// Stop the loop and wait for it to exit. A request still in flight is
    /// abandoned and its entry stays queued.
    pub async fn shutdown(mut self) {
        self.inner.torn_down.store(true, Ordering::Release);
        let _ = self.sender.send(DrainMessage::Shutdown).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.inner.torn_down.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
