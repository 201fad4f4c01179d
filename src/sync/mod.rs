pub mod cache;
pub mod client;
pub mod network;
pub mod queue;
pub mod scheduler;

pub use cache::{MemoryStrokeCache, StrokeCache};
pub use client::{ClientError, FailureKind, HttpStrokeClient, StrokeApi, SubmitError};
pub use network::NetworkStatusMonitor;
pub use queue::{DurableQueue, PendingEntry, QueueError};
pub use scheduler::{
    Backoff, DrainMessage, DrainOutcome, DrainReport, DrainSettings, DrainState, SyncDrainLoop,
    SyncHandle, SyncStatus,
};
