use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{is_valid_id, lock, write_atomic, Stroke};

const QUEUE_FILE: &str = "queue.json";
const LOCK_FILE: &str = "queue.lock";

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid page id: {0:?}")]
    InvalidPageId(String),
    #[error("Refusing to queue an empty batch for page {0}")]
    EmptyBatch(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// One atomic append request waiting to reach the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    /// Local sequence number, strictly increasing and never reused
    pub id: u64,
    pub page_id: String,
    pub strokes: Vec<Stroke>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueFile {
    next_id: u64,
    entries: Vec<PendingEntry>,
}

impl Default for QueueFile {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

impl QueueFile {
    fn read(path: &Path) -> Result<Self> {
        let mut state: QueueFile = match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => QueueFile::default(),
            Err(e) => return Err(e.into()),
        };

        // Keep ids monotonic even if the counter was hand-edited.
        if let Some(max) = state.entries.iter().map(|e| e.id).max() {
            state.next_id = state.next_id.max(max + 1);
        }
        Ok(state)
    }
}

struct Shared {
    file_lock: RwLock<File>,
    /// Last state read from or written to disk
    snapshot: QueueFile,
}

/// Persistent FIFO of pending stroke batches.
///
/// The full queue is one JSON document replaced atomically on every
/// mutation, so after a crash it reopens with exactly the last state that
/// was acknowledged to a caller.
///
/// Several handles, in one process or many (a running drain loop next to a
/// CLI `enqueue`), may share a directory. Every access takes an exclusive
/// lock on `queue.lock` and works from the file on disk, never from a stale
/// in-memory copy.
pub struct DurableQueue {
    path: PathBuf,
    shared: Mutex<Shared>,
}

impl DurableQueue {
    /// Open the queue stored in `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(QUEUE_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        let mut file_lock = RwLock::new(lock_file);

        let snapshot = {
            let _guard = file_lock.write()?;
            QueueFile::read(&path)?
        };

        log::debug!(
            "Opened sync queue {:?} with {} pending batch(es)",
            path,
            snapshot.entries.len()
        );

        Ok(Self {
            path,
            shared: Mutex::new(Shared {
                file_lock,
                snapshot,
            }),
        })
    }

    /// Re-read the queue under the file lock, apply `f` and persist the
    /// result if `f` reports a change.
    fn mutate<R>(&self, f: impl FnOnce(&mut QueueFile) -> (R, bool)) -> Result<R> {
        let mut shared = lock(&self.shared);
        let Shared {
            file_lock,
            snapshot,
        } = &mut *shared;
        let _guard = file_lock.write()?;

        let mut next = QueueFile::read(&self.path)?;
        let (result, changed) = f(&mut next);
        if changed {
            let data = serde_json::to_string_pretty(&next)?;
            write_atomic(&self.path, data.as_bytes())?;
        }
        *snapshot = next;
        Ok(result)
    }

    /// Run `f` on the current on-disk state. If the file cannot be read the
    /// last known state is used instead.
    fn inspect<R>(&self, f: impl FnOnce(&QueueFile) -> R) -> R {
        let mut shared = lock(&self.shared);
        let Shared {
            file_lock,
            snapshot,
        } = &mut *shared;

        let current = file_lock
            .write()
            .map_err(QueueError::from)
            .and_then(|_guard| QueueFile::read(&self.path));
        match current {
            Ok(current) => *snapshot = current,
            Err(e) => log::warn!(
                "Could not re-read sync queue {:?}, using last known state: {}",
                self.path,
                e
            ),
        }
        f(snapshot)
    }

    /// Persist a new batch for `page_id` and return it.
    pub fn enqueue(&self, page_id: &str, strokes: Vec<Stroke>) -> Result<PendingEntry> {
        if !is_valid_id(page_id) {
            return Err(QueueError::InvalidPageId(page_id.to_string()));
        }
        if strokes.is_empty() {
            return Err(QueueError::EmptyBatch(page_id.to_string()));
        }

        let entry = self.mutate(|queue| {
            let entry = PendingEntry {
                id: queue.next_id,
                page_id: page_id.to_string(),
                strokes,
                created_at: Utc::now(),
            };
            queue.next_id += 1;
            queue.entries.push(entry.clone());
            (entry, true)
        })?;

        log::debug!(
            "Queued batch {} for page {} ({} stroke(s))",
            entry.id,
            entry.page_id,
            entry.strokes.len()
        );
        Ok(entry)
    }

    /// All pending entries in enqueue order.
    pub fn peek_all_pending(&self) -> Vec<PendingEntry> {
        self.inspect(|queue| queue.entries.clone())
    }

    /// Remove one entry. Removing an id that is not queued is a no-op.
    pub fn remove_pending_entry(&self, id: u64) -> Result<()> {
        self.mutate(|queue| {
            let before = queue.entries.len();
            queue.entries.retain(|e| e.id != id);
            ((), queue.entries.len() != before)
        })
    }

    /// Drop entries older than `max_age` and return how many were removed.
    pub fn purge_stale_entries(&self, max_age: Duration) -> Result<usize> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.purge_older_than(cutoff)
    }

    /// Drop entries created before `cutoff` and return how many were removed.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.mutate(|queue| {
            let before = queue.entries.len();
            queue.entries.retain(|e| e.created_at >= cutoff);
            let removed = before - queue.entries.len();
            (removed, removed > 0)
        })?;

        if removed > 0 {
            log::info!("Purged {} stale batch(es) older than {}", removed, cutoff);
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.inspect(|queue| queue.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
