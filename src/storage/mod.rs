mod file_storage;
pub mod memory;
mod models;
pub mod move_journal;
mod page_index;

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use file_storage::{FileStorage, Result, StorageError};
pub use memory::{MemoryPageIndex, MemoryStrokeStore};
pub use models::*;
pub use page_index::FilePageIndex;

/// Append-only stroke storage for pages.
///
/// Implementations must make every mutation durable before returning `Ok`.
/// Appends skip strokes whose id is already stored on the page, which is
/// what makes client retries of an already-applied batch harmless.
pub trait StrokeStore: Send + Sync {
    /// Append after the existing strokes and return the new total.
    fn append(&self, page_id: &str, strokes: &[Stroke]) -> Result<usize>;

    /// Remove exactly one stroke, keeping the order of the rest.
    fn delete(&self, page_id: &str, stroke_id: &str) -> Result<()>;

    fn clear(&self, page_id: &str) -> Result<()>;

    /// Strokes in creation order; empty for a page with none.
    fn list(&self, page_id: &str) -> Result<Vec<Stroke>>;
}

/// Global page id → notebook id lookup.
pub trait PageIndex: Send + Sync {
    /// Fails with `DuplicatePage` if the id is already registered.
    fn register(&self, page_id: &str, notebook_id: &str) -> Result<()>;

    fn resolve(&self, page_id: &str) -> Result<Option<String>>;

    /// Removing an unknown id is a no-op.
    fn unregister(&self, page_id: &str) -> Result<()>;

    /// Fails with `PageNotFound` if the id is not registered.
    fn reassign(&self, page_id: &str, notebook_id: &str) -> Result<()>;
}

/// Write `data` to `path` so that readers see either the old or the new
/// contents, never a torn file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    sync_dir(path.parent());
    Ok(())
}

/// Flush a directory entry after a rename. Not every platform allows
/// opening a directory, so failures are ignored.
pub(crate) fn sync_dir(dir: Option<&Path>) {
    if let Some(dir) = dir {
        if let Ok(handle) = fs::File::open(dir) {
            let _ = handle.sync_all();
        }
    }
}

// Poisoning only means another thread panicked while holding the guard.
// Every structure guarded here is either `()` or re-read from disk, so the
// inner value is still usable.

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
