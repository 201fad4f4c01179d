use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::file_storage::{Result, StorageError};
use super::{lock, write_atomic, PageIndex};

/// File-backed page index.
///
/// The whole mapping lives in one JSON object and is rewritten atomically on
/// every mutation. It is small (one short entry per page), so a single
/// mutex serializes all writers.
pub struct FilePageIndex {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FilePageIndex {
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All page ids currently mapped to `notebook_id`.
    pub fn pages_in(&self, notebook_id: &str) -> Vec<String> {
        lock(&self.entries)
            .iter()
            .filter(|(_, nb)| nb.as_str() == notebook_id)
            .map(|(page, _)| page.clone())
            .collect()
    }

    /// Replace the whole mapping, e.g. after re-deriving it from disk.
    pub fn replace_all(&self, entries: BTreeMap<String, String>) -> Result<()> {
        let mut current = lock(&self.entries);
        persist(&self.path, &entries)?;
        *current = entries;
        Ok(())
    }
}

fn persist(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    let content = serde_json::to_string_pretty(entries)?;
    write_atomic(path, content.as_bytes())?;
    Ok(())
}

impl PageIndex for FilePageIndex {
    fn register(&self, page_id: &str, notebook_id: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.contains_key(page_id) {
            return Err(StorageError::DuplicatePage(page_id.to_string()));
        }

        entries.insert(page_id.to_string(), notebook_id.to_string());
        if let Err(e) = persist(&self.path, &entries) {
            entries.remove(page_id);
            return Err(e);
        }
        Ok(())
    }

    fn resolve(&self, page_id: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(page_id).cloned())
    }

    fn unregister(&self, page_id: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        let Some(previous) = entries.remove(page_id) else {
            return Ok(());
        };

        if let Err(e) = persist(&self.path, &entries) {
            entries.insert(page_id.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn reassign(&self, page_id: &str, notebook_id: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        let Some(previous) = entries.get(page_id).cloned() else {
            return Err(StorageError::PageNotFound(page_id.to_string()));
        };
        if previous == notebook_id {
            return Ok(());
        }

        entries.insert(page_id.to_string(), notebook_id.to_string());
        if let Err(e) = persist(&self.path, &entries) {
            entries.insert(page_id.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryPageIndex;

    /// Contract shared by every `PageIndex` implementation.
    fn check_index_contract(index: &dyn PageIndex) {
        index.register("pg_1", "nb_a").unwrap();
        assert_eq!(index.resolve("pg_1").unwrap().as_deref(), Some("nb_a"));

        assert!(matches!(
            index.register("pg_1", "nb_b"),
            Err(StorageError::DuplicatePage(_))
        ));

        index.reassign("pg_1", "nb_b").unwrap();
        assert_eq!(index.resolve("pg_1").unwrap().as_deref(), Some("nb_b"));

        assert!(matches!(
            index.reassign("pg_missing", "nb_b"),
            Err(StorageError::PageNotFound(_))
        ));

        index.unregister("pg_1").unwrap();
        assert_eq!(index.resolve("pg_1").unwrap(), None);
        index.unregister("pg_1").unwrap();
    }

    #[test]
    fn test_file_index_contract() {
        let dir = tempfile::tempdir().unwrap();
        let index = FilePageIndex::open(dir.path().join("page_index.json")).unwrap();
        check_index_contract(&index);
    }

    #[test]
    fn test_memory_index_contract() {
        check_index_contract(&MemoryPageIndex::default());
    }

    #[test]
    fn test_file_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_index.json");

        {
            let index = FilePageIndex::open(path.clone()).unwrap();
            index.register("pg_1", "nb_a").unwrap();
            index.register("pg_2", "nb_a").unwrap();
            index.reassign("pg_2", "nb_b").unwrap();
        }

        let index = FilePageIndex::open(path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.resolve("pg_2").unwrap().as_deref(), Some("nb_b"));
        assert_eq!(index.pages_in("nb_a"), vec!["pg_1".to_string()]);
    }
}
