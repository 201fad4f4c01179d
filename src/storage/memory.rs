//! In-memory implementations of the storage seams.
//!
//! They follow the same contracts as the file-backed store and are used to
//! exercise the sync engine without touching disk.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::file_storage::{Result, StorageError};
use super::{lock, PageIndex, Stroke, StrokeStore};

#[derive(Default)]
pub struct MemoryStrokeStore {
    pages: Mutex<HashMap<String, Vec<Stroke>>>,
}

impl MemoryStrokeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages<I, S>(page_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for id in page_ids {
            store.add_page(id);
        }
        store
    }

    pub fn add_page(&self, page_id: impl Into<String>) {
        lock(&self.pages).entry(page_id.into()).or_default();
    }

    pub fn remove_page(&self, page_id: &str) {
        lock(&self.pages).remove(page_id);
    }
}

impl StrokeStore for MemoryStrokeStore {
    fn append(&self, page_id: &str, strokes: &[Stroke]) -> Result<usize> {
        for stroke in strokes {
            stroke.validate().map_err(StorageError::InvalidStroke)?;
        }

        let mut pages = lock(&self.pages);
        let existing = pages
            .get_mut(page_id)
            .ok_or_else(|| StorageError::PageNotFound(page_id.to_string()))?;

        let mut seen: HashSet<String> = existing.iter().map(|s| s.id.clone()).collect();
        for stroke in strokes {
            if seen.insert(stroke.id.clone()) {
                existing.push(stroke.clone());
            }
        }
        Ok(existing.len())
    }

    fn delete(&self, page_id: &str, stroke_id: &str) -> Result<()> {
        let mut pages = lock(&self.pages);
        let existing = pages
            .get_mut(page_id)
            .ok_or_else(|| StorageError::PageNotFound(page_id.to_string()))?;

        let pos = existing
            .iter()
            .position(|s| s.id == stroke_id)
            .ok_or_else(|| StorageError::StrokeNotFound {
                page_id: page_id.to_string(),
                stroke_id: stroke_id.to_string(),
            })?;
        existing.remove(pos);
        Ok(())
    }

    fn clear(&self, page_id: &str) -> Result<()> {
        lock(&self.pages)
            .get_mut(page_id)
            .ok_or_else(|| StorageError::PageNotFound(page_id.to_string()))?
            .clear();
        Ok(())
    }

    fn list(&self, page_id: &str) -> Result<Vec<Stroke>> {
        lock(&self.pages)
            .get(page_id)
            .cloned()
            .ok_or_else(|| StorageError::PageNotFound(page_id.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryPageIndex {
    entries: Mutex<HashMap<String, String>>,
}

impl PageIndex for MemoryPageIndex {
    fn register(&self, page_id: &str, notebook_id: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.contains_key(page_id) {
            return Err(StorageError::DuplicatePage(page_id.to_string()));
        }
        entries.insert(page_id.to_string(), notebook_id.to_string());
        Ok(())
    }

    fn resolve(&self, page_id: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(page_id).cloned())
    }

    fn unregister(&self, page_id: &str) -> Result<()> {
        lock(&self.entries).remove(page_id);
        Ok(())
    }

    fn reassign(&self, page_id: &str, notebook_id: &str) -> Result<()> {
        match lock(&self.entries).get_mut(page_id) {
            Some(nb) => {
                *nb = notebook_id.to_string();
                Ok(())
            }
            None => Err(StorageError::PageNotFound(page_id.to_string())),
        }
    }
}
