use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::storage::{lock, Stroke};

/// Local read cache that confirmed strokes are mirrored into.
pub trait StrokeCache: Send + Sync {
    fn mirror(&self, page_id: &str, strokes: &[Stroke]);

    fn strokes(&self, page_id: &str) -> Vec<Stroke>;
}

/// Cache kept in process memory, deduplicated by stroke id.
#[derive(Default)]
pub struct MemoryStrokeCache {
    pages: Mutex<HashMap<String, Vec<Stroke>>>,
}

impl MemoryStrokeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StrokeCache for MemoryStrokeCache {
    fn mirror(&self, page_id: &str, strokes: &[Stroke]) {
        let mut pages = lock(&self.pages);
        let cached = pages.entry(page_id.to_string()).or_default();
        let mut seen: HashSet<String> = cached.iter().map(|s| s.id.clone()).collect();
        for stroke in strokes {
            if seen.insert(stroke.id.clone()) {
                cached.push(stroke.clone());
            }
        }
    }

    fn strokes(&self, page_id: &str) -> Vec<Stroke> {
        lock(&self.pages).get(page_id).cloned().unwrap_or_default()
    }
}
