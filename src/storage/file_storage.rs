use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::move_journal::{MoveJournal, PlannedMove, JOURNAL_FILE};
use super::page_index::FilePageIndex;
use super::{
    is_valid_id, lock, read_lock, sync_dir, write_atomic, write_lock, NotebookMeta, PageIndex,
    PageMeta, PageUpdate, Stroke, StrokeStore,
};

const NOTEBOOK_FILE: &str = "notebook.json";
const PAGE_FILE: &str = "page.json";
const STROKES_FILE: &str = "strokes.jsonl";
const INDEX_FILE: &str = "page_index.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notebook not found: {0}")]
    NotebookNotFound(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Stroke {stroke_id} not found on page {page_id}")]
    StrokeNotFound { page_id: String, stroke_id: String },

    #[error("Page {page_id} is already in notebook {notebook_id}")]
    AlreadyInTarget { page_id: String, notebook_id: String },

    #[error("Page already registered: {0}")]
    DuplicatePage(String),

    #[error("Invalid id: {0:?}")]
    InvalidId(String),

    #[error("Invalid stroke: {0}")]
    InvalidStroke(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("An interrupted page move could not be completed: {0}")]
    RecoveryPending(String),

    #[error("Data directory not found")]
    DataDirNotFound,
}

impl StorageError {
    /// Stable machine-readable name, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::NotebookNotFound(_) => "notebookNotFound",
            Self::PageNotFound(_) => "pageNotFound",
            Self::StrokeNotFound { .. } => "strokeNotFound",
            Self::AlreadyInTarget { .. } => "alreadyInTarget",
            Self::DuplicatePage(_) => "duplicatePage",
            Self::InvalidId(_) => "invalidId",
            Self::InvalidStroke(_) => "invalidStroke",
            Self::InvalidOperation(_) => "invalidOperation",
            Self::RecoveryPending(_) => "recoveryPending",
            Self::DataDirNotFound => "dataDirNotFound",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotebookNotFound(_) | Self::PageNotFound(_) | Self::StrokeNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

fn ensure_valid(id: &str) -> Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_atomic(path, content.as_bytes())?;
    Ok(())
}

/// Server-side notebook, page and stroke storage.
///
/// ```text
/// <base>/page_index.json
/// <base>/move_journal.json            (only while a move is unfinished)
/// <base>/notebooks/<nb>/notebook.json
/// <base>/notebooks/<nb>/pages/<pg>/page.json
/// <base>/notebooks/<nb>/pages/<pg>/strokes.jsonl
/// ```
///
/// Lock order is `structure` → per-page lock → index. Stroke operations take
/// `structure` shared plus the page's own lock, so writers to one page
/// serialize while different pages proceed in parallel. Operations that
/// change which pages exist or where they live take `structure` exclusively.
pub struct FileStorage {
    base_path: PathBuf,
    index: FilePageIndex,
    structure: RwLock<()>,
    page_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    move_pending: AtomicBool,
}

impl FileStorage {
    /// Open (creating if needed) the store rooted at `base_path` and finish
    /// any page move that was interrupted by a crash.
    pub fn open(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(base_path.join("notebooks"))?;
        let index = FilePageIndex::open(base_path.join(INDEX_FILE))?;

        let storage = Self {
            base_path,
            index,
            structure: RwLock::new(()),
            page_locks: Mutex::new(HashMap::new()),
            move_pending: AtomicBool::new(false),
        };

        {
            let _structure = write_lock(&storage.structure);
            if let Err(e) = storage.recover_pending_move() {
                log::error!("Page move recovery failed on open: {}", e);
            }
        }

        Ok(storage)
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("inksync").join("server"))
            .ok_or(StorageError::DataDirNotFound)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn index(&self) -> &FilePageIndex {
        &self.index
    }

    // ===== Paths =====

    fn notebooks_dir(&self) -> PathBuf {
        self.base_path.join("notebooks")
    }

    fn notebook_dir(&self, notebook_id: &str) -> PathBuf {
        self.notebooks_dir().join(notebook_id)
    }

    fn notebook_metadata_path(&self, notebook_id: &str) -> PathBuf {
        self.notebook_dir(notebook_id).join(NOTEBOOK_FILE)
    }

    fn pages_dir(&self, notebook_id: &str) -> PathBuf {
        self.notebook_dir(notebook_id).join("pages")
    }

    fn page_dir(&self, notebook_id: &str, page_id: &str) -> PathBuf {
        self.pages_dir(notebook_id).join(page_id)
    }

    fn journal_path(&self) -> PathBuf {
        self.base_path.join(JOURNAL_FILE)
    }

    /// Lock for an existing page. Call only after `locate` succeeded while
    /// holding `structure`, so the map only ever holds live pages.
    fn page_lock(&self, page_id: &str) -> Arc<Mutex<()>> {
        lock(&self.page_locks)
            .entry(page_id.to_string())
            .or_default()
            .clone()
    }

    /// Resolve a page through the index and confirm it exists on disk.
    fn locate(&self, page_id: &str) -> Result<(String, PathBuf)> {
        let notebook_id = self
            .index
            .resolve(page_id)?
            .ok_or_else(|| StorageError::PageNotFound(page_id.to_string()))?;

        let dir = self.page_dir(&notebook_id, page_id);
        if !dir.join(PAGE_FILE).exists() {
            return Err(StorageError::PageNotFound(page_id.to_string()));
        }
        Ok((notebook_id, dir))
    }

    // ===== Notebook Operations =====

    pub fn create_notebook(
        &self,
        title: String,
        settings: Option<serde_json::Value>,
    ) -> Result<NotebookMeta> {
        self.ensure_recovered()?;
        let _structure = write_lock(&self.structure);

        let notebook = NotebookMeta::new(title, settings);
        fs::create_dir_all(self.pages_dir(&notebook.id))?;
        write_json(&self.notebook_metadata_path(&notebook.id), &notebook)?;

        log::info!("Created notebook {}", notebook.id);
        Ok(notebook)
    }

    pub fn get_notebook(&self, notebook_id: &str) -> Result<NotebookMeta> {
        ensure_valid(notebook_id)?;
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);

        let path = self.notebook_metadata_path(notebook_id);
        if !path.exists() {
            return Err(StorageError::NotebookNotFound(notebook_id.to_string()));
        }
        read_json(&path)
    }

    pub fn list_notebooks(&self) -> Result<Vec<NotebookMeta>> {
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);

        let mut notebooks = Vec::new();
        for entry in fs::read_dir(self.notebooks_dir())? {
            let path = entry?.path();
            let metadata_path = path.join(NOTEBOOK_FILE);
            if path.is_dir() && metadata_path.exists() {
                notebooks.push(read_json::<NotebookMeta>(&metadata_path)?);
            }
        }

        // Sort by updated_at descending
        notebooks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notebooks)
    }

    /// Delete a notebook with all of its pages and their index entries.
    pub fn delete_notebook(&self, notebook_id: &str) -> Result<()> {
        ensure_valid(notebook_id)?;
        self.ensure_recovered()?;
        let _structure = write_lock(&self.structure);

        let dir = self.notebook_dir(notebook_id);
        if !dir.join(NOTEBOOK_FILE).exists() {
            return Err(StorageError::NotebookNotFound(notebook_id.to_string()));
        }

        fs::remove_dir_all(&dir)?;
        sync_dir(dir.parent());

        let pages = self.index.pages_in(notebook_id);
        let mut page_locks = lock(&self.page_locks);
        for page_id in &pages {
            self.index.unregister(page_id)?;
            page_locks.remove(page_id);
        }

        log::info!(
            "Deleted notebook {} ({} page(s))",
            notebook_id,
            pages.len()
        );
        Ok(())
    }

    // ===== Page Operations =====

    /// Read every page of a notebook, ordered by page number.
    fn read_pages(&self, notebook_id: &str) -> Result<Vec<PageMeta>> {
        let pages_dir = self.pages_dir(notebook_id);
        if !pages_dir.exists() {
            return Err(StorageError::NotebookNotFound(notebook_id.to_string()));
        }

        let mut pages = Vec::new();
        for entry in fs::read_dir(&pages_dir)? {
            let path = entry?.path().join(PAGE_FILE);
            if path.exists() {
                pages.push(read_json::<PageMeta>(&path)?);
            }
        }

        pages.sort_by_key(|p| p.page_number);
        Ok(pages)
    }

    fn next_page_number(pages: &[PageMeta]) -> u32 {
        pages.iter().map(|p| p.page_number).max().unwrap_or(0) + 1
    }

    /// Rewrite page numbers of a notebook as a dense 1..N sequence.
    fn renumber(&self, notebook_id: &str) -> Result<()> {
        let now = Utc::now();
        for (i, mut page) in self.read_pages(notebook_id)?.into_iter().enumerate() {
            let wanted = i as u32 + 1;
            if page.page_number != wanted {
                page.page_number = wanted;
                page.updated_at = now;
                write_json(&self.page_dir(notebook_id, &page.id).join(PAGE_FILE), &page)?;
            }
        }
        Ok(())
    }

    pub fn list_pages(&self, notebook_id: &str) -> Result<Vec<PageMeta>> {
        ensure_valid(notebook_id)?;
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);
        self.read_pages(notebook_id)
    }

    /// Create an empty page at the end of a notebook.
    pub fn create_page(&self, notebook_id: &str, canvas_x: f64, canvas_y: f64) -> Result<PageMeta> {
        ensure_valid(notebook_id)?;
        self.ensure_recovered()?;
        let _structure = write_lock(&self.structure);

        if !self.notebook_metadata_path(notebook_id).exists() {
            return Err(StorageError::NotebookNotFound(notebook_id.to_string()));
        }

        let pages = self.read_pages(notebook_id)?;
        let page = PageMeta::new(
            notebook_id.to_string(),
            Self::next_page_number(&pages),
            canvas_x,
            canvas_y,
        );

        let dir = self.page_dir(notebook_id, &page.id);
        fs::create_dir_all(&dir)?;
        write_atomic(&dir.join(STROKES_FILE), b"")?;
        write_json(&dir.join(PAGE_FILE), &page)?;

        if let Err(e) = self.index.register(&page.id, notebook_id) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }

        log::debug!(
            "Created page {} as #{} in notebook {}",
            page.id,
            page.page_number,
            notebook_id
        );
        Ok(page)
    }

    pub fn get_page(&self, page_id: &str) -> Result<PageMeta> {
        ensure_valid(page_id)?;
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);

        let (_, dir) = self.locate(page_id)?;
        read_json(&dir.join(PAGE_FILE))
    }

    /// Apply a last-write-wins metadata update.
    pub fn update_page(&self, page_id: &str, update: PageUpdate) -> Result<PageMeta> {
        ensure_valid(page_id)?;
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);
        let (_, dir) = self.locate(page_id)?;
        let page_lock = self.page_lock(page_id);
        let _page = lock(&page_lock);

        let path = dir.join(PAGE_FILE);
        let mut page: PageMeta = read_json(&path)?;
        update.apply(&mut page);
        write_json(&path, &page)?;
        Ok(page)
    }

    /// Delete a page, its strokes and its index entry, then close the gap in
    /// the notebook's page numbering.
    pub fn delete_page(&self, page_id: &str) -> Result<()> {
        ensure_valid(page_id)?;
        self.ensure_recovered()?;
        let _structure = write_lock(&self.structure);

        let (notebook_id, dir) = self.locate(page_id)?;
        fs::remove_dir_all(&dir)?;
        sync_dir(dir.parent());
        self.index.unregister(page_id)?;
        lock(&self.page_locks).remove(page_id);

        self.renumber(&notebook_id)?;
        log::info!("Deleted page {} from notebook {}", page_id, notebook_id);
        Ok(())
    }

    // ===== Move Operations =====

    /// Move pages into `target_notebook_id`, appending them after its last
    /// page in the order given.
    ///
    /// Every id is validated before anything is written. The plan is then
    /// journaled and applied. If applying fails part way the journal is
    /// replayed once on the spot; if that fails too the call returns
    /// `RecoveryPending` and the replay is retried before the next operation
    /// on this store, so callers never observe a half-finished move.
    pub fn move_pages(
        &self,
        page_ids: &[String],
        target_notebook_id: &str,
    ) -> Result<Vec<PageMeta>> {
        ensure_valid(target_notebook_id)?;
        for id in page_ids {
            ensure_valid(id)?;
        }
        let mut unique = HashSet::new();
        if let Some(dup) = page_ids.iter().find(|id| !unique.insert(id.as_str())) {
            return Err(StorageError::InvalidOperation(format!(
                "page {} listed more than once",
                dup
            )));
        }

        self.ensure_recovered()?;
        let _structure = write_lock(&self.structure);

        if !self.notebook_metadata_path(target_notebook_id).exists() {
            return Err(StorageError::NotebookNotFound(
                target_notebook_id.to_string(),
            ));
        }

        let mut sources = Vec::with_capacity(page_ids.len());
        for id in page_ids {
            let (notebook_id, _) = self.locate(id)?;
            sources.push(notebook_id);
        }
        if let Some((id, _)) = page_ids
            .iter()
            .zip(&sources)
            .find(|(_, nb)| nb.as_str() == target_notebook_id)
        {
            return Err(StorageError::AlreadyInTarget {
                page_id: id.clone(),
                notebook_id: target_notebook_id.to_string(),
            });
        }

        let first_number = Self::next_page_number(&self.read_pages(target_notebook_id)?);
        let journal = MoveJournal {
            target_notebook_id: target_notebook_id.to_string(),
            updated_at: Utc::now(),
            pages: page_ids
                .iter()
                .zip(sources)
                .enumerate()
                .map(|(i, (id, source))| PlannedMove {
                    page_id: id.clone(),
                    source_notebook_id: source,
                    page_number: first_number + i as u32,
                })
                .collect(),
        };

        let journal_path = self.journal_path();
        journal.save(&journal_path)?;

        match self.apply_move(&journal) {
            Ok(()) => {
                if let Err(e) = MoveJournal::clear(&journal_path) {
                    // Every step is already applied; a replay would be a no-op.
                    self.move_pending.store(true, Ordering::Release);
                    log::warn!("Failed to remove move journal: {}", e);
                }
            }
            Err(e) => {
                log::warn!(
                    "Move into notebook {} failed part way, replaying once: {}",
                    target_notebook_id,
                    e
                );
                // The journal is committed, so the move can only roll forward.
                // A replay that also fails surfaces as RecoveryPending.
                if let Err(e) = self.recover_pending_move() {
                    log::error!(
                        "Move into notebook {} interrupted, will be replayed: {}",
                        target_notebook_id,
                        e
                    );
                    return Err(e);
                }
            }
        }

        log::info!(
            "Moved {} page(s) into notebook {}",
            journal.pages.len(),
            target_notebook_id
        );

        journal
            .pages
            .iter()
            .map(|p| read_json(&self.page_dir(target_notebook_id, &p.page_id).join(PAGE_FILE)))
            .collect()
    }

    /// Apply a move plan. Safe to call repeatedly with the same plan.
    /// Caller holds `structure` exclusively.
    fn apply_move(&self, journal: &MoveJournal) -> Result<()> {
        for planned in &journal.pages {
            self.move_one(journal, planned)?;
        }
        for source in journal.source_notebooks() {
            if self.pages_dir(source).exists() {
                self.renumber(source)?;
            }
        }
        Ok(())
    }

    fn move_one(&self, journal: &MoveJournal, planned: &PlannedMove) -> Result<()> {
        let target = journal.target_notebook_id.as_str();
        let src = self.page_dir(&planned.source_notebook_id, &planned.page_id);
        let dst = self.page_dir(target, &planned.page_id);

        if src.exists() {
            if dst.exists() {
                return Err(StorageError::InvalidOperation(format!(
                    "page {} exists in both notebook {} and notebook {}",
                    planned.page_id, planned.source_notebook_id, target
                )));
            }
            fs::rename(&src, &dst)?;
            sync_dir(src.parent());
            sync_dir(dst.parent());
        } else if !dst.exists() {
            log::warn!(
                "Page {} vanished during move into notebook {}, skipping",
                planned.page_id,
                target
            );
            return Ok(());
        }

        let meta_path = dst.join(PAGE_FILE);
        let mut page: PageMeta = read_json(&meta_path)?;
        page.notebook_id = target.to_string();
        page.page_number = planned.page_number;
        page.updated_at = journal.updated_at;
        write_json(&meta_path, &page)?;

        match self.index.reassign(&planned.page_id, target) {
            Err(StorageError::PageNotFound(_)) => self.index.register(&planned.page_id, target),
            other => other,
        }
    }

    /// Replay an unfinished move, if any. Caller holds `structure` exclusively.
    fn recover_pending_move(&self) -> Result<()> {
        let journal_path = self.journal_path();
        let Some(journal) = MoveJournal::load(&journal_path)? else {
            self.move_pending.store(false, Ordering::Release);
            return Ok(());
        };

        log::warn!(
            "Replaying unfinished move of {} page(s) into notebook {}",
            journal.pages.len(),
            journal.target_notebook_id
        );

        match self.apply_move(&journal) {
            Ok(()) => {
                MoveJournal::clear(&journal_path)?;
                self.move_pending.store(false, Ordering::Release);
                log::info!("Move into notebook {} recovered", journal.target_notebook_id);
                Ok(())
            }
            Err(e) => {
                self.move_pending.store(true, Ordering::Release);
                Err(StorageError::RecoveryPending(e.to_string()))
            }
        }
    }

    fn ensure_recovered(&self) -> Result<()> {
        if !self.move_pending.load(Ordering::Acquire) {
            return Ok(());
        }
        let _structure = write_lock(&self.structure);
        self.recover_pending_move()
    }

    /// Re-derive the page index from the notebook directories.
    pub fn rebuild_index(&self) -> Result<usize> {
        self.ensure_recovered()?;
        let _structure = write_lock(&self.structure);

        let mut entries = BTreeMap::new();
        for entry in fs::read_dir(self.notebooks_dir())? {
            let notebook_path = entry?.path();
            let Some(notebook_id) = notebook_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let pages_dir = notebook_path.join("pages");
            if !pages_dir.is_dir() {
                continue;
            }
            for page_entry in fs::read_dir(&pages_dir)? {
                let page_path = page_entry?.path();
                if page_path.join(PAGE_FILE).exists() {
                    if let Some(page_id) = page_path.file_name().and_then(|n| n.to_str()) {
                        entries.insert(page_id.to_string(), notebook_id.to_string());
                    }
                }
            }
        }

        let count = entries.len();
        self.index.replace_all(entries)?;
        log::info!("Rebuilt page index with {} entries", count);
        Ok(count)
    }
}

// ===== Stroke files =====

/// Parse a strokes file. The flag is false when the file has a torn or
/// unreadable line and must be rewritten before the next append.
fn read_strokes(path: &Path) -> Result<(Vec<Stroke>, bool)> {
    if !path.exists() {
        return Ok((Vec::new(), true));
    }

    let content = fs::read_to_string(path)?;
    let mut intact = content.is_empty() || content.ends_with('\n');
    let mut strokes = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Stroke>(trimmed) {
            Ok(stroke) => strokes.push(stroke),
            Err(e) => {
                log::warn!("Skipping unreadable stroke line in {:?}: {}", path, e);
                intact = false;
            }
        }
    }

    Ok((strokes, intact))
}

fn encode_lines(strokes: &[Stroke]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for stroke in strokes {
        serde_json::to_writer(&mut buf, stroke)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

fn rewrite_strokes(path: &Path, strokes: &[Stroke]) -> Result<()> {
    write_atomic(path, &encode_lines(strokes)?)?;
    Ok(())
}

fn append_strokes(path: &Path, strokes: &[Stroke]) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&encode_lines(strokes)?)?;
    file.sync_all()?;
    Ok(())
}

impl StrokeStore for FileStorage {
    fn append(&self, page_id: &str, strokes: &[Stroke]) -> Result<usize> {
        ensure_valid(page_id)?;
        for stroke in strokes {
            stroke.validate().map_err(StorageError::InvalidStroke)?;
        }
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);
        let (_, dir) = self.locate(page_id)?;
        let page_lock = self.page_lock(page_id);
        let _page = lock(&page_lock);

        let path = dir.join(STROKES_FILE);
        let (existing, intact) = read_strokes(&path)?;

        let mut seen: HashSet<&str> = existing.iter().map(|s| s.id.as_str()).collect();
        let fresh: Vec<Stroke> = strokes
            .iter()
            .filter(|s| seen.insert(s.id.as_str()))
            .cloned()
            .collect();

        if !intact {
            rewrite_strokes(&path, &existing)?;
        }
        if !fresh.is_empty() {
            append_strokes(&path, &fresh)?;
        }

        let skipped = strokes.len() - fresh.len();
        if skipped > 0 {
            log::debug!(
                "Page {}: skipped {} already-stored stroke(s)",
                page_id,
                skipped
            );
        }
        Ok(existing.len() + fresh.len())
    }

    fn delete(&self, page_id: &str, stroke_id: &str) -> Result<()> {
        ensure_valid(page_id)?;
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);
        let (_, dir) = self.locate(page_id)?;
        let page_lock = self.page_lock(page_id);
        let _page = lock(&page_lock);

        let path = dir.join(STROKES_FILE);
        let (mut strokes, _) = read_strokes(&path)?;

        let pos = strokes
            .iter()
            .position(|s| s.id == stroke_id)
            .ok_or_else(|| StorageError::StrokeNotFound {
                page_id: page_id.to_string(),
                stroke_id: stroke_id.to_string(),
            })?;
        strokes.remove(pos);
        rewrite_strokes(&path, &strokes)
    }

    fn clear(&self, page_id: &str) -> Result<()> {
        ensure_valid(page_id)?;
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);
        let (_, dir) = self.locate(page_id)?;
        let page_lock = self.page_lock(page_id);
        let _page = lock(&page_lock);

        rewrite_strokes(&dir.join(STROKES_FILE), &[])
    }

    fn list(&self, page_id: &str) -> Result<Vec<Stroke>> {
        ensure_valid(page_id)?;
        self.ensure_recovered()?;
        let _structure = read_lock(&self.structure);
        let (_, dir) = self.locate(page_id)?;
        let page_lock = self.page_lock(page_id);
        let _page = lock(&page_lock);

        Ok(read_strokes(&dir.join(STROKES_FILE))?.0)
    }
}
