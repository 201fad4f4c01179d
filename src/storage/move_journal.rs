//! Roll-forward journal for multi-page moves.
//!
//! A move is planned in full (including every assigned page number) and the
//! plan is written here before any page is touched. Each step of applying
//! the plan is idempotent, so a move interrupted by an error or a crash is
//! finished by replaying the journal. The file is removed once every page
//! has landed in the target notebook.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::write_atomic;

pub const JOURNAL_FILE: &str = "move_journal.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoveJournal {
    pub target_notebook_id: String,
    pub updated_at: DateTime<Utc>,
    pub pages: Vec<PlannedMove>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlannedMove {
    pub page_id: String,
    pub source_notebook_id: String,
    pub page_number: u32,
}

impl MoveJournal {
    /// Source notebooks in first-seen order, without duplicates.
    pub fn source_notebooks(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for page in &self.pages {
            if !sources.contains(&page.source_notebook_id.as_str()) {
                sources.push(&page.source_notebook_id);
            }
        }
        sources
    }

    pub fn load(path: &Path) -> std::io::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        write_atomic(path, data.as_bytes())
    }

    pub fn clear(path: &Path) -> std::io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_notebooks_deduplicated() {
        let journal = MoveJournal {
            target_notebook_id: "nb_t".to_string(),
            updated_at: Utc::now(),
            pages: vec![
                PlannedMove {
                    page_id: "pg_1".to_string(),
                    source_notebook_id: "nb_a".to_string(),
                    page_number: 3,
                },
                PlannedMove {
                    page_id: "pg_2".to_string(),
                    source_notebook_id: "nb_b".to_string(),
                    page_number: 4,
                },
                PlannedMove {
                    page_id: "pg_3".to_string(),
                    source_notebook_id: "nb_a".to_string(),
                    page_number: 5,
                },
            ],
        };
        assert_eq!(journal.source_notebooks(), vec!["nb_a", "nb_b"]);
    }

    #[test]
    fn test_journal_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(JOURNAL_FILE);
        assert!(MoveJournal::load(&path).unwrap().is_none());

        let journal = MoveJournal {
            target_notebook_id: "nb_t".to_string(),
            updated_at: Utc::now(),
            pages: Vec::new(),
        };
        journal.save(&path).unwrap();
        assert_eq!(MoveJournal::load(&path).unwrap(), Some(journal));

        MoveJournal::clear(&path).unwrap();
        MoveJournal::clear(&path).unwrap();
        assert!(!path.exists());
    }
}
