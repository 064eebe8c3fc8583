//! Append-only log of sync operations.

use std::path::{Path, PathBuf};

use fieldlink_audit::{JsonlFile, Result};
use fieldlink_model::SyncLogEntry;

#[derive(Debug, Clone)]
pub struct SyncLog {
    file: JsonlFile,
}

impl SyncLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonlFile::new(path),
        }
    }

    /// The log at its standard place under a data directory.
    pub fn in_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join("sync").join("sync_log.jsonl"))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn append(&self, entry: &SyncLogEntry) -> Result<()> {
        self.file.append(entry)
    }

    /// The latest `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let mut entries: Vec<SyncLogEntry> = self.file.read_all()?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn for_form(&self, form_id: &str, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let mut entries: Vec<SyncLogEntry> = self.file.read_all()?;
        entries.retain(|e| e.form_id == form_id);
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}
