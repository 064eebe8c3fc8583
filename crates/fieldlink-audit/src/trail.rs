//! Date-partitioned audit trail.
//!
//! Entries land in `<dir>/<YYYY-MM-DD>.jsonl` keyed by the UTC date of the
//! entry's timestamp. Partitions are append-only; nothing here rewrites or
//! deletes an entry.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use fieldlink_model::AuditEntry;
use tracing::debug;

use crate::error::{AuditError, Result};
use crate::jsonl::JsonlFile;

const PARTITION_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone)]
pub struct AuditTrail {
    dir: PathBuf,
    append_lock: Arc<Mutex<()>>,
}

impl AuditTrail {
    /// Open (creating if needed) an audit trail rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| AuditError::io("create directory", &dir, e))?;
        Ok(Self {
            dir,
            append_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn partition(&self, date: NaiveDate) -> JsonlFile {
        JsonlFile::new(
            self.dir
                .join(format!("{}.{PARTITION_EXTENSION}", date.format("%Y-%m-%d"))),
        )
    }

    /// Append one entry to its date partition. Durable on return.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.partition(entry.timestamp.date_naive()).append(entry)?;
        debug!(
            action = %entry.action,
            form_id = %entry.form_id,
            field_id = %entry.field_id,
            "audit entry appended"
        );
        Ok(())
    }

    /// Partition dates present on disk, newest first.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = Vec::new();
        let entries =
            fs::read_dir(&self.dir).map_err(|e| AuditError::io("read directory", &self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| AuditError::io("read directory", &self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PARTITION_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                dates.push(date);
            }
        }
        dates.sort_unstable_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    /// All entries for one calendar date, newest first.
    pub fn for_date(&self, date: NaiveDate) -> Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self.partition(date).read_all()?;
        entries.reverse();
        Ok(entries)
    }

    /// The most recent `limit` entries across all dates, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.collect_newest(limit, |_| true)
    }

    /// The most recent `limit` entries for one form, newest first.
    pub fn for_form(&self, form_id: &str, limit: usize) -> Result<Vec<AuditEntry>> {
        self.collect_newest(limit, |entry| entry.form_id == form_id)
    }

    fn collect_newest(
        &self,
        limit: usize,
        keep: impl Fn(&AuditEntry) -> bool,
    ) -> Result<Vec<AuditEntry>> {
        let mut results = Vec::new();
        if limit == 0 {
            return Ok(results);
        }
        for date in self.dates()? {
            for entry in self.for_date(date)? {
                if keep(&entry) {
                    results.push(entry);
                    if results.len() >= limit {
                        return Ok(results);
                    }
                }
            }
        }
        Ok(results)
    }
}
