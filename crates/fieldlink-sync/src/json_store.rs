//! Local JSON file standing in for the external record store.
//!
//! The file holds `{object: {record_id: {field: value}}}`. Every call reads
//! the whole file; calls that change it write it back through a temp file and
//! a rename.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fieldlink_model::Record;
use tracing::debug;

use crate::accessor::RecordAccessor;
use crate::error::AccessError;
use crate::memory::{DEFAULT_LOOKUP_FIELD, RecordTable};

#[derive(Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    lookup_field: String,
    write_lock: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lookup_field: DEFAULT_LOOKUP_FIELD.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_lookup_field(mut self, field: impl Into<String>) -> Self {
        self.lookup_field = field.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents. A missing file is an empty table.
    pub fn load(&self) -> Result<RecordTable, AccessError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecordTable::new()),
            Err(e) => return Err(AccessError::io("read", &self.path, e)),
        };
        serde_json::from_str(&contents).map_err(|source| AccessError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, table: &RecordTable) -> Result<(), AccessError> {
        let bytes = serde_json::to_vec_pretty(table).map_err(|source| AccessError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| AccessError::io("create directory", parent, e))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut file =
            File::create(&temp_path).map_err(|e| AccessError::io("create", &temp_path, e))?;
        file.write_all(&bytes)
            .map_err(|e| AccessError::io("write", &temp_path, e))?;
        file.sync_all()
            .map_err(|e| AccessError::io("sync", &temp_path, e))?;
        drop(file);
        fs::rename(&temp_path, &self.path).map_err(|e| AccessError::io("replace", &self.path, e))?;
        debug!(path = %self.path.display(), "record file saved");
        Ok(())
    }

    fn update<T>(
        &self,
        apply: impl FnOnce(&mut RecordTable) -> Result<T, AccessError>,
    ) -> Result<T, AccessError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut table = self.load()?;
        let out = apply(&mut table)?;
        self.save(&table)?;
        Ok(out)
    }
}

impl RecordAccessor for JsonRecordStore {
    fn fetch(
        &self,
        object: &str,
        record_ref: &str,
        fields: &[&str],
    ) -> Result<Option<Record>, AccessError> {
        Ok(self.load()?.fetch(object, record_ref, fields))
    }

    fn write(&self, object: &str, record_ref: &str, updates: &Record) -> Result<(), AccessError> {
        self.update(|table| table.write(object, record_ref, updates))
    }

    fn find_or_create_related(
        &self,
        object: &str,
        primary_ref: &str,
    ) -> Result<Option<Record>, AccessError> {
        if let Some(existing) = self.load()?.find_related(object, &self.lookup_field, primary_ref) {
            return Ok(Some(existing));
        }
        self.update(|table| {
            Ok(Some(table.find_or_create_related(
                object,
                &self.lookup_field,
                primary_ref,
            )))
        })
    }
}
