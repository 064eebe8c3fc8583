//! File-system repository of mapping sets.
//!
//! One JSON document per form, named `<encoded form id>.json`. Every save
//! rewrites the whole document through a temp file and a rename, so a crash
//! leaves either the old set or the new one on disk.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fieldlink_model::MappingSet;
use tracing::{debug, warn};

use crate::error::{MapError, Result};
use crate::utils::encode_id;

const DOCUMENT_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Clone)]
pub struct MappingRepository {
    base_dir: PathBuf,
}

impl MappingRepository {
    /// Open a repository at `base_dir`, creating the directory if needed.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .map_err(|e| MapError::io("create directory", &base_dir, e))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_for(&self, form_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.{DOCUMENT_EXTENSION}", encode_id(form_id)))
    }

    /// Replace the stored set for `set.form_id`.
    ///
    /// Refuses to overwrite a readable document that belongs to another form
    /// id, which can happen on case-insensitive file systems.
    pub fn save(&self, set: &MappingSet) -> Result<PathBuf> {
        set.validate()?;
        let bytes = serde_json::to_vec_pretty(set).map_err(|source| MapError::Serialization {
            form_id: set.form_id.clone(),
            source,
        })?;

        let path = self.path_for(&set.form_id);
        if let Some(found) = stored_form_id(&path)
            && found != set.form_id
        {
            return Err(MapError::FormIdMismatch {
                path,
                expected: set.form_id.clone(),
                found,
            });
        }
        let temp_path = path.with_extension(TEMP_EXTENSION);

        let mut file =
            File::create(&temp_path).map_err(|e| MapError::io("create", &temp_path, e))?;
        file.write_all(&bytes)
            .map_err(|e| MapError::io("write", &temp_path, e))?;
        file.sync_all()
            .map_err(|e| MapError::io("sync", &temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &path).map_err(|source| MapError::AtomicWriteFailed {
            temp_path: temp_path.clone(),
            target_path: path.clone(),
            source,
        })?;

        debug!(form_id = %set.form_id, path = %path.display(), "mapping set saved");
        Ok(path)
    }

    /// Load the set for a form. `None` when nothing is stored.
    pub fn load(&self, form_id: &str) -> Result<Option<MappingSet>> {
        let path = self.path_for(form_id);
        if !path.is_file() {
            return Ok(None);
        }
        let set = read_document(&path)?;
        if set.form_id != form_id {
            return Err(MapError::FormIdMismatch {
                path,
                expected: form_id.to_string(),
                found: set.form_id,
            });
        }
        Ok(Some(set))
    }

    /// Every stored set, sorted by form id.
    ///
    /// Documents that cannot be read or parsed are skipped with a warning so
    /// one damaged file does not hide the rest.
    pub fn list(&self) -> Result<Vec<MappingSet>> {
        let entries = fs::read_dir(&self.base_dir)
            .map_err(|e| MapError::io("read directory", &self.base_dir, e))?;

        let mut sets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MapError::io("read directory", &self.base_dir, e))?;
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION)
            {
                continue;
            }
            match read_document(&path) {
                Ok(set) => sets.push(set),
                Err(error) => warn!(path = %path.display(), %error, "skipping unreadable mapping set"),
            }
        }
        sets.sort_by(|a, b| a.form_id.cmp(&b.form_id));
        Ok(sets)
    }

    pub fn exists(&self, form_id: &str) -> bool {
        self.path_for(form_id).is_file()
    }

    /// Remove the stored set. Returns whether anything was deleted.
    pub fn delete(&self, form_id: &str) -> Result<bool> {
        let path = self.path_for(form_id);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| MapError::io("delete", &path, e))?;
        Ok(true)
    }
}

fn read_document(path: &Path) -> Result<MappingSet> {
    let contents = fs::read_to_string(path).map_err(|e| MapError::io("read", path, e))?;
    let set: MappingSet =
        serde_json::from_str(&contents).map_err(|source| MapError::Deserialization {
            path: path.to_path_buf(),
            source,
        })?;
    set.validate()?;
    Ok(set)
}

/// Form id recorded in an existing document, if it can be read at all.
fn stored_form_id(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&contents).ok()?;
    value.get("form_id")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use fieldlink_model::FieldMapping;
    use tempfile::tempdir;

    use super::*;

    fn set(form: &str) -> MappingSet {
        MappingSet::new(form, vec![FieldMapping::unmapped(form, "f1", "Contact")]).unwrap()
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let repo = MappingRepository::open(dir.path()).unwrap();
        let path = repo.save(&set("I-589")).unwrap();
        assert_eq!(path, dir.path().join("I-589.json"));
        assert!(!path.with_extension(TEMP_EXTENSION).exists());
    }

    #[test]
    fn missing_form_loads_none() {
        let dir = tempdir().unwrap();
        let repo = MappingRepository::open(dir.path()).unwrap();
        assert!(repo.load("nope").unwrap().is_none());
        assert!(!repo.delete("nope").unwrap());
    }

    #[test]
    fn list_skips_damaged_documents() {
        let dir = tempdir().unwrap();
        let repo = MappingRepository::open(dir.path()).unwrap();
        repo.save(&set("B")).unwrap();
        repo.save(&set("A")).unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let ids: Vec<_> = repo.list().unwrap().into_iter().map(|s| s.form_id).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn load_rejects_duplicate_field_ids() {
        let dir = tempdir().unwrap();
        let repo = MappingRepository::open(dir.path()).unwrap();
        let mut bad = set("A");
        bad.mappings.push(FieldMapping::unmapped("A", "f1", "Contact"));
        let json = serde_json::to_string(&bad).unwrap();
        fs::write(repo.path_for("A"), json).unwrap();
        assert!(matches!(repo.load("A"), Err(MapError::Model(_))));
    }

    #[test]
    fn document_for_another_form_is_not_served_or_replaced() {
        let dir = tempdir().unwrap();
        let repo = MappingRepository::open(dir.path()).unwrap();
        let json = serde_json::to_string(&set("B")).unwrap();
        fs::write(repo.path_for("A"), json).unwrap();

        let err = repo.load("A").unwrap_err();
        assert!(matches!(err, MapError::FormIdMismatch { ref found, .. } if found == "B"));
        assert!(matches!(
            repo.save(&set("A")),
            Err(MapError::FormIdMismatch { .. })
        ));
    }
}
