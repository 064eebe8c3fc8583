//! Record stores that live in this process.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fieldlink_model::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::accessor::{ID_FIELD, RecordAccessor};
use crate::error::AccessError;

/// Field on an auxiliary record that points at its primary record.
pub const DEFAULT_LOOKUP_FIELD: &str = "Primary__c";

/// Records grouped by object, then by record id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordTable {
    objects: BTreeMap<String, BTreeMap<String, Record>>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. The `Id` field is set to `id`.
    pub fn insert(&mut self, object: &str, id: &str, mut record: Record) {
        record.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        self.objects
            .entry(object.to_string())
            .or_default()
            .insert(id.to_string(), record);
    }

    pub fn get(&self, object: &str, id: &str) -> Option<&Record> {
        self.objects.get(object).and_then(|records| records.get(id))
    }

    pub fn len(&self, object: &str) -> usize {
        self.objects.get(object).map_or(0, BTreeMap::len)
    }

    /// The requested fields of one record, plus its `Id`.
    pub fn fetch(&self, object: &str, id: &str, fields: &[&str]) -> Option<Record> {
        let record = self.get(object, id)?;
        let mut projected: Record = record
            .iter()
            .filter(|(name, _)| fields.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        projected.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        Some(projected)
    }

    /// The first record of `object` whose `lookup_field` equals `primary_ref`.
    pub fn find_related(&self, object: &str, lookup_field: &str, primary_ref: &str) -> Option<Record> {
        self.objects.get(object)?.iter().find_map(|(id, record)| {
            (record.get(lookup_field).and_then(Value::as_str) == Some(primary_ref)).then(|| {
                let mut found = record.clone();
                found.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                found
            })
        })
    }

    /// Merge `updates` into an existing record.
    pub fn write(&mut self, object: &str, id: &str, updates: &Record) -> Result<(), AccessError> {
        if updates.contains_key(ID_FIELD) {
            return Err(AccessError::rejected(object, "the Id field is read-only"));
        }
        let record = self
            .objects
            .get_mut(object)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| AccessError::not_found(object, id))?;
        record.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    /// The first record whose `lookup_field` equals `primary_ref`, creating
    /// one named `<object>-<n>` when none exists.
    pub fn find_or_create_related(
        &mut self,
        object: &str,
        lookup_field: &str,
        primary_ref: &str,
    ) -> Record {
        if let Some(existing) = self.find_related(object, lookup_field, primary_ref) {
            return existing;
        }
        let records = self.objects.entry(object.to_string()).or_default();

        let mut n = records.len() + 1;
        let mut id = format!("{object}-{n}");
        while records.contains_key(&id) {
            n += 1;
            id = format!("{object}-{n}");
        }
        let record = Record::from([
            (ID_FIELD.to_string(), Value::String(id.clone())),
            (lookup_field.to_string(), Value::String(primary_ref.to_string())),
        ]);
        records.insert(id, record.clone());
        record
    }
}

/// Thread-safe store backed by a [`RecordTable`].
#[derive(Debug)]
pub struct InMemoryRecordStore {
    table: Mutex<RecordTable>,
    lookup_field: String,
}

impl InMemoryRecordStore {
    pub fn new(table: RecordTable) -> Self {
        Self {
            table: Mutex::new(table),
            lookup_field: DEFAULT_LOOKUP_FIELD.to_string(),
        }
    }

    #[must_use]
    pub fn with_lookup_field(mut self, field: impl Into<String>) -> Self {
        self.lookup_field = field.into();
        self
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> RecordTable {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, RecordTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new(RecordTable::new())
    }
}

impl RecordAccessor for InMemoryRecordStore {
    fn fetch(
        &self,
        object: &str,
        record_ref: &str,
        fields: &[&str],
    ) -> Result<Option<Record>, AccessError> {
        Ok(self.lock().fetch(object, record_ref, fields))
    }

    fn write(&self, object: &str, record_ref: &str, updates: &Record) -> Result<(), AccessError> {
        self.lock().write(object, record_ref, updates)
    }

    fn find_or_create_related(
        &self,
        object: &str,
        primary_ref: &str,
    ) -> Result<Option<Record>, AccessError> {
        Ok(Some(self.lock().find_or_create_related(
            object,
            &self.lookup_field,
            primary_ref,
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn fetch_projects_requested_fields() {
        let mut table = RecordTable::new();
        table.insert(
            "Contact",
            "c1",
            Record::from([
                ("LastName".into(), json!("Doe")),
                ("Phone".into(), json!("555")),
            ]),
        );
        let record = table.fetch("Contact", "c1", &["LastName"]).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record["Id"], json!("c1"));
        assert!(table.fetch("Contact", "c2", &["LastName"]).is_none());
    }

    #[test]
    fn related_records_are_created_once() {
        let store = InMemoryRecordStore::new(RecordTable::new());
        let first = store.find_or_create_related("Plus", "c1").unwrap().unwrap();
        let again = store.find_or_create_related("Plus", "c1").unwrap().unwrap();
        let other = store.find_or_create_related("Plus", "c2").unwrap().unwrap();
        assert_eq!(first["Id"], json!("Plus-1"));
        assert_eq!(first, again);
        assert_eq!(other["Id"], json!("Plus-2"));
        assert_eq!(first[DEFAULT_LOOKUP_FIELD], json!("c1"));
    }

    #[test]
    fn write_requires_an_existing_record() {
        let store = InMemoryRecordStore::new(RecordTable::new());
        let err = store
            .write("Contact", "nope", &Record::from([("A".into(), json!(1))]))
            .unwrap_err();
        assert!(matches!(err, AccessError::RecordNotFound { .. }));
    }
}
