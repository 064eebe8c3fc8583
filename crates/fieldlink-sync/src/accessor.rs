//! Collaborator interfaces for the external system.
//!
//! Calls are synchronous and block the caller. Nothing here retries.

use fieldlink_model::{ModelError, ObjectKind, Record, TargetCatalog, TargetField, TargetObject};
use tracing::{debug, warn};

use crate::error::AccessError;

/// Field holding a record's identifier.
pub const ID_FIELD: &str = "Id";

/// Reads and writes records in the external system.
pub trait RecordAccessor {
    /// One record with at least the requested fields, `None` when absent.
    fn fetch(
        &self,
        object: &str,
        record_ref: &str,
        fields: &[&str],
    ) -> Result<Option<Record>, AccessError>;

    /// Apply `updates` to an existing record.
    fn write(&self, object: &str, record_ref: &str, updates: &Record) -> Result<(), AccessError>;

    /// The auxiliary record related to `primary_ref`, created when missing.
    fn find_or_create_related(
        &self,
        object: &str,
        primary_ref: &str,
    ) -> Result<Option<Record>, AccessError>;
}

impl<T: RecordAccessor + ?Sized> RecordAccessor for &T {
    fn fetch(
        &self,
        object: &str,
        record_ref: &str,
        fields: &[&str],
    ) -> Result<Option<Record>, AccessError> {
        (**self).fetch(object, record_ref, fields)
    }

    fn write(&self, object: &str, record_ref: &str, updates: &Record) -> Result<(), AccessError> {
        (**self).write(object, record_ref, updates)
    }

    fn find_or_create_related(
        &self,
        object: &str,
        primary_ref: &str,
    ) -> Result<Option<Record>, AccessError> {
        (**self).find_or_create_related(object, primary_ref)
    }
}

/// Describes the external schema.
pub trait CatalogAccessor {
    /// Target fields of one object with their human labels, in display order.
    fn describe(&self, object: &str) -> Result<Vec<TargetField>, AccessError>;
}

/// Build an ordered catalog by describing each object.
///
/// The first object is the primary one. An object that cannot be described
/// is kept with no fields so later objects keep their priority.
pub fn fetch_catalog<C: CatalogAccessor + ?Sized>(
    accessor: &C,
    objects: &[&str],
) -> Result<TargetCatalog, ModelError> {
    let mut described = Vec::with_capacity(objects.len());
    for (position, name) in objects.iter().enumerate() {
        let kind = if position == 0 {
            ObjectKind::Primary
        } else {
            ObjectKind::Auxiliary
        };
        let fields = match accessor.describe(name) {
            Ok(fields) => {
                debug!(object = name, fields = fields.len(), "object described");
                fields
            }
            Err(error) => {
                warn!(object = name, %error, "describe failed, object left empty");
                Vec::new()
            }
        };
        described.push(TargetObject {
            name: (*name).to_string(),
            kind,
            fields,
        });
    }
    TargetCatalog::new(described)
}

/// The `Id` of a record, when present and non-empty.
pub fn record_id(record: &Record) -> Option<&str> {
    record
        .get(ID_FIELD)
        .and_then(serde_json::Value::as_str)
        .filter(|id| !id.is_empty())
}
