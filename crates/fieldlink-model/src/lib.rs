//! Value types shared by the fieldlink crates.

pub mod catalog;
pub mod error;
pub mod ids;
pub mod log;
pub mod mapping;
pub mod schema;
pub mod value;

pub use catalog::{ObjectKind, TargetCatalog, TargetField, TargetObject};
pub use error::{ModelError, Result};
pub use ids::TargetRef;
pub use log::{
    AuditAction, AuditEntry, FieldDelta, SyncDirection, SyncLogEntry, SyncStatus,
};
pub use mapping::{FieldMapping, MappingSet, MappingSummary, MatchMethod};
pub use schema::{
    AttributeChange, Classification, FieldChange, FieldDescriptor, FieldType, FormSchema,
    SchemaChanges, compare_versions,
};
pub use value::{Answers, Record, is_blank, normalize_value};
