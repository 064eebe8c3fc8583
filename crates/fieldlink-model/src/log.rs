//! Immutable log records: audit entries and sync log entries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State-changing events recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    MappingSetCreated,
    MappingSetRemapped,
    MappingApproved,
    MappingRejected,
    MappingOverridden,
    BulkMappingApproved,
    SyncExecuted,
    SyncObjectFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::MappingSetCreated => "mapping_set_created",
            AuditAction::MappingSetRemapped => "mapping_set_remapped",
            AuditAction::MappingApproved => "mapping_approved",
            AuditAction::MappingRejected => "mapping_rejected",
            AuditAction::MappingOverridden => "mapping_overridden",
            AuditAction::BulkMappingApproved => "bulk_mapping_approved",
            AuditAction::SyncExecuted => "sync_executed",
            AuditAction::SyncObjectFailed => "sync_object_failed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state-changing event. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub field_id: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, form_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            form_id: form_id.into(),
            field_id: String::new(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field_id: impl Into<String>) -> Self {
        self.field_id = field_id.into();
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// External record store into the form.
    Pull,
    /// Form into the external record store.
    Push,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Pull => "pull",
            SyncDirection::Push => "push",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Partial,
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Success => "success",
            SyncStatus::Partial => "partial",
            SyncStatus::Failed => "failed",
        })
    }
}

/// Before/after pair for one synced field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub old: Value,
    pub new: Value,
}

/// One sync operation. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub timestamp: DateTime<Utc>,
    pub direction: SyncDirection,
    pub form_id: String,
    pub record_ref: String,
    /// Keyed by target field; auxiliary objects use `Object.Field`.
    #[serde(default)]
    pub fields_synced: BTreeMap<String, FieldDelta>,
    pub status: SyncStatus,
    #[serde(default)]
    pub error: String,
}
