//! Sync error types.
//!
//! [`AccessError`] is what collaborators return. The engine never lets one
//! escape: it becomes a failed sync log entry. [`SyncError`] covers local
//! persistence only and always propagates.

use std::path::PathBuf;

use fieldlink_audit::AuditError;
use fieldlink_map::MapError;
use thiserror::Error;

/// Failure talking to the external record store.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The external system could not be reached or refused the session.
    #[error("external system unavailable: {0}")]
    Unavailable(String),

    #[error("{object} record {record_ref} not found")]
    RecordNotFound { object: String, record_ref: String },

    /// The external system answered but refused the request.
    #[error("{object} rejected the request: {message}")]
    Rejected { object: String, message: String },

    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record file {path} is malformed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AccessError {
    pub fn not_found(object: &str, record_ref: &str) -> Self {
        Self::RecordNotFound {
            object: object.to_string(),
            record_ref: record_ref.to_string(),
        }
    }

    pub fn rejected(object: &str, message: impl Into<String>) -> Self {
        Self::Rejected {
            object: object.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Mapping(#[from] MapError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
