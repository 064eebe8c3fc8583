//! Error types for mapping persistence.
//!
//! Unknown forms and fields are not errors here: store mutators report them by
//! returning `false`. Everything in this enum is a failure to persist or read
//! back a mapping decision and is always propagated.

use std::path::PathBuf;

use fieldlink_audit::AuditError;
use fieldlink_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    /// File I/O error.
    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Temp file written but could not be moved over the target.
    #[error("failed to replace {target_path} with {temp_path}: {source}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize mapping set for {form_id}: {source}")]
    Serialization {
        form_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse mapping set {path}: {source}")]
    Deserialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document at the form's path records a different form id.
    #[error("{path} holds mappings for {found}, not {expected}")]
    FormIdMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl MapError {
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

pub type Result<T> = std::result::Result<T, MapError>;
