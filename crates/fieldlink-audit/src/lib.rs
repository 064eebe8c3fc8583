//! Append-only audit trail for mapping and sync events.
//!
//! # Storage Format
//!
//! One newline-delimited JSON partition per UTC calendar date, named
//! `YYYY-MM-DD.jsonl`. One line is one [`AuditEntry`]; a line is the atomic
//! unit of the log.
//!
//! [`JsonlFile`] is the shared append/read primitive and is also used for the
//! sync log.
//!
//! [`AuditEntry`]: fieldlink_model::AuditEntry

mod error;
mod jsonl;
mod trail;

pub use error::{AuditError, Result};
pub use jsonl::JsonlFile;
pub use trail::AuditTrail;
