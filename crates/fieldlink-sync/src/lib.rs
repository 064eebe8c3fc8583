//! Bidirectional sync between forms and an external record store.
//!
//! The external system is reached only through [`RecordAccessor`] and
//! [`CatalogAccessor`]. [`InMemoryRecordStore`] and [`JsonRecordStore`] are
//! local implementations for tests and offline use.
//!
//! # Storage Format
//!
//! The sync log is a single JSONL file, one [`SyncLogEntry`] per line.
//!
//! [`SyncLogEntry`]: fieldlink_model::SyncLogEntry

pub mod accessor;
pub mod engine;
pub mod error;
pub mod json_store;
pub mod log;
pub mod memory;

pub use accessor::{CatalogAccessor, ID_FIELD, RecordAccessor, fetch_catalog, record_id};
pub use engine::{DiffRow, ObjectFailure, PullOutcome, PushOutcome, SyncEngine, SyncOutcome};
pub use error::{AccessError, Result, SyncError};
pub use json_store::JsonRecordStore;
pub use log::SyncLog;
pub use memory::{DEFAULT_LOOKUP_FIELD, InMemoryRecordStore, RecordTable};
