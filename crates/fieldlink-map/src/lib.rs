//! Form field mapping: auto-resolution, human approval and multi-form merge.
//!
//! - [`Resolver`] proposes a target for every mappable field through four
//!   ordered [`MatchStrategy`] tiers.
//! - [`MappingStore`] persists one [`MappingSet`](fieldlink_model::MappingSet)
//!   per form and applies approve, reject, override and bulk approval, each
//!   recorded in the audit trail.
//! - [`MultiFormMerger`] finds targets shared by approved mappings on several
//!   forms and splits unified answers back per form.

pub mod error;
pub mod history;
pub mod merge;
pub mod repository;
pub mod resolver;
pub mod store;
pub mod strategy;
pub mod synonyms;
pub mod utils;

pub use error::{MapError, Result};
pub use history::HistoryIndex;
pub use merge::{
    DEFAULT_SHARED_KEY_PREFIX, FieldSlot, MergeOptions, MergedForms, MultiFormMerger,
    SharedField, shared_field_key,
};
pub use repository::MappingRepository;
pub use resolver::{Resolver, ResolverConfig};
pub use store::{DEFAULT_BULK_THRESHOLD, MappingStore, RemapOutcome};
pub use strategy::{
    Candidate, ExactLabelMatch, FuzzyLabelMatch, HistoryMatch, MatchStrategy, SynonymMatch,
    similarity_ratio,
};
pub use synonyms::{SynonymTable, default_synonyms};
pub use utils::{encode_id, label_key};
