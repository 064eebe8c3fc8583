//! Field-to-target mapping types.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::ids::TargetRef;

/// How a mapping was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Exact,
    Synonym,
    History,
    Fuzzy,
    Manual,
    #[default]
    None,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::Synonym => "synonym",
            MatchMethod::History => "history",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Manual => "manual",
            MatchMethod::None => "none",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution of one form field to a target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub form_id: String,
    pub field_id: String,
    pub target_object: String,
    /// Empty when the field is not mapped.
    pub target_field: String,
    pub method: MatchMethod,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub approved: bool,
    #[serde(default)]
    pub approved_by: String,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl FieldMapping {
    /// A mapping with no target: the "pending review" terminal state.
    pub fn unmapped(
        form_id: impl Into<String>,
        field_id: impl Into<String>,
        target_object: impl Into<String>,
    ) -> Self {
        Self {
            form_id: form_id.into(),
            field_id: field_id.into(),
            target_object: target_object.into(),
            target_field: String::new(),
            method: MatchMethod::None,
            confidence: 0.0,
            approved: false,
            approved_by: String::new(),
            approved_at: None,
        }
    }

    pub fn has_target(&self) -> bool {
        !self.target_field.is_empty()
    }

    /// Approved and pointing at a target; the only mappings sync and merge see.
    pub fn is_approved(&self) -> bool {
        self.approved && self.has_target()
    }

    /// Has a suggestion that nobody approved yet.
    pub fn is_pending(&self) -> bool {
        self.has_target() && !self.approved
    }

    pub fn target(&self) -> Option<TargetRef> {
        if !self.has_target() {
            return None;
        }
        Some(TargetRef {
            object: self.target_object.clone(),
            field: self.target_field.clone(),
        })
    }
}

/// Counts of mappings by review state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSummary {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub unmatched: usize,
}

/// All mappings for one form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSet {
    pub form_id: String,
    pub mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub last_auto_mapped: Option<DateTime<Utc>>,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl MappingSet {
    /// Build a set, enforcing that every field id appears once.
    pub fn new(form_id: impl Into<String>, mappings: Vec<FieldMapping>) -> Result<Self> {
        let set = Self {
            form_id: form_id.into(),
            mappings,
            last_auto_mapped: None,
            version: default_version(),
        };
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<()> {
        if self.form_id.trim().is_empty() {
            return Err(ModelError::InvalidFormId(self.form_id.clone()));
        }
        let mut seen = BTreeSet::new();
        for mapping in &self.mappings {
            if !seen.insert(mapping.field_id.as_str()) {
                return Err(ModelError::DuplicateField {
                    form_id: self.form_id.clone(),
                    field_id: mapping.field_id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, field_id: &str) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.field_id == field_id)
    }

    pub fn get_mut(&mut self, field_id: &str) -> Option<&mut FieldMapping> {
        self.mappings.iter_mut().find(|m| m.field_id == field_id)
    }

    pub fn approved(&self) -> impl Iterator<Item = &FieldMapping> {
        self.mappings.iter().filter(|m| m.is_approved())
    }

    pub fn pending(&self) -> impl Iterator<Item = &FieldMapping> {
        self.mappings.iter().filter(|m| m.is_pending())
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &FieldMapping> {
        self.mappings.iter().filter(|m| !m.has_target())
    }

    pub fn summary(&self) -> MappingSummary {
        MappingSummary {
            total: self.mappings.len(),
            approved: self.approved().count(),
            pending: self.pending().count(),
            unmatched: self.unmatched().count(),
        }
    }
}
