//! Cross-form table of previously approved mappings.
//!
//! Once an operator approves a mapping on any form, later forms with the same
//! field id or label resolve to the same target through this index.

use std::collections::BTreeMap;

use fieldlink_model::{FieldDescriptor, FieldMapping, FormSchema, MappingSet, TargetRef};

use crate::utils::label_key;

#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    by_field_id: BTreeMap<String, TargetRef>,
    by_label: BTreeMap<String, TargetRef>,
}

impl HistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from every approved mapping in `sets`, skipping `exclude_form`.
    ///
    /// Labels come from the matching schema in `schemas` when one is given.
    /// Sets are visited in form id order and the first approval of a key wins.
    pub fn from_sets(
        sets: &[MappingSet],
        schemas: &[FormSchema],
        exclude_form: Option<&str>,
    ) -> Self {
        let mut ordered: Vec<&MappingSet> = sets
            .iter()
            .filter(|set| Some(set.form_id.as_str()) != exclude_form)
            .collect();
        ordered.sort_by(|a, b| a.form_id.cmp(&b.form_id));

        let mut index = Self::new();
        for set in ordered {
            let schema = schemas.iter().find(|s| s.form_id == set.form_id);
            for mapping in set.approved() {
                let label = schema
                    .and_then(|s| s.field(&mapping.field_id))
                    .map(|f| f.display_label.as_str());
                index.record(mapping, label);
            }
        }
        index
    }

    /// Remember an approved mapping. Unapproved mappings are ignored.
    pub fn record(&mut self, mapping: &FieldMapping, label: Option<&str>) {
        let Some(target) = mapping.target().filter(|_| mapping.is_approved()) else {
            return;
        };
        self.by_field_id
            .entry(label_key(&mapping.field_id))
            .or_insert_with(|| target.clone());
        if let Some(label) = label.map(label_key).filter(|l| !l.is_empty()) {
            self.by_label.entry(label).or_insert(target);
        }
    }

    /// Field id first, then label.
    pub fn lookup(&self, field: &FieldDescriptor) -> Option<&TargetRef> {
        self.by_field_id
            .get(&label_key(&field.field_id))
            .or_else(|| self.by_label.get(&label_key(&field.display_label)))
    }

    pub fn len(&self) -> usize {
        self.by_field_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_field_id.is_empty()
    }
}
