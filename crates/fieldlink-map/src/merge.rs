//! Shared-field discovery across several forms.
//!
//! Two fields on different forms hold the same datum when both have an
//! approved mapping to the same `(object, field)` target. The merger collects
//! those into one canonical input per target and can fan a unified answer set
//! back out to every form.

use std::collections::{BTreeMap, BTreeSet};

use fieldlink_model::{Answers, FieldDescriptor, FormSchema, MappingSet, TargetRef};
use serde_json::Value;
use tracing::{debug, warn};

/// Namespace for shared-field answer keys.
pub const DEFAULT_SHARED_KEY_PREFIX: &str = "shared_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub shared_key_prefix: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            shared_key_prefix: DEFAULT_SHARED_KEY_PREFIX.to_string(),
        }
    }
}

impl MergeOptions {
    #[must_use]
    pub fn with_shared_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.shared_key_prefix = prefix.into();
        self
    }

    /// Canonical answer key for a shared target field.
    pub fn shared_field_key(&self, target_field: &str) -> String {
        format!("{}{target_field}", self.shared_key_prefix)
    }
}

/// Canonical answer key using the default prefix.
pub fn shared_field_key(target_field: &str) -> String {
    MergeOptions::default().shared_field_key(target_field)
}

/// One `(form, field)` position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldSlot {
    pub form_id: String,
    pub field_id: String,
}

/// A target mapped by approved mappings on two or more forms.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedField {
    pub target: TargetRef,
    /// Answer key the unified surface uses for this field.
    pub key: String,
    /// Descriptor from the first form defining the field.
    pub descriptor: FieldDescriptor,
    /// Distinct forms sharing the target, first-seen order.
    pub forms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedForms {
    pub shared_fields: Vec<SharedField>,
    /// Fields not covered by a shared target, per form, in schema order.
    pub form_specific: BTreeMap<String, Vec<FieldDescriptor>>,
    /// Shared key to the forms using it.
    pub field_to_forms: BTreeMap<String, Vec<String>>,
    /// Every approved target to the slots mapped to it, shared or not.
    pub target_to_fields: BTreeMap<TargetRef, Vec<FieldSlot>>,
    form_ids: Vec<String>,
}

impl MergedForms {
    /// Forms taking part in the merge, input order.
    pub fn form_ids(&self) -> &[String] {
        &self.form_ids
    }

    pub fn shared(&self, key: &str) -> Option<&SharedField> {
        self.shared_fields.iter().find(|s| s.key == key)
    }

    pub fn is_shared(&self, form_id: &str, field_id: &str) -> bool {
        self.shared_fields.iter().any(|shared| {
            self.target_to_fields
                .get(&shared.target)
                .is_some_and(|slots| {
                    slots
                        .iter()
                        .any(|s| s.form_id == form_id && s.field_id == field_id)
                })
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MultiFormMerger {
    options: MergeOptions,
}

impl MultiFormMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Group the approved mappings of `schemas` by target.
    ///
    /// `sets` supplies the mapping set for each schema by form id; a schema
    /// without a set contributes only form-specific fields.
    pub fn merge(&self, schemas: &[FormSchema], sets: &[MappingSet]) -> MergedForms {
        let mut form_ids: Vec<String> = Vec::new();
        let mut groups: Vec<(TargetRef, Vec<(FieldSlot, &FieldDescriptor)>)> = Vec::new();
        let mut group_index: BTreeMap<TargetRef, usize> = BTreeMap::new();

        for schema in schemas {
            if form_ids.contains(&schema.form_id) {
                warn!(form_id = %schema.form_id, "form listed twice in merge, ignoring repeat");
                continue;
            }
            form_ids.push(schema.form_id.clone());

            let Some(set) = sets.iter().find(|s| s.form_id == schema.form_id) else {
                continue;
            };
            for field in &schema.fields {
                let Some(target) = set
                    .get(&field.field_id)
                    .filter(|m| m.is_approved())
                    .and_then(|m| m.target())
                else {
                    continue;
                };
                let slot = FieldSlot {
                    form_id: schema.form_id.clone(),
                    field_id: field.field_id.clone(),
                };
                let position = *group_index.entry(target.clone()).or_insert_with(|| {
                    groups.push((target, Vec::new()));
                    groups.len() - 1
                });
                groups[position].1.push((slot, field));
            }
        }

        let mut merged = MergedForms {
            form_ids,
            ..MergedForms::default()
        };
        let mut shared_slots: BTreeSet<FieldSlot> = BTreeSet::new();
        let mut used_keys: BTreeSet<String> = BTreeSet::new();

        for (target, entries) in groups {
            let mut forms: Vec<String> = Vec::new();
            for (slot, _) in &entries {
                if !forms.contains(&slot.form_id) {
                    forms.push(slot.form_id.clone());
                }
            }

            if forms.len() >= 2 {
                let mut key = self.options.shared_field_key(&target.field);
                if !used_keys.insert(key.clone()) {
                    key = self.options.shared_field_key(&target.qualified());
                    used_keys.insert(key.clone());
                }
                debug!(target = %target, key = %key, forms = forms.len(), "shared field");

                shared_slots.extend(entries.iter().map(|(slot, _)| slot.clone()));
                merged.field_to_forms.insert(key.clone(), forms.clone());
                merged.shared_fields.push(SharedField {
                    target: target.clone(),
                    key,
                    descriptor: entries[0].1.clone(),
                    forms,
                });
            }

            merged
                .target_to_fields
                .insert(target, entries.into_iter().map(|(slot, _)| slot).collect());
        }

        for schema in schemas {
            if merged.form_specific.contains_key(&schema.form_id) {
                continue;
            }
            let specific = schema
                .fields
                .iter()
                .filter(|field| {
                    !shared_slots.iter().any(|slot| {
                        slot.form_id == schema.form_id && slot.field_id == field.field_id
                    })
                })
                .cloned()
                .collect();
            merged
                .form_specific
                .insert(schema.form_id.clone(), specific);
        }

        merged
    }

    /// Fan unified answers back out to per-form answer maps.
    ///
    /// A shared value is read from its shared key, falling back to the
    /// canonical field id, and copied to every slot of its target. Every form
    /// in the merge gets an entry, possibly empty. Absent and `null` answers
    /// are not copied.
    pub fn split(&self, merged: &MergedForms, answers: &Answers) -> BTreeMap<String, Answers> {
        let mut result: BTreeMap<String, Answers> = merged
            .form_ids
            .iter()
            .map(|id| (id.clone(), Answers::new()))
            .collect();

        for shared in &merged.shared_fields {
            let Some(value) = present(answers, &shared.key)
                .or_else(|| present(answers, &shared.descriptor.field_id))
            else {
                continue;
            };
            for slot in merged.target_to_fields.get(&shared.target).into_iter().flatten() {
                result
                    .entry(slot.form_id.clone())
                    .or_default()
                    .insert(slot.field_id.clone(), value.clone());
            }
        }

        for (form_id, fields) in &merged.form_specific {
            for field in fields {
                if let Some(value) = present(answers, &field.field_id) {
                    result
                        .entry(form_id.clone())
                        .or_default()
                        .insert(field.field_id.clone(), value.clone());
                }
            }
        }

        result
    }
}

fn present<'a>(answers: &'a Answers, key: &str) -> Option<&'a Value> {
    answers.get(key).filter(|v| !v.is_null())
}
