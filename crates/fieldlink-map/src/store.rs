//! Human approval state machine over persisted mapping sets.
//!
//! Every mutator loads the whole set, changes it, saves it back and then
//! appends exactly one audit entry. An unknown form or field is reported as
//! `false` (or `0`), never as an error. Persistence failures always propagate.

use std::path::Path;

use chrono::{DateTime, Utc};
use fieldlink_audit::AuditTrail;
use fieldlink_model::{
    AuditAction, AuditEntry, FieldMapping, FormSchema, MappingSet, MatchMethod,
};
use serde_json::json;
use tracing::{info, warn};

use crate::error::Result;
use crate::history::HistoryIndex;
use crate::repository::MappingRepository;
use crate::resolver::Resolver;

/// Threshold used by bulk approval when none is configured.
pub const DEFAULT_BULK_THRESHOLD: f64 = 0.9;

/// Outcome of re-running the resolver over a stored form.
#[derive(Debug, Clone, PartialEq)]
pub struct RemapOutcome {
    pub set: MappingSet,
    /// Field ids whose previous approval was carried onto the new set.
    pub preserved: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MappingStore {
    repo: MappingRepository,
    audit: AuditTrail,
}

impl MappingStore {
    pub fn new(repo: MappingRepository, audit: AuditTrail) -> Self {
        Self { repo, audit }
    }

    /// Open a store under `data_dir`, using `mappings/` and `audit/`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        Ok(Self::new(
            MappingRepository::open(data_dir.join("mappings"))?,
            AuditTrail::open(data_dir.join("audit"))?,
        ))
    }

    pub fn repository(&self) -> &MappingRepository {
        &self.repo
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn load(&self, form_id: &str) -> Result<Option<MappingSet>> {
        self.repo.load(form_id)
    }

    pub fn list(&self) -> Result<Vec<MappingSet>> {
        self.repo.list()
    }

    /// Persist a freshly resolved set, replacing any stored one.
    pub fn install(&self, set: &MappingSet, by: &str) -> Result<()> {
        self.repo.save(set)?;
        let summary = set.summary();
        self.audit.append(
            &AuditEntry::new(AuditAction::MappingSetCreated, &set.form_id)
                .with_detail("total", summary.total)
                .with_detail("matched", summary.total - summary.unmatched)
                .with_detail("unmatched", summary.unmatched)
                .with_detail("actor", by),
        )?;
        info!(form_id = %set.form_id, total = summary.total, "mapping set installed");
        Ok(())
    }

    /// Mark one mapping approved.
    ///
    /// A mapping without a target can be approved; it stays invisible to
    /// sync and merge because those only read mappings that have a target.
    pub fn approve(&self, form_id: &str, field_id: &str, by: &str) -> Result<bool> {
        self.mutate(form_id, field_id, |mapping, now| {
            if !mapping.has_target() {
                warn!(form_id, field_id, "approving a mapping with no target field");
            }
            mapping.approved = true;
            mapping.approved_by = by.to_string();
            mapping.approved_at = Some(now);

            AuditEntry::new(AuditAction::MappingApproved, form_id)
                .with_field(field_id)
                .with_detail("target_field", mapping.target_field.as_str())
                .with_detail("target_object", mapping.target_object.as_str())
                .with_detail("method", mapping.method.as_str())
                .with_detail("confidence", mapping.confidence)
                .with_detail("approved_by", by)
        })
    }

    /// Return a mapping to the fully unmapped state.
    pub fn reject(&self, form_id: &str, field_id: &str, by: &str) -> Result<bool> {
        self.mutate(form_id, field_id, |mapping, _| {
            let entry = AuditEntry::new(AuditAction::MappingRejected, form_id)
                .with_field(field_id)
                .with_detail("previous_target_field", mapping.target_field.as_str())
                .with_detail("previous_target_object", mapping.target_object.as_str())
                .with_detail("previous_method", mapping.method.as_str())
                .with_detail("previous_confidence", mapping.confidence)
                .with_detail("previous_approved", mapping.approved)
                .with_detail("actor", by);

            mapping.target_field.clear();
            mapping.confidence = 0.0;
            mapping.method = MatchMethod::None;
            mapping.approved = false;
            mapping.approved_by.clear();
            mapping.approved_at = None;
            entry
        })
    }

    /// Point a field at a chosen target and approve it.
    pub fn override_mapping(
        &self,
        form_id: &str,
        field_id: &str,
        target_field: &str,
        target_object: &str,
        by: &str,
    ) -> Result<bool> {
        self.mutate(form_id, field_id, |mapping, now| {
            let entry = AuditEntry::new(AuditAction::MappingOverridden, form_id)
                .with_field(field_id)
                .with_detail("previous_target_field", mapping.target_field.as_str())
                .with_detail("previous_target_object", mapping.target_object.as_str())
                .with_detail("previous_method", mapping.method.as_str())
                .with_detail("new_target_field", target_field)
                .with_detail("new_target_object", target_object)
                .with_detail("approved_by", by);

            mapping.target_field = target_field.to_string();
            mapping.target_object = target_object.to_string();
            mapping.method = MatchMethod::Manual;
            mapping.confidence = 1.0;
            mapping.approved = true;
            mapping.approved_by = by.to_string();
            mapping.approved_at = Some(now);
            entry
        })
    }

    /// Approve every unapproved mapping with a target and
    /// `confidence >= threshold`. Returns how many were approved.
    ///
    /// Nothing is saved or logged when no mapping qualifies, so a second run
    /// is a no-op.
    pub fn bulk_approve_high_confidence(
        &self,
        form_id: &str,
        threshold: f64,
        by: &str,
    ) -> Result<usize> {
        let Some(mut set) = self.repo.load(form_id)? else {
            return Ok(0);
        };

        let now = Utc::now();
        let mut approved = Vec::new();
        for mapping in &mut set.mappings {
            if mapping.is_pending() && mapping.confidence >= threshold {
                mapping.approved = true;
                mapping.approved_by = by.to_string();
                mapping.approved_at = Some(now);
                approved.push(mapping.field_id.clone());
            }
        }
        if approved.is_empty() {
            return Ok(0);
        }

        self.repo.save(&set)?;
        let mut entry = AuditEntry::new(AuditAction::BulkMappingApproved, form_id)
            .with_detail("threshold", threshold)
            .with_detail("count", approved.len())
            .with_detail("field_ids", json!(approved))
            .with_detail("approved_by", by);
        entry.timestamp = now;
        self.audit.append(&entry)?;

        info!(form_id, count = approved.len(), threshold, "bulk approval");
        Ok(approved.len())
    }

    /// Field ids with no target: review candidates.
    pub fn unmatched_fields(&self, form_id: &str) -> Result<Vec<String>> {
        Ok(self
            .repo
            .load(form_id)?
            .map(|set| set.unmatched().map(|m| m.field_id.clone()).collect())
            .unwrap_or_default())
    }

    /// Field ids with a suggested target nobody approved yet.
    pub fn pending_fields(&self, form_id: &str) -> Result<Vec<String>> {
        Ok(self
            .repo
            .load(form_id)?
            .map(|set| set.pending().map(|m| m.field_id.clone()).collect())
            .unwrap_or_default())
    }

    /// Cross-form history of approvals, excluding `exclude_form`.
    pub fn history_index(
        &self,
        schemas: &[FormSchema],
        exclude_form: Option<&str>,
    ) -> Result<HistoryIndex> {
        let sets = self.repo.list()?;
        Ok(HistoryIndex::from_sets(&sets, schemas, exclude_form))
    }

    /// Re-resolve `schema` and carry every prior approval onto the result.
    ///
    /// A carried mapping keeps its target, method, confidence, approver and
    /// approval time. Fields no longer in the schema are dropped.
    pub fn remap(&self, schema: &FormSchema, resolver: &Resolver, by: &str) -> Result<RemapOutcome> {
        let previous = self.repo.load(&schema.form_id)?;
        let mut set = resolver.resolve(schema)?;

        let mut preserved = Vec::new();
        if let Some(previous) = &previous {
            set.version = previous.version.saturating_add(1);
            for mapping in &mut set.mappings {
                if let Some(prior) = previous
                    .get(&mapping.field_id)
                    .filter(|prior| prior.is_approved())
                {
                    *mapping = prior.clone();
                    preserved.push(mapping.field_id.clone());
                }
            }
        }

        self.repo.save(&set)?;
        let summary = set.summary();
        self.audit.append(
            &AuditEntry::new(AuditAction::MappingSetRemapped, &schema.form_id)
                .with_detail("total", summary.total)
                .with_detail("preserved", preserved.len())
                .with_detail("unmatched", summary.unmatched)
                .with_detail("version", set.version)
                .with_detail("actor", by),
        )?;
        info!(
            form_id = %schema.form_id,
            preserved = preserved.len(),
            version = set.version,
            "mapping set remapped"
        );
        Ok(RemapOutcome { set, preserved })
    }

    /// Load, change one mapping, save, then record the audit entry.
    ///
    /// The set is saved before the entry is appended. A failed append is
    /// returned as an error but leaves the saved change in place.
    fn mutate(
        &self,
        form_id: &str,
        field_id: &str,
        apply: impl FnOnce(&mut FieldMapping, DateTime<Utc>) -> AuditEntry,
    ) -> Result<bool> {
        let Some(mut set) = self.repo.load(form_id)? else {
            return Ok(false);
        };
        let now = Utc::now();
        let Some(mapping) = set.get_mut(field_id) else {
            return Ok(false);
        };
        let mut entry = apply(mapping, now);
        entry.timestamp = now;

        self.repo.save(&set)?;
        self.audit.append(&entry)?;
        info!(form_id, field_id, action = %entry.action, "mapping updated");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn seeded(dir: &Path) -> MappingStore {
        let store = MappingStore::open(dir).unwrap();
        let set = MappingSet::new(
            "A",
            vec![
                FieldMapping {
                    target_field: "LastName".into(),
                    method: MatchMethod::Synonym,
                    confidence: 0.95,
                    ..FieldMapping::unmapped("A", "family_name", "Contact")
                },
                FieldMapping::unmapped("A", "eye_colour", "Contact"),
            ],
        )
        .unwrap();
        store.install(&set, "tester").unwrap();
        store
    }

    #[test]
    fn unknown_form_or_field_is_not_an_error() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());
        assert!(!store.approve("missing", "x", "u").unwrap());
        assert!(!store.reject("A", "missing", "u").unwrap());
        assert_eq!(store.bulk_approve_high_confidence("missing", 0.9, "u").unwrap(), 0);
        assert!(store.unmatched_fields("missing").unwrap().is_empty());
        // install only
        assert_eq!(store.audit().recent(10).unwrap().len(), 1);
    }

    #[test]
    fn approve_records_approver() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());
        assert!(store.approve("A", "family_name", "maria").unwrap());
        let mapping = store.load("A").unwrap().unwrap().get("family_name").unwrap().clone();
        assert!(mapping.is_approved());
        assert_eq!(mapping.approved_by, "maria");
        assert!(mapping.approved_at.is_some());

        let latest = &store.audit().recent(1).unwrap()[0];
        assert_eq!(latest.action, AuditAction::MappingApproved);
        assert_eq!(latest.details["target_field"], "LastName");
    }

    #[test]
    fn approving_an_empty_target_is_allowed_but_not_effective() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());
        assert!(store.approve("A", "eye_colour", "u").unwrap());
        let set = store.load("A").unwrap().unwrap();
        let mapping = set.get("eye_colour").unwrap();
        assert!(mapping.approved);
        assert!(!mapping.is_approved());
    }

    #[test]
    fn query_helpers_split_unmatched_and_pending() {
        let dir = tempdir().unwrap();
        let store = seeded(dir.path());
        assert_eq!(store.unmatched_fields("A").unwrap(), vec!["eye_colour"]);
        assert_eq!(store.pending_fields("A").unwrap(), vec!["family_name"]);
    }
}
