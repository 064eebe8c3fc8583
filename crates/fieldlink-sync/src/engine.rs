//! Pull, push and diff over approved mappings.
//!
//! Approved mappings are grouped by target object and each object is fetched
//! or written once, primary object first. A failure on one object becomes a
//! failed sync log entry plus a `sync_object_failed` audit entry and the
//! remaining objects still run. Every pull or push ends with one summary
//! sync log entry and one `sync_executed` audit entry.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use fieldlink_audit::AuditTrail;
use fieldlink_map::MappingRepository;
use fieldlink_model::{
    Answers, AuditAction, AuditEntry, FieldDelta, FieldMapping, MappingSet, Record, SyncDirection,
    SyncLogEntry, SyncStatus, TargetCatalog, is_blank, normalize_value,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, info_span, warn};

use crate::accessor::{RecordAccessor, record_id};
use crate::error::{AccessError, Result};
use crate::log::SyncLog;

const NO_APPROVED_MAPPINGS: &str = "No approved mappings for this form";
const NOTHING_TO_PULL: &str = "No non-empty external values";
const NOTHING_TO_PUSH: &str = "No non-empty form values to push";

/// One target object that could not be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectFailure {
    pub object: String,
    pub error: String,
}

/// Values moved by one call, its overall status and per-object failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome<T> {
    pub values: T,
    pub status: SyncStatus,
    pub failures: Vec<ObjectFailure>,
}

/// Field id to pulled value.
pub type PullOutcome = SyncOutcome<Answers>;

/// Target object to the fields written on it.
pub type PushOutcome = SyncOutcome<BTreeMap<String, Record>>;

/// One approved mapping compared across form and external system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRow {
    pub field_id: String,
    pub target_field: String,
    pub target_object: String,
    pub form_value: Value,
    pub external_value: Value,
    pub differs: bool,
}

struct ObjectGroup<'a> {
    object: &'a str,
    primary: bool,
    mappings: Vec<&'a FieldMapping>,
}

impl ObjectGroup<'_> {
    fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self
            .mappings
            .iter()
            .map(|m| m.target_field.as_str())
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    /// Key used in `fields_synced`: bare for the primary object.
    fn log_key(&self, mapping: &FieldMapping) -> String {
        if self.primary {
            mapping.target_field.clone()
        } else {
            format!("{}.{}", self.object, mapping.target_field)
        }
    }
}

/// Per-call bookkeeping.
struct Run<'a> {
    direction: SyncDirection,
    form_id: &'a str,
    record_ref: &'a str,
    synced: BTreeMap<String, FieldDelta>,
    failures: Vec<ObjectFailure>,
}

#[derive(Debug)]
pub struct SyncEngine<A> {
    accessor: A,
    objects: Vec<String>,
    mappings: MappingRepository,
    audit: AuditTrail,
    sync_log: SyncLog,
}

impl<A: RecordAccessor> SyncEngine<A> {
    /// `catalog` fixes object order; its first object is the primary one.
    pub fn new(
        accessor: A,
        catalog: &TargetCatalog,
        mappings: MappingRepository,
        audit: AuditTrail,
        sync_log: SyncLog,
    ) -> Self {
        Self {
            accessor,
            objects: catalog.objects.iter().map(|o| o.name.clone()).collect(),
            mappings,
            audit,
            sync_log,
        }
    }

    /// Engine over the standard layout under `data_dir`.
    pub fn open(accessor: A, catalog: &TargetCatalog, data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        Ok(Self::new(
            accessor,
            catalog,
            MappingRepository::open(data_dir.join("mappings"))?,
            AuditTrail::open(data_dir.join("audit"))?,
            SyncLog::in_data_dir(data_dir),
        ))
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn sync_log(&self) -> &SyncLog {
        &self.sync_log
    }

    fn is_primary(&self, object: &str) -> bool {
        self.objects.first().is_some_and(|p| p == object)
    }

    /// Approved mappings by object: primary first, then catalog order, then
    /// objects the catalog does not list, by name.
    fn group_approved<'s>(&self, set: &'s MappingSet) -> Vec<ObjectGroup<'s>> {
        let mut groups: Vec<ObjectGroup<'s>> = Vec::new();
        for mapping in set.approved() {
            match groups
                .iter_mut()
                .find(|g| g.object == mapping.target_object)
            {
                Some(group) => group.mappings.push(mapping),
                None => groups.push(ObjectGroup {
                    object: mapping.target_object.as_str(),
                    primary: self.is_primary(&mapping.target_object),
                    mappings: vec![mapping],
                }),
            }
        }
        groups.sort_by_key(|g| {
            (
                self.objects
                    .iter()
                    .position(|o| o == g.object)
                    .unwrap_or(usize::MAX),
                g.object,
            )
        });
        groups
    }

    /// Id of the auxiliary record tied to `primary_ref`.
    fn related_id(&self, object: &str, primary_ref: &str) -> std::result::Result<String, AccessError> {
        let related = self
            .accessor
            .find_or_create_related(object, primary_ref)?
            .ok_or_else(|| AccessError::rejected(object, "could not find or create related record"))?;
        record_id(&related)
            .map(str::to_string)
            .ok_or_else(|| AccessError::rejected(object, "related record has no Id"))
    }

    fn fetch_group(
        &self,
        group: &ObjectGroup<'_>,
        record_ref: &str,
        primary_id: &str,
    ) -> std::result::Result<Record, AccessError> {
        let fields = group.fields();
        let target_ref = if group.primary {
            record_ref.to_string()
        } else {
            self.related_id(group.object, primary_id)?
        };
        self.accessor
            .fetch(group.object, &target_ref, &fields)?
            .ok_or_else(|| AccessError::not_found(group.object, &target_ref))
    }

    /// Values from the external record for every approved mapping of `form_id`.
    ///
    /// Only non-blank external values are returned. `answers` supplies the
    /// old side of each logged delta and is not modified.
    pub fn pull(&self, form_id: &str, answers: &Answers, record_ref: &str) -> Result<PullOutcome> {
        let span = info_span!("sync", form_id, direction = "pull");
        let _enter = span.enter();

        let mut run = Run::new(SyncDirection::Pull, form_id, record_ref);
        let set = self.mappings.load(form_id)?;
        let groups = set
            .as_ref()
            .map(|s| self.group_approved(s))
            .unwrap_or_default();
        if groups.is_empty() {
            return self.finish(run, Answers::new(), Some(NO_APPROVED_MAPPINGS));
        }

        let mut values = Answers::new();
        let mut primary_id = record_ref.to_string();
        for group in &groups {
            let record = match self.fetch_group(group, record_ref, &primary_id) {
                Ok(record) => record,
                Err(error) => {
                    self.record_failure(&mut run, group.object, &error, BTreeMap::new())?;
                    continue;
                }
            };
            if group.primary
                && let Some(id) = record_id(&record)
            {
                primary_id = id.to_string();
            }
            for mapping in &group.mappings {
                let Some(value) = record
                    .get(&mapping.target_field)
                    .filter(|v| !is_blank(Some(*v)))
                else {
                    continue;
                };
                values.insert(mapping.field_id.clone(), value.clone());
                run.synced.insert(
                    group.log_key(mapping),
                    FieldDelta {
                        old: answers
                            .get(&mapping.field_id)
                            .cloned()
                            .unwrap_or_else(|| Value::String(String::new())),
                        new: value.clone(),
                    },
                );
            }
        }

        let note = values.is_empty().then_some(NOTHING_TO_PULL);
        self.finish(run, values, note)
    }

    /// Write non-blank answers to the external record through approved
    /// mappings. Auxiliary records are created when missing.
    pub fn push(&self, form_id: &str, answers: &Answers, record_ref: &str) -> Result<PushOutcome> {
        let span = info_span!("sync", form_id, direction = "push");
        let _enter = span.enter();

        let mut run = Run::new(SyncDirection::Push, form_id, record_ref);
        let set = self.mappings.load(form_id)?;
        let groups = set
            .as_ref()
            .map(|s| self.group_approved(s))
            .unwrap_or_default();
        if groups.is_empty() {
            return self.finish(run, BTreeMap::new(), Some(NO_APPROVED_MAPPINGS));
        }

        let batches: Vec<(&ObjectGroup<'_>, Record, BTreeMap<String, FieldDelta>)> = groups
            .iter()
            .map(|group| {
                let mut updates = Record::new();
                let mut deltas = BTreeMap::new();
                for mapping in &group.mappings {
                    let Some(value) = answers
                        .get(&mapping.field_id)
                        .filter(|v| !is_blank(Some(*v)))
                    else {
                        continue;
                    };
                    updates.insert(mapping.target_field.clone(), value.clone());
                    deltas.insert(
                        group.log_key(mapping),
                        FieldDelta {
                            old: Value::Null,
                            new: value.clone(),
                        },
                    );
                }
                (group, updates, deltas)
            })
            .filter(|(_, updates, _)| !updates.is_empty())
            .collect();

        if batches.is_empty() {
            return self.finish(run, BTreeMap::new(), Some(NOTHING_TO_PUSH));
        }

        let mut written: BTreeMap<String, Record> = BTreeMap::new();
        for (group, updates, deltas) in batches {
            let result = if group.primary {
                self.accessor.write(group.object, record_ref, &updates)
            } else {
                self.related_id(group.object, record_ref)
                    .and_then(|id| self.accessor.write(group.object, &id, &updates))
            };
            match result {
                Ok(()) => {
                    run.synced.extend(deltas);
                    written.insert(group.object.to_string(), updates);
                }
                Err(error) => self.record_failure(&mut run, group.object, &error, deltas)?,
            }
        }

        self.finish(run, written, None)
    }

    /// Compare form answers with external values for every approved mapping.
    ///
    /// `external` is keyed by target field; auxiliary objects are looked up
    /// as `Object.Field` first. Absent, `null` and `""` compare equal. Nothing
    /// is logged.
    pub fn diff(&self, form_id: &str, answers: &Answers, external: &Record) -> Result<Vec<DiffRow>> {
        let Some(set) = self.mappings.load(form_id)? else {
            return Ok(Vec::new());
        };

        Ok(set
            .approved()
            .map(|mapping| {
                let external_value = if self.is_primary(&mapping.target_object) {
                    external.get(&mapping.target_field)
                } else {
                    external
                        .get(&format!("{}.{}", mapping.target_object, mapping.target_field))
                        .or_else(|| external.get(&mapping.target_field))
                };
                let form_value = answers.get(&mapping.field_id);
                DiffRow {
                    field_id: mapping.field_id.clone(),
                    target_field: mapping.target_field.clone(),
                    target_object: mapping.target_object.clone(),
                    differs: normalize_value(form_value) != normalize_value(external_value),
                    form_value: or_empty(form_value),
                    external_value: or_empty(external_value),
                }
            })
            .collect())
    }

    /// External values for the approved mappings of `form_id`, keyed the way
    /// [`diff`](Self::diff) expects. Objects that fail are left out. Nothing
    /// is logged.
    pub fn snapshot(&self, form_id: &str, record_ref: &str) -> Result<Record> {
        let Some(set) = self.mappings.load(form_id)? else {
            return Ok(Record::new());
        };
        let mut snapshot = Record::new();
        let mut primary_id = record_ref.to_string();
        for group in self.group_approved(&set) {
            match self.fetch_group(&group, record_ref, &primary_id) {
                Ok(record) => {
                    if group.primary
                        && let Some(id) = record_id(&record)
                    {
                        primary_id = id.to_string();
                    }
                    for mapping in &group.mappings {
                        if let Some(value) = record.get(&mapping.target_field) {
                            snapshot.insert(group.log_key(mapping), value.clone());
                        }
                    }
                }
                Err(error) => warn!(object = group.object, %error, "snapshot skipped object"),
            }
        }
        Ok(snapshot)
    }

    fn record_failure(
        &self,
        run: &mut Run<'_>,
        object: &str,
        error: &AccessError,
        attempted: BTreeMap<String, FieldDelta>,
    ) -> Result<()> {
        let message = format!("{object} {} failed: {error}", run.direction);
        warn!(object, %error, "object sync failed");

        self.sync_log.append(&SyncLogEntry {
            timestamp: Utc::now(),
            direction: run.direction,
            form_id: run.form_id.to_string(),
            record_ref: run.record_ref.to_string(),
            fields_synced: attempted,
            status: SyncStatus::Failed,
            error: message.clone(),
        })?;
        self.audit.append(
            &AuditEntry::new(AuditAction::SyncObjectFailed, run.form_id)
                .with_detail("direction", run.direction.as_str())
                .with_detail("object", object)
                .with_detail("record_ref", run.record_ref)
                .with_detail("error", message.as_str()),
        )?;

        run.failures.push(ObjectFailure {
            object: object.to_string(),
            error: message,
        });
        Ok(())
    }

    fn finish<T>(&self, run: Run<'_>, values: T, note: Option<&str>) -> Result<SyncOutcome<T>> {
        let status = summarize(run.synced.len(), run.failures.len());
        let error = if run.failures.is_empty() {
            note.unwrap_or_default().to_string()
        } else {
            run.failures
                .iter()
                .map(|f| f.error.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };

        let fields_count = run.synced.len();
        self.sync_log.append(&SyncLogEntry {
            timestamp: Utc::now(),
            direction: run.direction,
            form_id: run.form_id.to_string(),
            record_ref: run.record_ref.to_string(),
            fields_synced: run.synced,
            status,
            error: error.clone(),
        })?;

        let failed_objects: Vec<&str> = run.failures.iter().map(|f| f.object.as_str()).collect();
        let mut entry = AuditEntry::new(AuditAction::SyncExecuted, run.form_id)
            .with_detail("direction", run.direction.as_str())
            .with_detail("record_ref", run.record_ref)
            .with_detail("fields_count", fields_count)
            .with_detail("status", status.to_string())
            .with_detail("failed_objects", json!(failed_objects));
        if !error.is_empty() {
            entry = entry.with_detail("error", error);
        }
        self.audit.append(&entry)?;

        info!(
            form_id = run.form_id,
            direction = %run.direction,
            %status,
            fields = fields_count,
            failed = run.failures.len(),
            "sync finished"
        );
        Ok(SyncOutcome {
            values,
            status,
            failures: run.failures,
        })
    }
}

impl<'a> Run<'a> {
    fn new(direction: SyncDirection, form_id: &'a str, record_ref: &'a str) -> Self {
        Self {
            direction,
            form_id,
            record_ref,
            synced: BTreeMap::new(),
            failures: Vec::new(),
        }
    }
}

fn summarize(synced: usize, failed: usize) -> SyncStatus {
    match (synced, failed) {
        (0, 0) => SyncStatus::Partial,
        (_, 0) => SyncStatus::Success,
        (0, _) => SyncStatus::Failed,
        _ => SyncStatus::Partial,
    }
}

fn or_empty(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(v) => v.clone(),
    }
}
