use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail, ensure};
use fieldlink_cli::config::{CONFIG_FILENAME, Config};
use fieldlink_cli::input::{load_answers, load_catalog, load_schema, load_schemas};
use fieldlink_cli::logging::redact_value;
use fieldlink_map::{MappingStore, MultiFormMerger, Resolver, ResolverConfig, default_synonyms};
use fieldlink_model::{AuditEntry, FormSchema, SyncStatus, TargetCatalog, normalize_value};
use fieldlink_sync::{JsonRecordStore, SyncEngine, SyncLog};
use tracing::{info, trace, warn};

use crate::cli::{
    AuditArgs, BulkApproveArgs, FieldArgs, FormArgs, MergeArgs, OverrideArgs, ResolveArgs,
    SyncArgs, SyncLogArgs,
};
use crate::summary::{
    print_audit, print_diff, print_mapping_set, print_merged, print_pull, print_push,
    print_sync_log,
};

/// Resolved settings for one invocation.
pub struct Session {
    config: Config,
}

impl Session {
    pub fn new(mut config: Config, data_dir: Option<PathBuf>, actor: Option<String>) -> Self {
        if let Some(data_dir) = data_dir {
            config.data_dir = data_dir;
        }
        if let Some(actor) = actor {
            config.actor = actor;
        }
        Self { config }
    }

    fn actor(&self) -> &str {
        &self.config.actor
    }

    fn store(&self) -> Result<MappingStore> {
        MappingStore::open(&self.config.data_dir)
            .with_context(|| format!("open data directory {}", self.config.data_dir.display()))
    }

    fn catalog(&self, explicit: Option<&Path>) -> Result<TargetCatalog> {
        let path = explicit
            .or(self.config.catalog.as_deref())
            .ok_or_else(|| {
                anyhow!("no target catalog: pass --catalog or set `catalog` in {CONFIG_FILENAME}")
            })?;
        load_catalog(path)
    }

    fn records(&self, explicit: Option<&Path>) -> Result<JsonRecordStore> {
        let path = explicit
            .or(self.config.records.as_deref())
            .ok_or_else(|| {
                anyhow!("no record file: pass --records or set `records` in {CONFIG_FILENAME}")
            })?;
        Ok(JsonRecordStore::new(path))
    }

    fn resolver(
        &self,
        store: &MappingStore,
        catalog: &TargetCatalog,
        schema: &FormSchema,
        history_schemas: &[PathBuf],
    ) -> Result<Resolver> {
        let schemas = load_schemas(history_schemas)?;
        let history = store.history_index(&schemas, Some(&schema.form_id))?;
        info!(entries = history.len(), "history index built");
        Ok(Resolver::new(
            catalog,
            default_synonyms(),
            history,
            ResolverConfig::default(),
        ))
    }
}

pub fn run_resolve(session: &Session, args: &ResolveArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let store = session.store()?;
    if store.repository().exists(&schema.form_id) {
        bail!(
            "mappings for {} already exist; use `fieldlink remap` to re-resolve",
            schema.form_id
        );
    }
    let catalog = session.catalog(args.catalog.catalog.as_deref())?;
    let resolver = session.resolver(&store, &catalog, &schema, &args.history_schemas)?;
    let set = resolver.resolve(&schema)?;
    store.install(&set, session.actor())?;
    print_mapping_set(&set);
    Ok(())
}

pub fn run_remap(session: &Session, args: &ResolveArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let store = session.store()?;
    let catalog = session.catalog(args.catalog.catalog.as_deref())?;
    let resolver = session.resolver(&store, &catalog, &schema, &args.history_schemas)?;
    let outcome = store.remap(&schema, &resolver, session.actor())?;
    print_mapping_set(&outcome.set);
    println!("Kept {} approved mapping(s)", outcome.preserved.len());
    Ok(())
}

pub fn run_mappings(session: &Session, args: &FormArgs) -> Result<()> {
    let set = session
        .store()?
        .load(&args.form_id)?
        .ok_or_else(|| anyhow!("no mappings stored for form {}", args.form_id))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&set)?);
    } else {
        print_mapping_set(&set);
    }
    Ok(())
}

pub fn run_approve(session: &Session, args: &FieldArgs) -> Result<()> {
    let found = session
        .store()?
        .approve(&args.form_id, &args.field_id, session.actor())?;
    report_field_change(found, "approved", args)
}

pub fn run_reject(session: &Session, args: &FieldArgs) -> Result<()> {
    let found = session
        .store()?
        .reject(&args.form_id, &args.field_id, session.actor())?;
    report_field_change(found, "rejected", args)
}

pub fn run_override(session: &Session, args: &OverrideArgs) -> Result<()> {
    let found = session.store()?.override_mapping(
        &args.form_id,
        &args.field_id,
        &args.target_field,
        &args.object,
        session.actor(),
    )?;
    ensure!(found, "unknown form or field: {}/{}", args.form_id, args.field_id);
    println!(
        "{}/{} -> {}.{} (manual, approved)",
        args.form_id, args.field_id, args.object, args.target_field
    );
    Ok(())
}

fn report_field_change(found: bool, verb: &str, args: &FieldArgs) -> Result<()> {
    ensure!(found, "unknown form or field: {}/{}", args.form_id, args.field_id);
    println!("{verb} {}/{}", args.form_id, args.field_id);
    Ok(())
}

pub fn run_bulk_approve(session: &Session, args: &BulkApproveArgs) -> Result<()> {
    let threshold = args
        .threshold
        .unwrap_or(session.config.bulk_approve_threshold);
    ensure!(
        (0.0..=1.0).contains(&threshold),
        "threshold must be within 0..=1, got {threshold}"
    );
    let store = session.store()?;
    let count = store.bulk_approve_high_confidence(&args.form_id, threshold, session.actor())?;
    println!(
        "approved {count} mapping(s) on {} at confidence >= {threshold}",
        args.form_id
    );
    Ok(())
}

pub fn run_merge(session: &Session, args: &MergeArgs) -> Result<()> {
    let schemas = load_schemas(&args.schemas)?;
    let store = session.store()?;
    let mut sets = Vec::with_capacity(schemas.len());
    for schema in &schemas {
        match store.load(&schema.form_id)? {
            Some(set) => sets.push(set),
            None => warn!(form_id = %schema.form_id, "no mappings stored, nothing shared"),
        }
    }
    let merger = MultiFormMerger::new(session.config.merge_options());
    let merged = merger.merge(&schemas, &sets);
    match &args.split {
        Some(path) => {
            let answers = load_answers(Some(path.as_path()))?;
            let per_form = merger.split(&merged, &answers);
            println!("{}", serde_json::to_string_pretty(&per_form)?);
        }
        None => print_merged(&merged),
    }
    Ok(())
}

pub fn run_audit(session: &Session, args: &AuditArgs) -> Result<()> {
    let store = session.store()?;
    let trail = store.audit();
    let entries: Vec<AuditEntry> = match (args.date, &args.form_id) {
        (Some(date), form_id) => {
            let mut entries = trail.for_date(date)?;
            if let Some(form_id) = form_id {
                entries.retain(|e| &e.form_id == form_id);
            }
            entries.truncate(args.limit);
            entries
        }
        (None, Some(form_id)) => trail.for_form(form_id, args.limit)?,
        (None, None) => trail.recent(args.limit)?,
    };
    print_audit(&entries);
    Ok(())
}

pub fn run_sync_log(session: &Session, args: &SyncLogArgs) -> Result<()> {
    let log = SyncLog::in_data_dir(&session.config.data_dir);
    let entries = match &args.form_id {
        Some(form_id) => log.for_form(form_id, args.limit)?,
        None => log.recent(args.limit)?,
    };
    print_sync_log(&entries);
    Ok(())
}

fn open_engine(session: &Session, args: &SyncArgs) -> Result<SyncEngine<JsonRecordStore>> {
    let catalog = session.catalog(args.catalog.catalog.as_deref())?;
    let records = session.records(args.records.as_deref())?;
    SyncEngine::open(records, &catalog, &session.config.data_dir)
        .with_context(|| format!("open data directory {}", session.config.data_dir.display()))
}

/// Pull external values. Returns the call's status.
pub fn run_pull(session: &Session, args: &SyncArgs) -> Result<SyncStatus> {
    let engine = open_engine(session, args)?;
    let answers = load_answers(args.answers.as_deref())?;
    let outcome = engine.pull(&args.form_id, &answers, &args.record_ref)?;
    for (field_id, value) in &outcome.values {
        let value = normalize_value(Some(value));
        trace!(%field_id, value = redact_value(&value), "pulled");
    }
    print_pull(&outcome);
    Ok(outcome.status)
}

/// Push form values. Returns the call's status.
pub fn run_push(session: &Session, args: &SyncArgs) -> Result<SyncStatus> {
    let engine = open_engine(session, args)?;
    let answers = load_answers(args.answers.as_deref())?;
    let outcome = engine.push(&args.form_id, &answers, &args.record_ref)?;
    print_push(&outcome);
    Ok(outcome.status)
}

pub fn run_diff(session: &Session, args: &SyncArgs) -> Result<()> {
    let engine = open_engine(session, args)?;
    let answers = load_answers(args.answers.as_deref())?;
    let external = engine.snapshot(&args.form_id, &args.record_ref)?;
    let rows = engine.diff(&args.form_id, &answers, &external)?;
    print_diff(&rows);
    Ok(())
}
