//! Documents on disk through resolve, review and sync.

use std::fs;
use std::path::Path;

use fieldlink_cli::config::Config;
use fieldlink_cli::input::{load_answers, load_catalog, load_schema};
use fieldlink_map::{
    HistoryIndex, MappingStore, MultiFormMerger, Resolver, ResolverConfig, default_synonyms,
};
use fieldlink_model::{MatchMethod, SyncStatus};
use fieldlink_sync::{JsonRecordStore, SyncEngine};
use serde_json::json;
use tempfile::tempdir;

const CATALOG: &str = r#"{
  "objects": [
    {"name": "Contact", "kind": "primary", "fields": [
      {"name": "LastName", "label": "Last Name"},
      {"name": "FirstName", "label": "First Name"},
      {"name": "Birthdate", "label": "Birthdate"}
    ]},
    {"name": "Plus", "kind": "auxiliary", "fields": [
      {"name": "Alias__c", "label": "Other Names Used"}
    ]}
  ]
}"#;

const ASYLUM: &str = r#"{
  "form_id": "I-589",
  "title": "Application for Asylum",
  "fields": [
    {"field_id": "last", "display_label": "Last Name"},
    {"field_id": "given", "display_label": "Given Name"},
    {"field_id": "aliases", "display_label": "Other Names Used"},
    {"field_id": "preparer", "display_label": "Preparer Name", "classification": "exempt"}
  ]
}"#;

const WORK_PERMIT: &str = r#"{
  "form_id": "I-765",
  "title": "Employment Authorization",
  "fields": [
    {"field_id": "family", "display_label": "Last Name"},
    {"field_id": "dob", "display_label": "Date of Birth"}
  ]
}"#;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn config_file_points_at_data_dir() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let path = write(
        dir.path(),
        "fieldlink.toml",
        &format!("data_dir = {:?}\nactor = \"reviewer\"\n", data.display().to_string()),
    );
    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.data_dir, data);
    assert_eq!(config.actor, "reviewer");
    assert_eq!(config.bulk_approve_threshold, 0.9);
}

#[test]
fn explicit_missing_config_is_an_error() {
    let dir = tempdir().unwrap();
    let absent = dir.path().join("absent.toml");
    assert!(Config::load(Some(absent.as_path())).is_err());
}

#[test]
fn resolve_review_merge_and_sync() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let catalog = load_catalog(&write(dir.path(), "catalog.json", CATALOG)).unwrap();
    let asylum = load_schema(&write(dir.path(), "i589.json", ASYLUM)).unwrap();
    let work = load_schema(&write(dir.path(), "i765.json", WORK_PERMIT)).unwrap();
    let store = MappingStore::open(&data).unwrap();

    let resolver = Resolver::new(
        &catalog,
        default_synonyms(),
        HistoryIndex::new(),
        ResolverConfig::default(),
    );
    let set = resolver.resolve(&asylum).unwrap();
    assert_eq!(set.mappings.len(), 3);
    assert_eq!(set.get("last").unwrap().method, MatchMethod::Exact);
    assert_eq!(set.get("given").unwrap().method, MatchMethod::Synonym);
    assert_eq!(set.get("aliases").unwrap().target_object, "Plus");
    store.install(&set, "reviewer").unwrap();
    assert_eq!(
        store
            .bulk_approve_high_confidence("I-589", 0.9, "reviewer")
            .unwrap(),
        3
    );

    // The second form learns nothing new but shares LastName.
    let history = store.history_index(&[asylum.clone()], Some("I-765")).unwrap();
    let resolver = Resolver::new(
        &catalog,
        default_synonyms(),
        history,
        ResolverConfig::default(),
    );
    let work_set = resolver.resolve(&work).unwrap();
    store.install(&work_set, "reviewer").unwrap();
    store
        .bulk_approve_high_confidence("I-765", 0.9, "reviewer")
        .unwrap();

    let sets = store.list().unwrap();
    let merged = MultiFormMerger::default().merge(&[asylum, work], &sets);
    assert_eq!(merged.shared_fields.len(), 1);
    assert_eq!(merged.shared_fields[0].key, "shared_LastName");

    let records = write(
        dir.path(),
        "records.json",
        r#"{"Contact": {"c1": {"LastName": "Doe", "FirstName": "Jane"}}}"#,
    );
    let engine =
        SyncEngine::open(JsonRecordStore::new(&records), &catalog, &data).unwrap();
    let answers_path = write(
        dir.path(),
        "answers.json",
        r#"{"last": "Roe", "aliases": "JR"}"#,
    );
    let answers = load_answers(Some(answers_path.as_path())).unwrap();

    let pushed = engine.push("I-589", &answers, "c1").unwrap();
    assert_eq!(pushed.status, SyncStatus::Success);

    let pulled = engine.pull("I-589", &Default::default(), "c1").unwrap();
    assert_eq!(pulled.status, SyncStatus::Success);
    assert_eq!(pulled.values["last"], json!("Roe"));
    assert_eq!(pulled.values["given"], json!("Jane"));
    assert_eq!(pulled.values["aliases"], json!("JR"));

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&records).unwrap()).unwrap();
    assert_eq!(on_disk["Plus"]["Plus-1"]["Alias__c"], json!("JR"));
    assert_eq!(engine.sync_log().recent(10).unwrap().len(), 2);
}
