use std::fs;

use fieldlink_map::{
    HistoryIndex, MapError, MappingStore, Resolver, ResolverConfig, SynonymTable, default_synonyms,
};
use fieldlink_model::{
    AuditAction, FieldDescriptor, FieldMapping, FormSchema, MappingSet, MatchMethod, ObjectKind,
    TargetCatalog, TargetObject,
};
use proptest::prelude::*;
use tempfile::tempdir;

fn catalog() -> TargetCatalog {
    TargetCatalog::new(vec![
        TargetObject::new("Contact", ObjectKind::Primary)
            .with_field("LastName", "Last Name")
            .with_field("FirstName", "First Name")
            .with_field("Phone", "Phone"),
    ])
    .unwrap()
}

fn mapping(field: &str, target: &str, method: MatchMethod, confidence: f64) -> FieldMapping {
    FieldMapping {
        target_field: target.into(),
        method,
        confidence,
        ..FieldMapping::unmapped("A", field, "Contact")
    }
}

#[test]
fn review_walkthrough() {
    let dir = tempdir().unwrap();
    let store = MappingStore::open(dir.path()).unwrap();

    let form_a = FormSchema::new("A", "Form A", vec![FieldDescriptor::new("fam", "Family Name")])
        .unwrap();
    let resolver = Resolver::new(
        &catalog(),
        default_synonyms(),
        HistoryIndex::new(),
        ResolverConfig::default(),
    );
    let set = resolver.resolve(&form_a).unwrap();
    store.install(&set, "ops").unwrap();

    let stored = store.load("A").unwrap().unwrap();
    let fam = stored.get("fam").unwrap();
    assert_eq!((fam.method, fam.confidence), (MatchMethod::Synonym, 0.95));

    assert!(store.reject("A", "fam", "ops").unwrap());
    let fam = store.load("A").unwrap().unwrap().get("fam").cloned().unwrap();
    assert_eq!(fam.target_field, "");
    assert_eq!(fam.confidence, 0.0);
    assert!(!fam.approved);

    assert!(store
        .override_mapping("A", "fam", "LastName", "Contact", "ops")
        .unwrap());
    let fam = store.load("A").unwrap().unwrap().get("fam").cloned().unwrap();
    assert_eq!(fam.method, MatchMethod::Manual);
    assert_eq!(fam.confidence, 1.0);
    assert!(fam.is_approved());

    let actions: Vec<_> = store
        .audit()
        .for_form("A", 10)
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::MappingOverridden,
            AuditAction::MappingRejected,
            AuditAction::MappingSetCreated,
        ]
    );

    // Form B learns nothing from synonyms and lands in fuzzy territory.
    let form_b = FormSchema::new("B", "Form B", vec![FieldDescriptor::new("sn", "Lst Name")])
        .unwrap();
    let resolver_b = Resolver::new(
        &catalog(),
        SynonymTable::empty(),
        HistoryIndex::new(),
        ResolverConfig::default(),
    );
    store.install(&resolver_b.resolve(&form_b).unwrap(), "ops").unwrap();
    let sn = store.load("B").unwrap().unwrap().get("sn").cloned().unwrap();
    assert_eq!(sn.method, MatchMethod::Fuzzy);
    assert!(!sn.approved);

    assert_eq!(store.bulk_approve_high_confidence("B", 0.9, "ops").unwrap(), 0);
    assert_eq!(store.bulk_approve_high_confidence("B", 0.6, "ops").unwrap(), 1);
    assert!(store.load("B").unwrap().unwrap().get("sn").unwrap().is_approved());
}

#[test]
fn bulk_approval_respects_threshold_and_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = MappingStore::open(dir.path()).unwrap();
    let set = MappingSet::new(
        "A",
        vec![
            mapping("a", "LastName", MatchMethod::Exact, 1.0),
            mapping("b", "FirstName", MatchMethod::Synonym, 0.95),
            mapping("c", "Phone", MatchMethod::Fuzzy, 0.7),
            mapping("d", "", MatchMethod::None, 0.0),
        ],
    )
    .unwrap();
    store.install(&set, "ops").unwrap();

    assert_eq!(store.bulk_approve_high_confidence("A", 0.9, "ops").unwrap(), 2);
    let before = store.audit().recent(100).unwrap().len();
    assert_eq!(store.bulk_approve_high_confidence("A", 0.9, "ops").unwrap(), 0);
    assert_eq!(store.audit().recent(100).unwrap().len(), before);

    let stored = store.load("A").unwrap().unwrap();
    assert!(stored.get("a").unwrap().approved);
    assert!(stored.get("b").unwrap().approved);
    assert!(!stored.get("c").unwrap().approved);
    assert!(!stored.get("d").unwrap().approved);

    let bulk = &store.audit().recent(1).unwrap()[0];
    assert_eq!(bulk.action, AuditAction::BulkMappingApproved);
    assert_eq!(bulk.details["count"], 2);
}

#[test]
fn remap_keeps_prior_approvals() {
    let dir = tempdir().unwrap();
    let store = MappingStore::open(dir.path()).unwrap();
    let resolver = Resolver::new(
        &catalog(),
        default_synonyms(),
        HistoryIndex::new(),
        ResolverConfig::default(),
    );

    let v1 = FormSchema::new(
        "A",
        "Form A",
        vec![
            FieldDescriptor::new("ln", "Last Name"),
            FieldDescriptor::new("cell", "Cell"),
        ],
    )
    .unwrap();
    store.install(&resolver.resolve(&v1).unwrap(), "ops").unwrap();
    store
        .override_mapping("A", "cell", "Phone", "Contact", "maria")
        .unwrap();

    let v2 = FormSchema::new(
        "A",
        "Form A",
        vec![
            FieldDescriptor::new("cell", "Cell"),
            FieldDescriptor::new("fn", "First Name"),
        ],
    )
    .unwrap();
    let outcome = store.remap(&v2, &resolver, "ops").unwrap();

    assert_eq!(outcome.preserved, vec!["cell"]);
    assert_eq!(outcome.set.version, 2);
    let cell = outcome.set.get("cell").unwrap();
    assert_eq!(cell.target_field, "Phone");
    assert_eq!(cell.approved_by, "maria");
    assert!(outcome.set.get("ln").is_none());
    assert_eq!(outcome.set.get("fn").unwrap().method, MatchMethod::Exact);

    assert_eq!(store.load("A").unwrap().unwrap(), outcome.set);
    assert_eq!(
        store.audit().recent(1).unwrap()[0].action,
        AuditAction::MappingSetRemapped
    );
}

#[test]
fn history_index_excludes_the_current_form() {
    let dir = tempdir().unwrap();
    let store = MappingStore::open(dir.path()).unwrap();
    let mut a = MappingSet::new("A", vec![mapping("ph", "Phone", MatchMethod::Manual, 1.0)])
        .unwrap();
    a.mappings[0].approved = true;
    store.install(&a, "ops").unwrap();

    assert_eq!(store.history_index(&[], None).unwrap().len(), 1);
    assert!(store.history_index(&[], Some("A")).unwrap().is_empty());
}

#[test]
fn save_failure_propagates_and_logs_nothing() {
    let dir = tempdir().unwrap();
    let store = MappingStore::open(dir.path()).unwrap();
    let set = MappingSet::new("A", vec![mapping("a", "LastName", MatchMethod::Exact, 1.0)])
        .unwrap();
    store.install(&set, "ops").unwrap();

    // A directory squatting on the temp path makes the write fail.
    fs::create_dir(dir.path().join("mappings/A.json.tmp")).unwrap();
    let err = store.approve("A", "a", "ops").unwrap_err();
    assert!(matches!(err, MapError::Io { .. }));
    assert_eq!(store.audit().recent(10).unwrap().len(), 1);
    assert!(!store.load("A").unwrap().unwrap().get("a").unwrap().approved);
}

#[test]
fn lookalike_form_ids_keep_separate_sets() {
    let dir = tempdir().unwrap();
    let store = MappingStore::open(dir.path()).unwrap();
    let spaced = MappingSet::new(
        "I 589",
        vec![FieldMapping {
            target_field: "LastName".into(),
            method: MatchMethod::Exact,
            confidence: 1.0,
            ..FieldMapping::unmapped("I 589", "family_name", "Contact")
        }],
    )
    .unwrap();
    store.install(&spaced, "ops").unwrap();
    assert!(store.approve("I 589", "family_name", "ops").unwrap());

    for form in ["I_589", "I/589"] {
        let other = MappingSet::new(form, vec![FieldMapping::unmapped(form, "other", "Contact")])
            .unwrap();
        store.install(&other, "ops").unwrap();
    }

    let kept = store.load("I 589").unwrap().unwrap();
    assert_eq!(kept.form_id, "I 589");
    assert!(kept.get("family_name").unwrap().is_approved());
    assert!(kept.get("other").is_none());
    assert_eq!(store.load("I_589").unwrap().unwrap().form_id, "I_589");
    assert_eq!(store.list().unwrap().len(), 3);
}

#[test]
fn audit_failure_after_save_is_reported() {
    let dir = tempdir().unwrap();
    let store = MappingStore::open(dir.path()).unwrap();
    let set = MappingSet::new("A", vec![mapping("a", "LastName", MatchMethod::Exact, 1.0)])
        .unwrap();
    store.install(&set, "ops").unwrap();

    // Today's partition replaced by a directory cannot be appended to.
    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d");
    let partition = dir.path().join(format!("audit/{today}.jsonl"));
    fs::remove_file(&partition).unwrap();
    fs::create_dir(&partition).unwrap();

    let err = store.approve("A", "a", "ops").unwrap_err();
    assert!(matches!(err, MapError::Audit(_)));
    assert!(store.load("A").unwrap().unwrap().get("a").unwrap().approved);
}

fn any_method() -> impl Strategy<Value = MatchMethod> {
    prop_oneof![
        Just(MatchMethod::Exact),
        Just(MatchMethod::Synonym),
        Just(MatchMethod::History),
        Just(MatchMethod::Fuzzy),
        Just(MatchMethod::Manual),
        Just(MatchMethod::None),
    ]
}

fn any_mapping() -> impl Strategy<Value = FieldMapping> {
    (
        prop_oneof![Just(String::new()), "[A-Z][a-z]{1,8}(__c)?"],
        any_method(),
        0.0f64..=1.0,
        any::<bool>(),
    )
        .prop_map(|(target, method, confidence, approved)| FieldMapping {
            approved,
            approved_by: if approved { "someone".into() } else { String::new() },
            ..mapping("f", &target, method, confidence)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn reject_always_clears(prior in any_mapping()) {
        let dir = tempdir().unwrap();
        let store = MappingStore::open(dir.path()).unwrap();
        store.install(&MappingSet::new("A", vec![prior]).unwrap(), "ops").unwrap();

        prop_assert!(store.reject("A", "f", "ops").unwrap());
        let after = store.load("A").unwrap().unwrap().get("f").cloned().unwrap();
        prop_assert_eq!(after.target_field.as_str(), "");
        prop_assert_eq!(after.confidence, 0.0);
        prop_assert_eq!(after.method, MatchMethod::None);
        prop_assert!(!after.approved);
        prop_assert!(after.approved_at.is_none());
    }

    #[test]
    fn override_always_approves(prior in any_mapping(), target in "[A-Z][a-z]{1,8}") {
        let dir = tempdir().unwrap();
        let store = MappingStore::open(dir.path()).unwrap();
        store.install(&MappingSet::new("A", vec![prior]).unwrap(), "ops").unwrap();

        prop_assert!(store.override_mapping("A", "f", &target, "Contact", "ops").unwrap());
        let after = store.load("A").unwrap().unwrap().get("f").cloned().unwrap();
        prop_assert_eq!(after.method, MatchMethod::Manual);
        prop_assert_eq!(after.confidence, 1.0);
        prop_assert!(after.is_approved());
        prop_assert_eq!(after.target_field, target);
    }

    #[test]
    fn bulk_never_approves_below_threshold(
        confidences in proptest::collection::vec(0.0f64..=1.0, 1..8),
        threshold in 0.0f64..=1.0,
    ) {
        let dir = tempdir().unwrap();
        let store = MappingStore::open(dir.path()).unwrap();
        let mappings = confidences
            .iter()
            .enumerate()
            .map(|(i, c)| FieldMapping {
                field_id: format!("f{i}"),
                ..mapping("f", "Phone", MatchMethod::Fuzzy, *c)
            })
            .collect();
        store.install(&MappingSet::new("A", mappings).unwrap(), "ops").unwrap();

        let approved = store.bulk_approve_high_confidence("A", threshold, "ops").unwrap();
        let expected = confidences.iter().filter(|c| **c >= threshold).count();
        prop_assert_eq!(approved, expected);
        prop_assert_eq!(store.bulk_approve_high_confidence("A", threshold, "ops").unwrap(), 0);
        for m in store.load("A").unwrap().unwrap().mappings {
            prop_assert_eq!(m.approved, m.confidence >= threshold);
        }
    }
}
