use chrono::{Duration, NaiveDate, TimeZone, Utc};
use fieldlink_audit::AuditTrail;
use fieldlink_model::{AuditAction, AuditEntry};
use tempfile::tempdir;

fn entry_at(action: AuditAction, form: &str, day: u32, hour: u32) -> AuditEntry {
    let mut entry = AuditEntry::new(action, form);
    entry.timestamp = Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap();
    entry
}

#[test]
fn entries_are_partitioned_by_date() {
    let dir = tempdir().unwrap();
    let trail = AuditTrail::open(dir.path()).unwrap();
    trail
        .append(&entry_at(AuditAction::MappingApproved, "I-589", 1, 9))
        .unwrap();
    trail
        .append(&entry_at(AuditAction::MappingRejected, "I-589", 2, 9))
        .unwrap();

    assert!(dir.path().join("2026-03-01.jsonl").is_file());
    assert!(dir.path().join("2026-03-02.jsonl").is_file());

    let day_one = trail
        .for_date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
        .unwrap();
    assert_eq!(day_one.len(), 1);
    assert_eq!(day_one[0].action, AuditAction::MappingApproved);
}

#[test]
fn recent_is_newest_first_across_partitions() {
    let dir = tempdir().unwrap();
    let trail = AuditTrail::open(dir.path()).unwrap();
    trail.append(&entry_at(AuditAction::MappingSetCreated, "A", 1, 8)).unwrap();
    trail.append(&entry_at(AuditAction::MappingApproved, "A", 1, 9)).unwrap();
    trail.append(&entry_at(AuditAction::MappingOverridden, "B", 3, 9)).unwrap();

    let recent = trail.recent(2).unwrap();
    let actions: Vec<_> = recent.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::MappingOverridden, AuditAction::MappingApproved]
    );
}

#[test]
fn for_form_filters_and_limits() {
    let dir = tempdir().unwrap();
    let trail = AuditTrail::open(dir.path()).unwrap();
    for hour in 0..5 {
        trail.append(&entry_at(AuditAction::MappingApproved, "A", 4, hour)).unwrap();
        trail.append(&entry_at(AuditAction::MappingApproved, "B", 4, hour)).unwrap();
    }

    let only_a = trail.for_form("A", 3).unwrap();
    assert_eq!(only_a.len(), 3);
    assert!(only_a.iter().all(|e| e.form_id == "A"));
    assert!(only_a[0].timestamp > only_a[2].timestamp);
    assert!(trail.for_form("C", 10).unwrap().is_empty());
}

#[test]
fn rereading_after_appends_yields_a_superset() {
    let dir = tempdir().unwrap();
    let trail = AuditTrail::open(dir.path()).unwrap();
    let base = Utc::now();
    for i in 0..3 {
        let mut entry = AuditEntry::new(AuditAction::SyncExecuted, "A").with_detail("n", i);
        entry.timestamp = base + Duration::seconds(i);
        trail.append(&entry).unwrap();
    }
    let before = trail.recent(usize::MAX).unwrap();

    let mut later = AuditEntry::new(AuditAction::SyncExecuted, "A").with_detail("n", 99);
    later.timestamp = base + Duration::seconds(10);
    trail.append(&later).unwrap();
    let after = trail.recent(usize::MAX).unwrap();

    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(&after[1..], &before[..]);
}

#[test]
fn concurrent_appends_never_interleave() {
    let dir = tempdir().unwrap();
    let trail = AuditTrail::open(dir.path()).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let trail = trail.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    let entry = AuditEntry::new(AuditAction::SyncExecuted, format!("form-{t}"))
                        .with_detail("i", i)
                        .with_detail("padding", "x".repeat(512));
                    trail.append(&entry).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(trail.recent(usize::MAX).unwrap().len(), 200);
}

#[test]
fn torn_entry_does_not_hide_the_rest_of_the_day() {
    use std::io::Write;

    let dir = tempdir().unwrap();
    let trail = AuditTrail::open(dir.path()).unwrap();
    trail.append(&entry_at(AuditAction::MappingApproved, "A", 5, 8)).unwrap();
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join("2026-03-05.jsonl"))
        .unwrap();
    file.write_all(b"{\"timestamp\":\"20").unwrap();
    drop(file);
    assert_eq!(trail.recent(10).unwrap().len(), 1);

    trail.append(&entry_at(AuditAction::MappingRejected, "A", 5, 9)).unwrap();
    let actions: Vec<_> = trail.recent(10).unwrap().iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::MappingRejected, AuditAction::MappingApproved]
    );
}
