use std::collections::BTreeMap;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use fieldlink_map::MergedForms;
use fieldlink_model::{
    Answers, AuditEntry, FieldMapping, MappingSet, MatchMethod, Record, SyncLogEntry, SyncStatus,
    normalize_value,
};
use fieldlink_sync::{DiffRow, ObjectFailure, SyncOutcome};

pub fn print_mapping_set(set: &MappingSet) {
    println!("Form: {} (version {})", set.form_id, set.version);
    if let Some(at) = set.last_auto_mapped {
        println!("Auto-mapped: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Field"),
        header_cell("Object"),
        header_cell("Target"),
        header_cell("Method"),
        header_cell("Confidence"),
        header_cell("Approved"),
        header_cell("By"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Center);
    for mapping in &set.mappings {
        table.add_row(vec![
            Cell::new(&mapping.field_id).add_attribute(Attribute::Bold),
            text_or_dash(&mapping.target_object),
            text_or_dash(&mapping.target_field),
            method_cell(mapping.method),
            confidence_cell(mapping),
            approved_cell(mapping),
            text_or_dash(&mapping.approved_by),
        ]);
    }
    println!("{table}");
    let summary = set.summary();
    println!(
        "{} fields: {} approved, {} pending, {} unmatched",
        summary.total, summary.approved, summary.pending, summary.unmatched
    );
}

pub fn print_merged(merged: &MergedForms) {
    println!("Forms: {}", merged.form_ids().join(", "));
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Shared key"),
        header_cell("Target"),
        header_cell("Label"),
        header_cell("Forms"),
    ]);
    apply_table_style(&mut table);
    for shared in &merged.shared_fields {
        table.add_row(vec![
            Cell::new(&shared.key).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(shared.target.qualified()),
            Cell::new(&shared.descriptor.display_label),
            Cell::new(shared.forms.join(", ")),
        ]);
    }
    if merged.shared_fields.is_empty() {
        println!("No shared fields.");
    } else {
        println!("{table}");
    }

    let mut specific = Table::new();
    specific.set_header(vec![header_cell("Form"), header_cell("Form-specific fields")]);
    apply_table_style(&mut specific);
    align_column(&mut specific, 1, CellAlignment::Right);
    for form_id in merged.form_ids() {
        let count = merged.form_specific.get(form_id).map_or(0, Vec::len);
        specific.add_row(vec![Cell::new(form_id), Cell::new(count)]);
    }
    println!("{specific}");
}

pub fn print_audit(entries: &[AuditEntry]) {
    if entries.is_empty() {
        println!("No audit entries.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Time"),
        header_cell("Action"),
        header_cell("Form"),
        header_cell("Field"),
        header_cell("Details"),
    ]);
    apply_table_style(&mut table);
    for entry in entries {
        let details = entry
            .details
            .iter()
            .map(|(key, value)| format!("{key}={}", normalize_value(Some(value))))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            dim_cell(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.action.as_str()).fg(Color::Cyan),
            Cell::new(&entry.form_id),
            text_or_dash(&entry.field_id),
            Cell::new(details),
        ]);
    }
    println!("{table}");
}

pub fn print_sync_log(entries: &[SyncLogEntry]) {
    if entries.is_empty() {
        println!("No sync operations logged.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Time"),
        header_cell("Direction"),
        header_cell("Form"),
        header_cell("Record"),
        header_cell("Fields"),
        header_cell("Status"),
        header_cell("Error"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    for entry in entries {
        table.add_row(vec![
            dim_cell(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.direction.as_str()),
            Cell::new(&entry.form_id),
            Cell::new(&entry.record_ref),
            Cell::new(entry.fields_synced.len()),
            status_cell(entry.status),
            text_or_dash(&entry.error),
        ]);
    }
    println!("{table}");
}

pub fn print_pull(outcome: &SyncOutcome<Answers>) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Field"), header_cell("Value")]);
    apply_table_style(&mut table);
    for (field_id, value) in &outcome.values {
        table.add_row(vec![Cell::new(field_id), Cell::new(normalize_value(Some(value)))]);
    }
    if !outcome.values.is_empty() {
        println!("{table}");
    }
    print_status(outcome.status, outcome.values.len(), &outcome.failures);
}

pub fn print_push(outcome: &SyncOutcome<BTreeMap<String, Record>>) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Object"),
        header_cell("Field"),
        header_cell("Value"),
    ]);
    apply_table_style(&mut table);
    let mut written = 0usize;
    for (object, fields) in &outcome.values {
        for (field, value) in fields {
            written += 1;
            table.add_row(vec![
                Cell::new(object).fg(Color::Blue),
                Cell::new(field),
                Cell::new(normalize_value(Some(value))),
            ]);
        }
    }
    if written > 0 {
        println!("{table}");
    }
    print_status(outcome.status, written, &outcome.failures);
}

pub fn print_diff(rows: &[DiffRow]) {
    if rows.is_empty() {
        println!("No approved mappings to compare.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Field"),
        header_cell("Target"),
        header_cell("Form"),
        header_cell("External"),
        header_cell(""),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Center);
    for row in rows {
        let marker = if row.differs {
            Cell::new("≠").fg(Color::Yellow).add_attribute(Attribute::Bold)
        } else {
            dim_cell("=")
        };
        table.add_row(vec![
            Cell::new(&row.field_id),
            Cell::new(format!("{}.{}", row.target_object, row.target_field)),
            Cell::new(normalize_value(Some(&row.form_value))),
            Cell::new(normalize_value(Some(&row.external_value))),
            marker,
        ]);
    }
    println!("{table}");
    let differing = rows.iter().filter(|r| r.differs).count();
    println!("{differing} of {} fields differ", rows.len());
}

fn print_status(status: SyncStatus, fields: usize, failures: &[ObjectFailure]) {
    println!("Status: {status} ({fields} fields)");
    for failure in failures {
        eprintln!("- {}: {}", failure.object, failure.error);
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn method_cell(method: MatchMethod) -> Cell {
    let cell = Cell::new(method.as_str());
    match method {
        MatchMethod::Exact | MatchMethod::Manual => cell.fg(Color::Green),
        MatchMethod::Synonym | MatchMethod::History => cell.fg(Color::Blue),
        MatchMethod::Fuzzy => cell.fg(Color::Yellow),
        MatchMethod::None => cell.fg(Color::DarkGrey),
    }
}

fn confidence_cell(mapping: &FieldMapping) -> Cell {
    if mapping.has_target() {
        Cell::new(format!("{:.2}", mapping.confidence))
    } else {
        dim_cell("-")
    }
}

fn approved_cell(mapping: &FieldMapping) -> Cell {
    if mapping.is_approved() {
        Cell::new("✓")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    } else {
        dim_cell("-")
    }
}

fn status_cell(status: SyncStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        SyncStatus::Success => cell.fg(Color::Green),
        SyncStatus::Partial => cell.fg(Color::Yellow),
        SyncStatus::Failed => cell.fg(Color::Red).add_attribute(Attribute::Bold),
    }
}

fn text_or_dash(value: &str) -> Cell {
    if value.is_empty() {
        dim_cell("-")
    } else {
        Cell::new(value)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
