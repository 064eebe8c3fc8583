//! Form field descriptors and form schemas.
//!
//! Schemas are produced upstream by the form ingestion pipeline and consumed
//! read-only by the resolver and the multi-form merger.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ModelError, Result};
use crate::ids::require_id;

/// Input widget type of a form field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Date,
    Select,
    Checkbox,
    Textarea,
    Combo,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Textarea => "textarea",
            FieldType::Combo => "combo",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(FieldType::Text),
            "date" => Ok(FieldType::Date),
            "select" => Ok(FieldType::Select),
            "checkbox" => Ok(FieldType::Checkbox),
            "textarea" => Ok(FieldType::Textarea),
            "combo" => Ok(FieldType::Combo),
            _ => Err(format!("Unknown field type: {s}")),
        }
    }
}

/// Whether a field describes the record subject (and so may be mapped to the
/// external record store) or something else, such as the preparer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    #[default]
    Mappable,
    Exempt,
}

impl Classification {
    pub fn is_mappable(&self) -> bool {
        matches!(self, Classification::Mappable)
    }
}

/// One form-local input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub field_id: String,
    pub display_label: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub classification: Classification,
}

impl FieldDescriptor {
    /// A mappable text field with no section.
    pub fn new(field_id: impl Into<String>, display_label: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            display_label: display_label.into(),
            field_type: FieldType::default(),
            section: String::new(),
            required: false,
            options: Vec::new(),
            classification: Classification::default(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn exempt(mut self) -> Self {
        self.classification = Classification::Exempt;
        self
    }
}

/// One form's fields, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub form_id: String,
    pub title: String,
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub version_hash: String,
}

impl FormSchema {
    /// Build a schema, validating ids and computing the version hash.
    pub fn new(
        form_id: impl Into<String>,
        title: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self> {
        let form_id = require_id(&form_id.into(), ModelError::InvalidFormId)?;
        let mut seen = std::collections::BTreeSet::new();
        for field in &fields {
            require_id(&field.field_id, ModelError::InvalidFieldId)?;
            if !seen.insert(field.field_id.as_str()) {
                return Err(ModelError::DuplicateField {
                    form_id,
                    field_id: field.field_id.clone(),
                });
            }
        }
        let mut schema = Self {
            form_id,
            title: title.into(),
            fields,
            version_hash: String::new(),
        };
        schema.version_hash = schema.compute_version_hash();
        Ok(schema)
    }

    /// First 16 hex chars of SHA-256 over the JSON array of sorted field ids.
    ///
    /// The array is written as `["a", "b"]` with every character outside
    /// printable ASCII escaped, so hashes agree with schemas ingested elsewhere.
    pub fn compute_version_hash(&self) -> String {
        let mut ids: Vec<&str> = self.fields.iter().map(|f| f.field_id.as_str()).collect();
        ids.sort_unstable();
        let quoted: Vec<String> = ids.into_iter().map(ascii_json_string).collect();
        let json = format!("[{}]", quoted.join(", "));
        let digest = Sha256::digest(json.as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    pub fn field(&self, field_id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    /// Fields grouped by section; sections appear in first-seen order.
    pub fn fields_by_section(&self) -> Vec<(&str, Vec<&FieldDescriptor>)> {
        let mut groups: Vec<(&str, Vec<&FieldDescriptor>)> = Vec::new();
        for field in &self.fields {
            match groups.iter_mut().find(|(s, _)| *s == field.section) {
                Some((_, members)) => members.push(field),
                None => groups.push((field.section.as_str(), vec![field])),
            }
        }
        groups
    }

    pub fn mappable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| f.classification.is_mappable())
    }
}

/// Old/new pair for one changed attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field_id: String,
    pub changes: BTreeMap<String, AttributeChange>,
}

/// Differences between two versions of the same form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<FieldChange>,
}

impl SchemaChanges {
    pub fn is_different(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty())
    }
}

/// JSON string literal using only printable ASCII.
fn ascii_json_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out.push('"');
    out
}

/// Compare two versions of a schema field by field.
pub fn compare_versions(old: &FormSchema, new: &FormSchema) -> SchemaChanges {
    let old_fields: BTreeMap<&str, &FieldDescriptor> =
        old.fields.iter().map(|f| (f.field_id.as_str(), f)).collect();
    let new_fields: BTreeMap<&str, &FieldDescriptor> =
        new.fields.iter().map(|f| (f.field_id.as_str(), f)).collect();

    let added = new_fields
        .keys()
        .filter(|id| !old_fields.contains_key(*id))
        .map(|id| (*id).to_string())
        .collect();
    let removed = old_fields
        .keys()
        .filter(|id| !new_fields.contains_key(*id))
        .map(|id| (*id).to_string())
        .collect();

    let mut changed = Vec::new();
    for (id, before) in &old_fields {
        let Some(after) = new_fields.get(id) else {
            continue;
        };
        let changes = attribute_changes(before, after);
        if !changes.is_empty() {
            changed.push(FieldChange {
                field_id: (*id).to_string(),
                changes,
            });
        }
    }

    SchemaChanges {
        added,
        removed,
        changed,
    }
}

fn attribute_changes(
    before: &FieldDescriptor,
    after: &FieldDescriptor,
) -> BTreeMap<String, AttributeChange> {
    let pairs = [
        (
            "display_label",
            before.display_label.clone(),
            after.display_label.clone(),
        ),
        (
            "field_type",
            before.field_type.to_string(),
            after.field_type.to_string(),
        ),
        ("section", before.section.clone(), after.section.clone()),
        (
            "required",
            before.required.to_string(),
            after.required.to_string(),
        ),
        (
            "options",
            before.options.join("|"),
            after.options.join("|"),
        ),
        (
            "classification",
            format!("{:?}", before.classification),
            format!("{:?}", after.classification),
        ),
    ];
    pairs
        .into_iter()
        .filter(|(_, old, new)| old != new)
        .map(|(name, old, new)| (name.to_string(), AttributeChange { old, new }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(ids: &[&str]) -> FormSchema {
        let fields = ids.iter().map(|id| FieldDescriptor::new(*id, *id)).collect();
        FormSchema::new("I-589", "Asylum", fields).unwrap()
    }

    #[test]
    fn version_hash_ignores_field_order() {
        let a = schema(&["b", "a", "c"]);
        let b = schema(&["c", "b", "a"]);
        assert_eq!(a.version_hash, b.version_hash);
        assert_eq!(a.version_hash.len(), 16);
        assert_ne!(a.version_hash, schema(&["a", "b"]).version_hash);
        assert_eq!(a.version_hash, "d33b202c020cbde1");
        assert_eq!(schema(&["b", "a"]).version_hash, "3554d2b8a1e34099");
    }

    #[test]
    fn version_hash_escapes_non_ascii_ids() {
        assert_eq!(
            schema(&["número", "apellido", "fecha_nacimiento"]).version_hash,
            "5b279793807ea203"
        );
        assert_eq!(
            schema(&["tab\there", "q\"x", "\u{7f}", "😀"]).version_hash,
            "f34a4d750487f492"
        );
    }

    #[test]
    fn duplicate_field_ids_are_rejected() {
        let fields = vec![FieldDescriptor::new("x", "X"), FieldDescriptor::new("x", "Y")];
        let err = FormSchema::new("F", "Form", fields).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateField { .. }));
    }

    #[test]
    fn blank_form_id_is_rejected() {
        let err = FormSchema::new("  ", "Form", vec![]).unwrap_err();
        assert_eq!(err, ModelError::InvalidFormId("  ".to_string()));
    }

    #[test]
    fn sections_keep_first_seen_order() {
        let fields = vec![
            FieldDescriptor::new("a", "A").with_section("Part B"),
            FieldDescriptor::new("b", "B").with_section("Part A"),
            FieldDescriptor::new("c", "C").with_section("Part B"),
        ];
        let schema = FormSchema::new("F", "Form", fields).unwrap();
        let sections: Vec<_> = schema
            .fields_by_section()
            .into_iter()
            .map(|(s, f)| (s.to_string(), f.len()))
            .collect();
        assert_eq!(
            sections,
            vec![("Part B".to_string(), 2), ("Part A".to_string(), 1)]
        );
    }

    #[test]
    fn compare_versions_reports_added_removed_and_changed() {
        let old = FormSchema::new(
            "F",
            "Form",
            vec![
                FieldDescriptor::new("name", "Name"),
                FieldDescriptor::new("dob", "DOB"),
            ],
        )
        .unwrap();
        let new = FormSchema::new(
            "F",
            "Form",
            vec![
                FieldDescriptor::new("name", "Full Name").with_required(true),
                FieldDescriptor::new("email", "Email"),
            ],
        )
        .unwrap();

        let changes = compare_versions(&old, &new);
        assert!(changes.is_different());
        assert_eq!(changes.added, vec!["email"]);
        assert_eq!(changes.removed, vec!["dob"]);
        assert_eq!(changes.changed.len(), 1);
        let name = &changes.changed[0];
        assert_eq!(name.field_id, "name");
        assert_eq!(name.changes["display_label"].new, "Full Name");
        assert_eq!(name.changes["required"].old, "false");
        assert!(!compare_versions(&old, &old).is_different());
    }
}
