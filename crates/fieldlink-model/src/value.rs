//! Field values exchanged between forms and the external record store.

use std::collections::BTreeMap;

use serde_json::Value;

/// Form answers keyed by field id.
pub type Answers = BTreeMap<String, Value>;

/// One external record (or a partial update of one) keyed by target field.
pub type Record = BTreeMap<String, Value>;

/// Absent, `null` and `""` all count as blank.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Render a value for comparison: blank becomes `""`, strings are unquoted.
pub fn normalize_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
