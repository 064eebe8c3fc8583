#![deny(unsafe_code)]

use std::fmt;

use crate::ModelError;

/// A `(target object, target field)` pair on the external record store.
///
/// Ordering is by object then field, so a `BTreeMap<TargetRef, _>` groups
/// every field of one object together.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TargetRef {
    pub object: String,
    pub field: String,
}

impl TargetRef {
    pub fn new(object: impl Into<String>, field: impl Into<String>) -> Result<Self, ModelError> {
        let object = object.into();
        let trimmed = object.trim();
        if trimmed.is_empty() {
            return Err(ModelError::InvalidObjectName(object));
        }
        Ok(Self {
            object: trimmed.to_string(),
            field: field.into().trim().to_string(),
        })
    }

    /// `Object.Field`, the key used for auxiliary-object values in sync logs
    /// and external value maps.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.object, self.field)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object, self.field)
    }
}

pub(crate) fn require_id(
    value: &str,
    err: impl FnOnce(String) -> ModelError,
) -> Result<String, ModelError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(err(value.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ref_trims_and_qualifies() {
        let target = TargetRef::new(" Contact ", "LastName ").unwrap();
        assert_eq!(target.object, "Contact");
        assert_eq!(target.qualified(), "Contact.LastName");
        assert_eq!(target.to_string(), "Contact.LastName");
    }

    #[test]
    fn target_ref_rejects_blank_object() {
        assert_eq!(
            TargetRef::new("  ", "LastName"),
            Err(ModelError::InvalidObjectName("  ".to_string()))
        );
    }
}
