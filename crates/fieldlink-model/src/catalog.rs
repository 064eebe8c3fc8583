//! Snapshot of the external system's schema.
//!
//! The catalog is an explicitly ordered list of target objects. The first
//! object is the primary record type; the rest are auxiliary objects related
//! to it. Order is priority: when two objects carry a field with the same
//! label, the earlier object wins.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::ids::require_id;

/// Role of a target object relative to the primary record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    #[default]
    Primary,
    Auxiliary,
}

/// A named attribute on a target object with its human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetObject {
    pub name: String,
    #[serde(default)]
    pub kind: ObjectKind,
    pub fields: Vec<TargetField>,
}

impl TargetObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, label: impl Into<String>) -> Self {
        self.fields.push(TargetField {
            name: name.into(),
            label: label.into(),
        });
        self
    }

    pub fn label_of(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.label.as_str())
    }
}

/// Ordered list of target objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCatalog {
    pub objects: Vec<TargetObject>,
}

impl TargetCatalog {
    /// Build a catalog, rejecting blank or duplicate object names.
    ///
    /// The first object must be the primary one.
    pub fn new(objects: Vec<TargetObject>) -> Result<Self> {
        let mut seen = std::collections::BTreeSet::new();
        for object in &objects {
            require_id(&object.name, ModelError::InvalidObjectName)?;
            if !seen.insert(object.name.as_str()) {
                return Err(ModelError::DuplicateObject(object.name.clone()));
            }
        }
        if let Some(first) = objects.first()
            && first.kind != ObjectKind::Primary
        {
            return Err(ModelError::MissingPrimary);
        }
        Ok(Self { objects })
    }

    pub fn primary(&self) -> Option<&TargetObject> {
        self.objects.first()
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.primary().map(|o| o.name.as_str())
    }

    pub fn object(&self, name: &str) -> Option<&TargetObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Position of an object in priority order.
    pub fn priority(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.name == name)
    }

    pub fn is_primary(&self, name: &str) -> bool {
        self.primary_name() == Some(name)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.iter().all(|o| o.fields.is_empty())
    }

    /// Every `(object, field)` pair in priority order.
    pub fn entries(&self) -> impl Iterator<Item = (&TargetObject, &TargetField)> {
        self.objects
            .iter()
            .flat_map(|object| object.fields.iter().map(move |field| (object, field)))
    }
}
