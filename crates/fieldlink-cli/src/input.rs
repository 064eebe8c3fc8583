//! JSON documents handed to the CLI: form schemas, target catalogs, answers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use fieldlink_model::{Answers, FormSchema, TargetCatalog};
use serde::de::DeserializeOwned;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read {what} {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse {what} {}", path.display()))
}

/// A form schema. Ids are validated and the version hash recomputed, whatever
/// the document says.
pub fn load_schema(path: &Path) -> Result<FormSchema> {
    let raw: FormSchema = read_json(path, "form schema")?;
    FormSchema::new(raw.form_id, raw.title, raw.fields)
        .with_context(|| format!("invalid form schema {}", path.display()))
}

pub fn load_schemas(paths: &[impl AsRef<Path>]) -> Result<Vec<FormSchema>> {
    paths.iter().map(|p| load_schema(p.as_ref())).collect()
}

/// An ordered target catalog; the first object must be the primary one.
pub fn load_catalog(path: &Path) -> Result<TargetCatalog> {
    let raw: TargetCatalog = read_json(path, "target catalog")?;
    TargetCatalog::new(raw.objects)
        .with_context(|| format!("invalid target catalog {}", path.display()))
}

/// Field id to value. A missing path means no answers.
pub fn load_answers(path: Option<&Path>) -> Result<Answers> {
    match path {
        Some(path) => read_json(path, "answers"),
        None => Ok(Answers::new()),
    }
}
