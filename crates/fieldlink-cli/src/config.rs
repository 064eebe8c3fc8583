//! `fieldlink.toml` settings.
//!
//! Every key is optional. The file is looked up at `--config` when given,
//! otherwise in the working directory; a missing default file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fieldlink_map::{DEFAULT_BULK_THRESHOLD, DEFAULT_SHARED_KEY_PREFIX, MergeOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONFIG_FILENAME: &str = "fieldlink.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Holds `mappings/`, `audit/` and `sync/`.
    pub data_dir: PathBuf,
    pub bulk_approve_threshold: f64,
    pub shared_key_prefix: String,
    /// Recorded as the approver when `--actor` is not given.
    pub actor: String,
    /// Target catalog JSON used by commands that need one.
    pub catalog: Option<PathBuf>,
    /// Local record file standing in for the external system.
    pub records: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bulk_approve_threshold: DEFAULT_BULK_THRESHOLD,
            shared_key_prefix: DEFAULT_SHARED_KEY_PREFIX.to_string(),
            actor: "user".to_string(),
            catalog: None,
            records: None,
        }
    }
}

impl Config {
    /// Read `explicit`, or `fieldlink.toml` in the working directory.
    ///
    /// An explicit path must exist; the default one may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILENAME), false),
        };
        match fs::read_to_string(&path) {
            Ok(content) => {
                let config = Self::parse(&content)
                    .with_context(|| format!("parse {}", path.display()))?;
                debug!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            Err(error) if !required && error.kind() == std::io::ErrorKind::NotFound => {
                debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(error) => Err(error).with_context(|| format!("read {}", path.display())),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        anyhow::ensure!(
            (0.0..=1.0).contains(&config.bulk_approve_threshold),
            "bulk_approve_threshold must be within 0..=1, got {}",
            config.bulk_approve_threshold
        );
        Ok(config)
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions::default().with_shared_key_prefix(self.shared_key_prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn keys_override_defaults() {
        let config = Config::parse(
            r#"
            data_dir = "/srv/fieldlink"
            bulk_approve_threshold = 0.75
            actor = "ops"
            catalog = "catalog.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/fieldlink"));
        assert_eq!(config.bulk_approve_threshold, 0.75);
        assert_eq!(config.actor, "ops");
        assert_eq!(config.shared_key_prefix, "shared_");
        assert_eq!(config.catalog, Some(PathBuf::from("catalog.json")));
    }

    #[test]
    fn defaults_render_as_toml() {
        let rendered = toml::to_string(&Config::default()).unwrap();
        insta::assert_snapshot!(rendered, @r#"
        data_dir = "data"
        bulk_approve_threshold = 0.9
        shared_key_prefix = "shared_"
        actor = "user"
        "#);
        assert_eq!(Config::parse(&rendered).unwrap(), Config::default());
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        assert!(Config::parse("bulk_approve_threshold = 1.5").is_err());
    }

    #[test]
    fn unknown_toml_is_an_error() {
        assert!(Config::parse("data_dir = [").is_err());
    }
}
