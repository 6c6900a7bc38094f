use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entity::DEFAULT_TITLE;
use crate::error::{DocketError, Result};

pub const CONFIG_FILE: &str = "config.yaml";

/// Configuration for a docket project, read from `.docket/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocketConfig {
    /// Database file name inside the project directory.
    pub database: String,
    /// Title for notes created without one.
    pub default_title: String,
    /// Title stored when the editor submits an empty one.
    pub untitled_placeholder: String,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for DocketConfig {
    fn default() -> Self {
        Self {
            database: "docket.db".to_string(),
            default_title: DEFAULT_TITLE.to_string(),
            untitled_placeholder: "unnamed".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl DocketConfig {
    /// Load the config from a project directory, falling back to defaults
    /// when no config file exists.
    pub fn load(docket_dir: &Path) -> Result<Self> {
        let path = docket_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(raw).map_err(|e| DocketError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(DocketError::Config("database must not be empty".to_string()));
        }
        if self.default_title.is_empty() {
            return Err(DocketError::Config("default_title must not be empty".to_string()));
        }
        if self.untitled_placeholder.is_empty() {
            return Err(DocketError::Config(
                "untitled_placeholder must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DocketConfig::default();
        assert_eq!(config.database, "docket.db");
        assert_eq!(config.default_title, "New Note");
        assert_eq!(config.untitled_placeholder, "unnamed");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = DocketConfig::load(tmp.path()).unwrap();
        assert_eq!(config, DocketConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = DocketConfig::from_yaml("default_title: Scratch\n").unwrap();
        assert_eq!(config.default_title, "Scratch");
        assert_eq!(config.database, "docket.db");
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(matches!(
            DocketConfig::from_yaml("colour: blue\n"),
            Err(DocketError::Config(_))
        ));
        assert!(matches!(
            DocketConfig::from_yaml("database: ''\n"),
            Err(DocketError::Config(_))
        ));
        assert!(matches!(
            DocketConfig::from_yaml("database: [unclosed\n"),
            Err(DocketError::Config(_))
        ));
    }
}
