//! Configuration management

use crate::domain::{ContextConfig, ContextRegistry, NamePolicy};
use crate::error::{Result, TaggableError};
use crate::infrastructure::database::StoreSettings;
use crate::infrastructure::tag_store::{AllowDuplicateNames, UniqueNames};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Name of the workspace directory
pub const WORKSPACE_DIR: &str = ".taggable";

const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "tags.db";

fn default_unique_names() -> bool {
    true
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub name_policy: NamePolicy,
    #[serde(default = "default_unique_names")]
    pub unique_names: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    pub created: DateTime<Utc>,
    /// Settings for contexts not listed in `contexts`
    #[serde(default)]
    pub custom_contexts: ContextConfig,
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextConfig>,
}

impl Config {
    /// Create a new config with default values
    pub fn new(name_policy: NamePolicy) -> Self {
        Config {
            name_policy,
            unique_names: default_unique_names(),
            delimiter: default_delimiter(),
            busy_timeout_ms: default_busy_timeout_ms(),
            created: Utc::now(),
            custom_contexts: ContextConfig::default(),
            contexts: BTreeMap::new(),
        }
    }

    /// Load config from .taggable/config.toml in the given directory
    pub fn load_from_dir(path: &Path) -> Result<Self> {
        let config_path = path.join(WORKSPACE_DIR).join(CONFIG_FILE);

        let contents = fs::read_to_string(&config_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TaggableError::NotWorkspace(path.to_path_buf())
            } else {
                TaggableError::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| TaggableError::Config(format!("Failed to parse config.toml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to .taggable/config.toml in the given directory
    pub fn save_to_dir(&self, path: &Path) -> Result<()> {
        let dir = path.join(WORKSPACE_DIR);

        if !dir.exists() {
            fs::create_dir(&dir)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| TaggableError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(dir.join(CONFIG_FILE), contents)?;

        Ok(())
    }

    /// Location of the SQLite file for a workspace rooted at `root`
    pub fn database_path(root: &Path) -> PathBuf {
        root.join(WORKSPACE_DIR).join(DATABASE_FILE)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delimiter.trim().is_empty() {
            return Err(TaggableError::Config(
                "delimiter can't be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Declared contexts plus the custom-context defaults
    pub fn registry(&self) -> ContextRegistry {
        self.contexts
            .iter()
            .fold(
                ContextRegistry::new().with_custom_defaults(self.custom_contexts),
                |registry, (name, config)| registry.declare(name.clone(), *config),
            )
    }

    pub fn store_settings(&self) -> StoreSettings {
        let settings = StoreSettings {
            policy: self.name_policy,
            contexts: self.registry(),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..StoreSettings::default()
        };
        if self.unique_names {
            settings.with_uniqueness(Arc::new(UniqueNames))
        } else {
            settings.with_uniqueness(Arc::new(AllowDuplicateNames))
        }
    }
}
