//! Config management use case

use crate::domain::options::is_identifier;
use crate::domain::ContextConfig;
use crate::error::{Result, TaggableError};
use crate::infrastructure::{Config, FileSystemRepository, WorkspaceRepository};

const KEYS: &str = "name_policy, unique_names, delimiter, busy_timeout_ms, created, \
                    custom_contexts, contexts.<name>";

/// Service for managing workspace configuration
pub struct ConfigService {
    repository: FileSystemRepository,
}

impl ConfigService {
    /// Create a new config service
    pub fn new(repository: FileSystemRepository) -> Self {
        ConfigService { repository }
    }

    /// Get a single config value
    pub fn get(&self, key: &str) -> Result<String> {
        let config = self.repository.load_config()?;

        match key {
            "name_policy" => Ok(config.name_policy.to_string()),
            "unique_names" => Ok(config.unique_names.to_string()),
            "delimiter" => Ok(config.delimiter.clone()),
            "busy_timeout_ms" => Ok(config.busy_timeout_ms.to_string()),
            "created" => Ok(config.created.to_rfc3339()),
            "custom_contexts" => Ok(ordering_name(config.custom_contexts).to_string()),
            _ => match key.strip_prefix("contexts.") {
                Some(name) => config
                    .contexts
                    .get(name)
                    .map(|c| ordering_name(*c).to_string())
                    .ok_or_else(|| TaggableError::NotFound(format!("context '{}'", name))),
                None => Err(unknown_key(key)),
            },
        }
    }

    /// Set a config value
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut config = self.repository.load_config()?;

        match key {
            "unique_names" => {
                config.unique_names = parse_bool(key, value)?;
            }
            "delimiter" => {
                config.delimiter = value.to_string();
            }
            "busy_timeout_ms" => {
                config.busy_timeout_ms = value.parse().map_err(|_| {
                    TaggableError::Config(format!(
                        "busy_timeout_ms must be a whole number of milliseconds, got '{}'",
                        value
                    ))
                })?;
            }
            "custom_contexts" => {
                config.custom_contexts = parse_ordering(value)?;
            }
            "name_policy" | "created" => {
                return Err(TaggableError::Config(format!(
                    "Cannot modify '{}' field (read-only)",
                    key
                )));
            }
            _ => match key.strip_prefix("contexts.") {
                Some(name) if is_identifier(name) => {
                    let ordering = parse_ordering(value)?;
                    config.contexts.insert(name.to_string(), ordering);
                }
                Some(name) => {
                    return Err(TaggableError::Config(format!(
                        "Invalid context name: '{}'",
                        name
                    )));
                }
                None => return Err(unknown_key(key)),
            },
        }

        config.validate()?;
        self.repository.save_config(&config)?;
        Ok(())
    }

    /// List all config values
    pub fn list(&self) -> Result<Config> {
        self.repository.load_config()
    }
}

pub fn ordering_name(config: ContextConfig) -> &'static str {
    if config.preserve_order {
        "ordered"
    } else {
        "unordered"
    }
}

fn parse_ordering(value: &str) -> Result<ContextConfig> {
    match value {
        "ordered" => Ok(ContextConfig::ordered()),
        "unordered" => Ok(ContextConfig::default()),
        _ => Err(TaggableError::Config(format!(
            "Invalid context ordering: '{}'. Use 'ordered' or 'unordered'",
            value
        ))),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value.parse().map_err(|_| {
        TaggableError::Config(format!("{} must be 'true' or 'false', got '{}'", key, value))
    })
}

fn unknown_key(key: &str) -> TaggableError {
    TaggableError::Config(format!(
        "Unknown config key: '{}'. Valid keys are: {}",
        key, KEYS
    ))
}
