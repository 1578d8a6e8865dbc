//! Context registry
//!
//! Contexts are declared up front with their settings. Any other context name a
//! taggable uses is a custom context and gets the registry's custom settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-context settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Persisted order (ascending tagging id) must match the assigned list
    #[serde(default)]
    pub preserve_order: bool,
}

impl ContextConfig {
    pub fn ordered() -> Self {
        ContextConfig {
            preserve_order: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextRegistry {
    declared: BTreeMap<String, ContextConfig>,
    custom: ContextConfig,
}

impl ContextRegistry {
    pub fn new() -> Self {
        ContextRegistry::default()
    }

    /// Declare a context, replacing any earlier declaration
    pub fn declare(mut self, name: impl Into<String>, config: ContextConfig) -> Self {
        self.declared.insert(name.into(), config);
        self
    }

    /// Settings applied to contexts that were never declared
    pub fn with_custom_defaults(mut self, config: ContextConfig) -> Self {
        self.custom = config;
        self
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    pub fn config_for(&self, name: &str) -> ContextConfig {
        self.declared.get(name).copied().unwrap_or(self.custom)
    }

    pub fn declared(&self) -> impl Iterator<Item = (&str, &ContextConfig)> {
        self.declared.iter().map(|(name, config)| (name.as_str(), config))
    }
}
