//! Error types for taggable

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tagging library and CLI
#[derive(Debug, Error)]
pub enum TaggableError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown option '{key}'. Valid options are: {}", allowed.join(", "))]
    InvalidOption { key: String, allowed: Vec<String> },

    #[error("Invalid value for option '{key}': {reason}")]
    InvalidOptionValue { key: String, reason: String },

    #[error("Concurrent modification: {0}")]
    Concurrency(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a taggable workspace: {0}")]
    NotWorkspace(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<rusqlite::Error> for TaggableError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                TaggableError::Concurrency(err.to_string())
            }
            _ => TaggableError::Storage(err),
        }
    }
}

impl TaggableError {
    /// Build an `InvalidOption` error from a key and its whitelist
    pub fn invalid_option(key: &str, allowed: &[&str]) -> Self {
        TaggableError::InvalidOption {
            key: key.to_string(),
            allowed: allowed.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Build an `InvalidOptionValue` error
    pub fn invalid_value(key: &str, reason: impl Into<String>) -> Self {
        TaggableError::InvalidOptionValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TaggableError::NotWorkspace(_) => 2,
            TaggableError::Validation(_) => 3,
            TaggableError::InvalidOption { .. } | TaggableError::InvalidOptionValue { .. } => 4,
            TaggableError::Concurrency(_) => 5,
            _ => 1,
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn display_with_suggestions(&self) -> String {
        match self {
            TaggableError::NotWorkspace(path) => {
                format!(
                    "Not a taggable workspace: {}\n\n\
                    Suggestions:\n\
                    • Run 'taggable init' in this directory to create a workspace\n\
                    • Navigate to an existing workspace\n\
                    • Set TAGGABLE_ROOT environment variable to your workspace path",
                    path.display()
                )
            }
            TaggableError::Validation(msg) => {
                format!(
                    "Validation failed: {}\n\n\
                    Tag names must be non-blank and at most 255 characters.",
                    msg
                )
            }
            TaggableError::InvalidOption { key, allowed } => {
                format!(
                    "Unknown option '{}'\n\n\
                    Valid options for this command: {}\n\
                    Example: -o on=skills",
                    key,
                    allowed.join(", ")
                )
            }
            TaggableError::Concurrency(msg) => {
                format!(
                    "Concurrent modification: {}\n\n\
                    Another writer touched the same tag list. Retry the command.",
                    msg
                )
            }
            TaggableError::Config(msg) => {
                if msg.contains("Invalid name policy") {
                    format!(
                        "{}\n\n\
                        Valid policies: strict, normalized\n\
                        Example: taggable init --policy strict",
                        msg
                    )
                } else {
                    msg.clone()
                }
            }
            _ => self.to_string(),
        }
    }
}

/// Result type using TaggableError
pub type Result<T> = std::result::Result<T, TaggableError>;
