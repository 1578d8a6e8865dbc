//! The taggable collection a query ranges over

use super::options::is_identifier;
use crate::error::{Result, TaggableError};

/// Where the rows of a taggable type come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A host table owning the entities
    Table { table: String, primary_key: String },
    /// Every id of the type that appears in at least one tagging
    Tagged,
}

/// A taggable type and its row source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggableScope {
    pub taggable_type: String,
    pub source: Source,
}

impl TaggableScope {
    pub fn tagged(taggable_type: impl Into<String>) -> Self {
        TaggableScope {
            taggable_type: taggable_type.into(),
            source: Source::Tagged,
        }
    }

    /// Scope backed by a host table; both names must be plain identifiers
    pub fn table(
        taggable_type: impl Into<String>,
        table: &str,
        primary_key: &str,
    ) -> Result<Self> {
        for name in [table, primary_key] {
            if !is_identifier(name) {
                return Err(TaggableError::Config(format!(
                    "'{}' is not a valid table or column name",
                    name
                )));
            }
        }
        Ok(TaggableScope {
            taggable_type: taggable_type.into(),
            source: Source::Table {
                table: table.to_string(),
                primary_key: primary_key.to_string(),
            },
        })
    }

    pub fn primary_key(&self) -> &str {
        match &self.source {
            Source::Table { primary_key, .. } => primary_key,
            Source::Tagged => "id",
        }
    }
}
