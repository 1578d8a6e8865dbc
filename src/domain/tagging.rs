//! Tagging join records and the entities they link

use super::tag::TagId;
use crate::error::{Result, TaggableError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a host entity: `(taggable_type, taggable_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaggableRef {
    pub taggable_type: String,
    pub taggable_id: i64,
}

impl TaggableRef {
    pub fn new(taggable_type: impl Into<String>, taggable_id: i64) -> Self {
        TaggableRef {
            taggable_type: taggable_type.into(),
            taggable_id,
        }
    }
}

impl fmt::Display for TaggableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.taggable_type, self.taggable_id)
    }
}

/// The entity that applied a tagging (the "tagger")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub owner_type: String,
    pub owner_id: i64,
}

impl Owner {
    pub fn new(owner_type: impl Into<String>, owner_id: i64) -> Self {
        Owner {
            owner_type: owner_type.into(),
            owner_id,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_type, self.owner_id)
    }
}

/// Parses `Type:id`
impl FromStr for Owner {
    type Err = TaggableError;

    fn from_str(s: &str) -> Result<Self> {
        let (owner_type, owner_id) = s
            .rsplit_once(':')
            .ok_or_else(|| TaggableError::invalid_value("owned_by", "expected <Type>:<id>"))?;
        let owner_id = owner_id
            .trim()
            .parse::<i64>()
            .map_err(|_| TaggableError::invalid_value("owned_by", "owner id must be an integer"))?;
        if owner_type.trim().is_empty() {
            return Err(TaggableError::invalid_value(
                "owned_by",
                "owner type can't be blank",
            ));
        }
        Ok(Owner::new(owner_type.trim(), owner_id))
    }
}

/// A persisted association of one tag to one taggable in one context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tagging {
    pub id: i64,
    pub tag_id: TagId,
    pub taggable: TaggableRef,
    /// `None` for system tags applied without a tagger
    pub tagger: Option<Owner>,
    pub context: String,
    pub created_at: DateTime<Utc>,
}

/// A tagging that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTagging {
    pub tag_id: TagId,
    pub taggable: TaggableRef,
    pub tagger: Option<Owner>,
    pub context: String,
    pub created_at: DateTime<Utc>,
}

impl NewTagging {
    /// An untagged-by-anyone association created now
    pub fn system(tag_id: TagId, taggable: &TaggableRef, context: &str) -> Self {
        NewTagging {
            tag_id,
            taggable: taggable.clone(),
            tagger: None,
            context: context.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn owned_by(mut self, owner: Owner) -> Self {
        self.tagger = Some(owner);
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_owner() {
        let owner = Owner::from_str("User:42").unwrap();
        assert_eq!(owner, Owner::new("User", 42));
        assert_eq!(owner.to_string(), "User:42");
    }

    #[test]
    fn parse_owner_keeps_namespaced_type() {
        let owner = Owner::from_str("Admin::User:7").unwrap();
        assert_eq!(owner.owner_type, "Admin::User");
        assert_eq!(owner.owner_id, 7);
    }

    #[test]
    fn parse_owner_rejects_garbage() {
        assert!(Owner::from_str("User").is_err());
        assert!(Owner::from_str("User:abc").is_err());
        assert!(Owner::from_str(":3").is_err());
    }

    #[test]
    fn new_tagging_builders() {
        let taggable = TaggableRef::new("Article", 1);
        let when = Utc::now() - chrono::Duration::days(2);
        let tagging = NewTagging::system(3, &taggable, "skills")
            .owned_by(Owner::new("User", 9))
            .at(when);
        assert_eq!(tagging.tagger, Some(Owner::new("User", 9)));
        assert_eq!(tagging.created_at, when);
        assert_eq!(tagging.context, "skills");
    }
}
