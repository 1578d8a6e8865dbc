//! Tag entity and name comparison policy

use crate::error::{Result, TaggableError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum tag name length, in characters
pub const MAX_NAME_LENGTH: usize = 255;

/// Row identifier of a tag
pub type TagId = i64;

/// A named label. Identity is the id; domain equality is the folded name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Tag {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A tag together with its frequency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: Tag,
    pub count: i64,
}

/// How tag names are compared for uniqueness and lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NamePolicy {
    /// Byte-exact comparison
    Strict,
    /// Case-folded and width-folded comparison
    #[default]
    Normalized,
}

impl NamePolicy {
    /// The key two names must share to be considered the same tag
    pub fn comparable(&self, name: &str) -> String {
        match self {
            NamePolicy::Strict => name.to_string(),
            NamePolicy::Normalized => name.chars().map(fold_width).collect::<String>().to_lowercase(),
        }
    }

    /// Whether two names denote the same tag under this policy
    pub fn same(&self, a: &str, b: &str) -> bool {
        self.comparable(a) == self.comparable(b)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NamePolicy::Strict => "strict",
            NamePolicy::Normalized => "normalized",
        }
    }
}

impl FromStr for NamePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(NamePolicy::Strict),
            "normalized" => Ok(NamePolicy::Normalized),
            _ => Err(format!(
                "Invalid name policy: {}. Valid policies: strict, normalized",
                s
            )),
        }
    }
}

impl fmt::Display for NamePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map full-width ASCII variants and the ideographic space to their narrow forms
fn fold_width(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{3000}' => ' ',
        _ => c,
    }
}

/// Check that a name can be stored as a tag
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(TaggableError::Validation(
            "tag name can't be blank".to_string(),
        ));
    }

    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(TaggableError::Validation(format!(
            "tag name is too long ({} characters, maximum is {})",
            length, MAX_NAME_LENGTH
        )));
    }

    Ok(())
}
