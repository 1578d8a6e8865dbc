//! Option maps for query operations
//!
//! Every read operation takes an [`OptionMap`]. Keys are checked against the
//! operation's whitelist before anything else happens, then converted into a
//! typed options struct. Values may be given typed or as text (as the CLI does).

use super::predicate::{Column, Field, Predicate};
use super::tagging::Owner;
use crate::error::{Result, TaggableError};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;

/// Keys accepted by `tagged_with`
pub const TAGGED_WITH_KEYS: &[&str] = &[
    "exclude",
    "any",
    "match_all",
    "owned_by",
    "wild",
    "order",
    "on",
];

/// Keys accepted by `tag_counts`
pub const TAG_COUNT_KEYS: &[&str] = &[
    "start_at",
    "end_at",
    "conditions",
    "order",
    "limit",
    "on",
    "at_least",
    "at_most",
    "id",
];

/// Keys accepted by `all_tags`; no frequency thresholds since nothing is grouped
pub const LIST_TAGS_KEYS: &[&str] = &[
    "start_at",
    "end_at",
    "conditions",
    "order",
    "limit",
    "on",
    "id",
];

fn identifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Whether `name` is safe to splice into SQL as a table or column name
pub fn is_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
    Owner(Owner),
    Conditions(Predicate),
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl From<DateTime<Utc>> for OptionValue {
    fn from(v: DateTime<Utc>) -> Self {
        OptionValue::Time(v)
    }
}

impl From<Owner> for OptionValue {
    fn from(v: Owner) -> Self {
        OptionValue::Owner(v)
    }
}

impl From<Predicate> for OptionValue {
    fn from(v: Predicate) -> Self {
        OptionValue::Conditions(v)
    }
}

/// Named options for one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: BTreeMap<String, OptionValue>,
}

impl OptionMap {
    pub fn new() -> Self {
        OptionMap::default()
    }

    /// Builder-style insert
    pub fn set(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `key=value` (or a bare `key`, meaning true) from the command line
    pub fn insert_pair(&mut self, pair: &str) -> Result<()> {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key.trim(), OptionValue::Text(value.trim().to_string())),
            None => (pair.trim(), OptionValue::Bool(true)),
        };
        if key.is_empty() {
            return Err(TaggableError::invalid_value(pair, "expected key=value"));
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    /// Reject any key outside `allowed`
    pub fn assert_valid_keys(&self, allowed: &[&str]) -> Result<()> {
        match self.entries.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(TaggableError::invalid_option(key, allowed)),
            None => Ok(()),
        }
    }

    fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            None => Ok(false),
            Some(OptionValue::Bool(v)) => Ok(*v),
            Some(OptionValue::Text(text)) => match text.to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(TaggableError::invalid_value(key, "expected true or false")),
            },
            Some(_) => Err(TaggableError::invalid_value(key, "expected true or false")),
        }
    }

    fn integer(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Int(v)) => Ok(Some(*v)),
            Some(OptionValue::Text(text)) => text
                .parse::<i64>()
                .map(Some)
                .map_err(|_| TaggableError::invalid_value(key, "expected an integer")),
            Some(_) => Err(TaggableError::invalid_value(key, "expected an integer")),
        }
    }

    fn text(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Text(text)) => Ok(Some(text.clone())),
            Some(_) => Err(TaggableError::invalid_value(key, "expected text")),
        }
    }

    fn time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Time(t)) => Ok(Some(*t)),
            Some(OptionValue::Text(text)) => parse_time(text)
                .map(Some)
                .ok_or_else(|| {
                    TaggableError::invalid_value(key, "expected RFC 3339 timestamp or YYYY-MM-DD")
                }),
            Some(_) => Err(TaggableError::invalid_value(key, "expected a timestamp")),
        }
    }

    fn owner(&self, key: &str) -> Result<Option<Owner>> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Owner(owner)) => Ok(Some(owner.clone())),
            Some(OptionValue::Text(text)) => Owner::from_str(text).map(Some),
            Some(_) => Err(TaggableError::invalid_value(key, "expected <Type>:<id>")),
        }
    }

    fn conditions(&self, key: &str) -> Result<Option<Predicate>> {
        match self.get(key) {
            None => Ok(None),
            Some(OptionValue::Conditions(p)) => Ok(Some(p.clone())),
            Some(OptionValue::Text(text)) => {
                Ok(Some(Predicate::contains(Column::tag(Field::Name), text)))
            }
            Some(_) => Err(TaggableError::invalid_value(key, "expected a predicate")),
        }
    }

    fn limit(&self, key: &str) -> Result<Option<usize>> {
        match self.integer(key)? {
            None => Ok(None),
            Some(n) if n >= 0 => Ok(Some(n as usize)),
            Some(_) => Err(TaggableError::invalid_value(key, "must not be negative")),
        }
    }
}

/// Timestamps in RFC 3339, or a bare date meaning midnight UTC
fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

fn split_order(key: &str, text: &str) -> Result<(String, Direction)> {
    let mut words = text.split_whitespace();
    let column = words
        .next()
        .ok_or_else(|| TaggableError::invalid_value(key, "empty order"))?
        .to_string();
    let direction = match words.next().map(|w| w.to_lowercase()) {
        None => Direction::Asc,
        Some(w) if w == "asc" => Direction::Asc,
        Some(w) if w == "desc" => Direction::Desc,
        Some(w) => {
            return Err(TaggableError::invalid_value(
                key,
                format!("unknown direction '{}'", w),
            ))
        }
    };
    if words.next().is_some() {
        return Err(TaggableError::invalid_value(key, "expected '<column> [asc|desc]'"));
    }
    Ok((column, direction))
}

/// Ordering of taggables by a column of the taggable collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggableOrder {
    pub column: String,
    pub direction: Direction,
}

impl TaggableOrder {
    pub fn parse(text: &str) -> Result<Self> {
        let (column, direction) = split_order("order", text)?;
        if !is_identifier(&column) {
            return Err(TaggableError::invalid_value(
                "order",
                format!("'{}' is not a column name", column),
            ));
        }
        Ok(TaggableOrder { column, direction })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSortKey {
    Id,
    Name,
    Count,
}

/// Ordering of tag results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagOrder {
    pub key: TagSortKey,
    pub direction: Direction,
}

impl TagOrder {
    pub fn parse(text: &str, allow_count: bool) -> Result<Self> {
        let (column, direction) = split_order("order", text)?;
        let key = match column.to_lowercase().as_str() {
            "id" => TagSortKey::Id,
            "name" => TagSortKey::Name,
            "count" if allow_count => TagSortKey::Count,
            _ => {
                return Err(TaggableError::invalid_value(
                    "order",
                    format!("can't order tags by '{}'", column),
                ))
            }
        };
        Ok(TagOrder { key, direction })
    }

    pub fn count_desc() -> Self {
        TagOrder {
            key: TagSortKey::Count,
            direction: Direction::Desc,
        }
    }
}

/// Options of `tagged_with`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedWithOptions {
    pub any: bool,
    pub exclude: bool,
    pub match_all: bool,
    pub wild: bool,
    pub owned_by: Option<Owner>,
    pub on: Option<String>,
    pub order: Option<TaggableOrder>,
}

impl TryFrom<&OptionMap> for TaggedWithOptions {
    type Error = TaggableError;

    fn try_from(map: &OptionMap) -> Result<Self> {
        map.assert_valid_keys(TAGGED_WITH_KEYS)?;
        Ok(TaggedWithOptions {
            any: map.flag("any")?,
            exclude: map.flag("exclude")?,
            match_all: map.flag("match_all")?,
            wild: map.flag("wild")?,
            owned_by: map.owner("owned_by")?,
            on: map.text("on")?,
            order: map.text("order")?.map(|o| TaggableOrder::parse(&o)).transpose()?,
        })
    }
}

/// Options of `tag_counts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCountOptions {
    pub on: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// Always at least 1
    pub at_least: i64,
    pub at_most: Option<i64>,
    pub id: Option<i64>,
    pub order: Option<TagOrder>,
    pub limit: Option<usize>,
    pub conditions: Option<Predicate>,
}

impl Default for TagCountOptions {
    fn default() -> Self {
        TagCountOptions {
            on: None,
            start_at: None,
            end_at: None,
            at_least: 1,
            at_most: None,
            id: None,
            order: None,
            limit: None,
            conditions: None,
        }
    }
}

impl TryFrom<&OptionMap> for TagCountOptions {
    type Error = TaggableError;

    fn try_from(map: &OptionMap) -> Result<Self> {
        map.assert_valid_keys(TAG_COUNT_KEYS)?;
        Ok(TagCountOptions {
            on: map.text("on")?,
            start_at: map.time("start_at")?,
            end_at: map.time("end_at")?,
            at_least: map.integer("at_least")?.unwrap_or(1).max(1),
            at_most: map.integer("at_most")?,
            id: map.integer("id")?,
            order: map
                .text("order")?
                .map(|o| TagOrder::parse(&o, true))
                .transpose()?,
            limit: map.limit("limit")?,
            conditions: map.conditions("conditions")?,
        })
    }
}

/// Options of `all_tags`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTagsOptions {
    pub on: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub id: Option<i64>,
    pub order: Option<TagOrder>,
    pub limit: Option<usize>,
    pub conditions: Option<Predicate>,
}

impl TryFrom<&OptionMap> for ListTagsOptions {
    type Error = TaggableError;

    fn try_from(map: &OptionMap) -> Result<Self> {
        map.assert_valid_keys(LIST_TAGS_KEYS)?;
        Ok(ListTagsOptions {
            on: map.text("on")?,
            start_at: map.time("start_at")?,
            end_at: map.time("end_at")?,
            id: map.integer("id")?,
            order: map
                .text("order")?
                .map(|o| TagOrder::parse(&o, false))
                .transpose()?,
            limit: map.limit("limit")?,
            conditions: map.conditions("conditions")?,
        })
    }
}
