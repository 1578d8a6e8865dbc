//! Typed query nodes
//!
//! Filters over taggables, tags and taggings are composed as [`Predicate`] trees
//! and only turned into SQL at the storage boundary. Every tagging subquery
//! carries its own alias so several can be correlated with the same outer row.

use chrono::{DateTime, Utc};

/// Escape character used in LIKE patterns built by [`Predicate::contains`]
pub const LIKE_ESCAPE: char = '!';

/// Columns known to the query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Primary key of the aliased table
    Id,
    Name,
    NameKey,
    TagId,
    TaggableId,
    TaggableType,
    TaggerId,
    TaggerType,
    Context,
    CreatedAt,
}

/// The table a column belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Alias {
    /// The outer taggable collection
    Taggable,
    /// The tags table
    Tag,
    /// A taggings table under the given alias
    Tagging(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub alias: Alias,
    pub field: Field,
}

/// Literal operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
    Null,
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

/// `SELECT <alias>.<select> FROM taggings AS <alias> WHERE <filter>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subquery {
    pub alias: String,
    pub select: Field,
    pub filter: Predicate,
}

impl Subquery {
    pub fn taggings(alias: impl Into<String>, select: Field, filter: Predicate) -> Self {
        Subquery {
            alias: alias.into(),
            select,
            filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    True,
    False,
    Equals(Column, Value),
    ColumnEquals(Column, Column),
    In(Column, Vec<Value>),
    NotIn(Column, Vec<Value>),
    /// Inclusive on both ends; a missing bound is unbounded
    Range {
        column: Column,
        start: Option<Value>,
        end: Option<Value>,
    },
    /// Pattern already escaped with [`LIKE_ESCAPE`]
    Like(Column, String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Exists(Box<Subquery>),
    InSubquery {
        column: Column,
        subquery: Box<Subquery>,
        negated: bool,
    },
    /// `(SELECT COUNT(DISTINCT <alias>.<select>) ...) = count`
    CountEquals {
        subquery: Box<Subquery>,
        count: i64,
    },
}

impl Predicate {
    /// Conjunction, flattened; `True` parts vanish and any `False` wins
    pub fn and(parts: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Predicate::True => {}
                Predicate::False => return Predicate::False,
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Predicate::True,
            1 => flat.remove(0),
            _ => Predicate::And(flat),
        }
    }

    /// Disjunction, flattened; `False` parts vanish and any `True` wins
    pub fn or(parts: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Predicate::False => {}
                Predicate::True => return Predicate::True,
                Predicate::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Predicate::False,
            1 => flat.remove(0),
            _ => Predicate::Or(flat),
        }
    }

    /// Case-insensitive substring match on `column`
    pub fn contains(column: Column, fragment: &str) -> Predicate {
        Predicate::Like(column, format!("%{}%", escape_like(fragment)))
    }

    pub fn exists(subquery: Subquery) -> Predicate {
        Predicate::Exists(Box::new(subquery))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Predicate::False)
    }
}

impl Column {
    pub fn new(alias: Alias, field: Field) -> Self {
        Column { alias, field }
    }

    pub fn taggable(field: Field) -> Self {
        Column::new(Alias::Taggable, field)
    }

    pub fn tag(field: Field) -> Self {
        Column::new(Alias::Tag, field)
    }

    pub fn tagging(alias: &str, field: Field) -> Self {
        Column::new(Alias::Tagging(alias.to_string()), field)
    }

    pub fn equals(self, value: impl Into<Value>) -> Predicate {
        Predicate::Equals(self, value.into())
    }

    pub fn eq_column(self, other: Column) -> Predicate {
        Predicate::ColumnEquals(self, other)
    }

    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::In(self, values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::NotIn(self, values.into_iter().map(Into::into).collect())
    }

    pub fn between(self, start: Option<Value>, end: Option<Value>) -> Predicate {
        if start.is_none() && end.is_none() {
            return Predicate::True;
        }
        Predicate::Range {
            column: self,
            start,
            end,
        }
    }
}

/// Escape LIKE wildcards so `fragment` matches literally
pub fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
