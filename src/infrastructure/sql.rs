//! Compilation of predicate trees to SQLite SQL
//!
//! Statements are assembled left to right, and every literal becomes a `?`
//! parameter pushed in the same order it appears in the text.

use crate::domain::predicate::{Alias, Column, Field, Predicate, Subquery, Value, LIKE_ESCAPE};
use crate::domain::scope::{Source, TaggableScope};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;

/// A statement and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl CompiledSql {
    pub fn params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, SqlValue>> {
        rusqlite::params_from_iter(self.params.iter())
    }
}

/// Accumulates parameters while rendering SQL fragments
#[derive(Debug, Default)]
pub struct SqlBuilder<'s> {
    scope: Option<&'s TaggableScope>,
    params: Vec<SqlValue>,
}

impl<'s> SqlBuilder<'s> {
    pub fn new() -> Self {
        SqlBuilder::default()
    }

    /// A builder that can render the taggable collection of `scope`
    pub fn for_scope(scope: &'s TaggableScope) -> Self {
        SqlBuilder {
            scope: Some(scope),
            params: Vec::new(),
        }
    }

    pub fn finish(self, sql: String) -> CompiledSql {
        CompiledSql {
            sql,
            params: self.params,
        }
    }

    /// Bind a literal and return its placeholder
    pub fn bind(&mut self, value: &Value) -> &'static str {
        self.params.push(to_sql_value(value));
        "?"
    }

    /// `FROM` item for the taggable collection, aliased `taggable`
    pub fn taggable_source(&mut self, scope: &TaggableScope) -> String {
        match &scope.source {
            Source::Table { table, .. } => format!("{} AS taggable", table),
            Source::Tagged => {
                let placeholder = self.bind(&Value::Text(scope.taggable_type.clone()));
                format!(
                    "(SELECT DISTINCT taggable_id AS id FROM taggings WHERE taggable_type = {}) AS taggable",
                    placeholder
                )
            }
        }
    }

    /// `column IN (<ids of the host table>)`; `None` for a tagged-only scope,
    /// whose ids are exactly those with a tagging of the type
    pub fn within_scope(&self, column: &Column, scope: &TaggableScope) -> Option<String> {
        match &scope.source {
            Source::Table { table, primary_key } => Some(format!(
                "{} IN (SELECT {}.{} FROM {})",
                self.column(column),
                table,
                primary_key,
                table
            )),
            Source::Tagged => None,
        }
    }

    pub fn column(&self, column: &Column) -> String {
        let table = match &column.alias {
            Alias::Taggable => "taggable",
            Alias::Tag => "tags",
            Alias::Tagging(alias) => alias.as_str(),
        };
        let name = match (&column.alias, column.field) {
            (Alias::Taggable, Field::Id) => self.scope.map(|s| s.primary_key()).unwrap_or("id"),
            (_, field) => field_name(field),
        };
        format!("{}.{}", table, name)
    }

    pub fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::True => "1 = 1".to_string(),
            Predicate::False => "1 = 0".to_string(),
            Predicate::Equals(column, Value::Null) => {
                format!("{} IS NULL", self.column(column))
            }
            Predicate::Equals(column, value) => {
                let column = self.column(column);
                format!("{} = {}", column, self.bind(value))
            }
            Predicate::ColumnEquals(left, right) => {
                format!("{} = {}", self.column(left), self.column(right))
            }
            Predicate::In(_, values) if values.is_empty() => "1 = 0".to_string(),
            Predicate::NotIn(_, values) if values.is_empty() => "1 = 1".to_string(),
            Predicate::In(column, values) => {
                let column = self.column(column);
                format!("{} IN ({})", column, self.bind_list(values))
            }
            Predicate::NotIn(column, values) => {
                let column = self.column(column);
                format!("{} NOT IN ({})", column, self.bind_list(values))
            }
            Predicate::Range { column, start, end } => {
                let column = self.column(column);
                let mut bounds = Vec::new();
                if let Some(start) = start {
                    bounds.push(format!("{} >= {}", column, self.bind(start)));
                }
                if let Some(end) = end {
                    bounds.push(format!("{} <= {}", column, self.bind(end)));
                }
                if bounds.is_empty() {
                    "1 = 1".to_string()
                } else {
                    format!("({})", bounds.join(" AND "))
                }
            }
            Predicate::Like(column, pattern) => {
                let column = self.column(column);
                let placeholder = self.bind(&Value::Text(pattern.clone()));
                format!("{} LIKE {} ESCAPE '{}'", column, placeholder, LIKE_ESCAPE)
            }
            Predicate::And(parts) => self.join(parts, " AND "),
            Predicate::Or(parts) => self.join(parts, " OR "),
            Predicate::Exists(subquery) => {
                format!(
                    "EXISTS (SELECT 1 FROM taggings AS {} WHERE {})",
                    subquery.alias,
                    self.predicate(&subquery.filter)
                )
            }
            Predicate::InSubquery {
                column,
                subquery,
                negated,
            } => {
                let column = self.column(column);
                let operator = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", column, operator, self.subquery(subquery))
            }
            Predicate::CountEquals { subquery, count } => {
                let counted = self.column(&Column::tagging(&subquery.alias, subquery.select));
                let filter = self.predicate(&subquery.filter);
                format!(
                    "(SELECT COUNT(DISTINCT {}) FROM taggings AS {} WHERE {}) = {}",
                    counted,
                    subquery.alias,
                    filter,
                    self.bind(&Value::Int(*count))
                )
            }
        }
    }

    fn subquery(&mut self, subquery: &Subquery) -> String {
        let select = self.column(&Column::tagging(&subquery.alias, subquery.select));
        format!(
            "SELECT {} FROM taggings AS {} WHERE {}",
            select,
            subquery.alias,
            self.predicate(&subquery.filter)
        )
    }

    fn join(&mut self, parts: &[Predicate], glue: &str) -> String {
        let rendered: Vec<String> = parts.iter().map(|p| self.predicate(p)).collect();
        format!("({})", rendered.join(glue))
    }

    fn bind_list(&mut self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.bind(v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn field_name(field: Field) -> &'static str {
    match field {
        Field::Id => "id",
        Field::Name => "name",
        Field::NameKey => "name_key",
        Field::TagId => "tag_id",
        Field::TaggableId => "taggable_id",
        Field::TaggableType => "taggable_type",
        Field::TaggerId => "tagger_id",
        Field::TaggerType => "tagger_type",
        Field::Context => "context",
        Field::CreatedAt => "created_at",
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Time(t) => SqlValue::Integer(to_millis(*t)),
        Value::Null => SqlValue::Null,
    }
}

/// Stored representation of tagging timestamps
pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub fn from_millis(column: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_list_with_params_in_order() {
        let mut sql = SqlBuilder::new();
        let p = Predicate::and([
            Column::tagging("t", Field::Context).equals("skills"),
            Column::tagging("t", Field::TagId).is_in([3i64, 5]),
        ]);
        assert_eq!(
            sql.predicate(&p),
            "(t.context = ? AND t.tag_id IN (?, ?))"
        );
        let compiled = sql.finish(String::new());
        assert_eq!(
            compiled.params,
            vec![
                SqlValue::Text("skills".to_string()),
                SqlValue::Integer(3),
                SqlValue::Integer(5)
            ]
        );
    }

    #[test]
    fn empty_sets_are_constant() {
        let mut sql = SqlBuilder::new();
        let none: Vec<i64> = Vec::new();
        assert_eq!(
            sql.predicate(&Column::tag(Field::Id).is_in(none.clone())),
            "1 = 0"
        );
        assert_eq!(sql.predicate(&Column::tag(Field::Id).not_in(none)), "1 = 1");
    }

    #[test]
    fn null_equality_uses_is_null() {
        let mut sql = SqlBuilder::new();
        assert_eq!(
            sql.predicate(&Column::tagging("t", Field::TaggerId).equals(Value::Null)),
            "t.tagger_id IS NULL"
        );
    }

    #[test]
    fn range_is_inclusive() {
        let mut sql = SqlBuilder::new();
        let now = Utc::now();
        let p = Column::tagging("t", Field::CreatedAt).between(Some(now.into()), Some(now.into()));
        assert_eq!(
            sql.predicate(&p),
            "(t.created_at >= ? AND t.created_at <= ?)"
        );
        let compiled = sql.finish(String::new());
        assert_eq!(compiled.params[0], SqlValue::Integer(now.timestamp_millis()));
    }

    #[test]
    fn subqueries_are_correlated_by_alias() {
        let scope = TaggableScope::table("Article", "articles", "article_id").unwrap();
        let mut sql = SqlBuilder::for_scope(&scope);
        let p = Predicate::InSubquery {
            column: Column::taggable(Field::Id),
            subquery: Box::new(Subquery::taggings(
                "excluded",
                Field::TaggableId,
                Column::tagging("excluded", Field::TagId).is_in([1i64]),
            )),
            negated: true,
        };
        assert_eq!(
            sql.predicate(&p),
            "taggable.article_id NOT IN (SELECT excluded.taggable_id FROM taggings AS excluded WHERE excluded.tag_id IN (?))"
        );
    }

    #[test]
    fn tagged_source_binds_type() {
        let scope = TaggableScope::tagged("Article");
        let mut sql = SqlBuilder::for_scope(&scope);
        let from = sql.taggable_source(&scope);
        assert!(from.contains("WHERE taggable_type = ?"));
        assert_eq!(
            sql.finish(from).params,
            vec![SqlValue::Text("Article".to_string())]
        );
    }

    #[test]
    fn count_equals_counts_distinct_values() {
        let mut sql = SqlBuilder::new();
        let p = Predicate::CountEquals {
            subquery: Box::new(Subquery::taggings(
                "group_count",
                Field::TagId,
                Column::tagging("group_count", Field::Context).equals("skills"),
            )),
            count: 2,
        };
        assert_eq!(
            sql.predicate(&p),
            "(SELECT COUNT(DISTINCT group_count.tag_id) FROM taggings AS group_count WHERE group_count.context = ?) = ?"
        );
        assert_eq!(
            sql.finish(String::new()).params,
            vec![SqlValue::Text("skills".to_string()), SqlValue::Integer(2)]
        );
    }

    #[test]
    fn host_table_membership() {
        let scope = TaggableScope::table("Article", "articles", "article_id").unwrap();
        let sql = SqlBuilder::new();
        assert_eq!(
            sql.within_scope(&Column::tagging("counted", Field::TaggableId), &scope),
            Some("counted.taggable_id IN (SELECT articles.article_id FROM articles)".to_string())
        );
        assert_eq!(
            sql.within_scope(&Column::tagging("counted", Field::TaggableId), &TaggableScope::tagged("Article")),
            None
        );
    }

    #[test]
    fn like_declares_escape() {
        let mut sql = SqlBuilder::new();
        let p = Predicate::contains(Column::tag(Field::Name), "50%");
        assert_eq!(sql.predicate(&p), "tags.name LIKE ? ESCAPE '!'");
        assert_eq!(
            sql.finish(String::new()).params,
            vec![SqlValue::Text("%50!%%".to_string())]
        );
    }

    #[test]
    fn millis_round_trip_rejects_out_of_range() {
        assert!(from_millis(0, i64::MAX).is_err());
        let t = from_millis(0, 1_700_000_000_000).unwrap();
        assert_eq!(to_millis(t), 1_700_000_000_000);
    }
}
