//! Tag frequency statistics
//!
//! `count_tags` groups the matching taggings by tag and keeps the groups whose
//! size lies within `[at_least, at_most]`. `list_tags` answers the same
//! question without counts, through a plain membership subquery.

use crate::domain::options::{Direction, ListTagsOptions, TagCountOptions, TagOrder, TagSortKey};
use crate::domain::{Column, Field, OptionMap, Predicate, Tag, TagCount, TaggableScope, Value};
use crate::error::Result;
use crate::infrastructure::{CompiledSql, SqlBuilder};
use rusqlite::Connection;
use tracing::debug;

const COUNTED_ALIAS: &str = "counted";
const LISTED_ALIAS: &str = "listed";

/// Filters shared by both statistics
struct TaggingFilters<'o> {
    on: Option<&'o str>,
    start_at: Option<Value>,
    end_at: Option<Value>,
    id: Option<i64>,
}

pub struct Aggregator<'c> {
    conn: &'c Connection,
}

impl<'c> Aggregator<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Aggregator { conn }
    }

    /// Tags with their number of taggings among taggables of `scope`
    pub fn count_tags(&self, scope: &TaggableScope, options: &OptionMap) -> Result<Vec<TagCount>> {
        self.counts(scope, &TagCountOptions::try_from(options)?)
    }

    fn counts(&self, scope: &TaggableScope, options: &TagCountOptions) -> Result<Vec<TagCount>> {
        let compiled = count_sql(scope, options);
        debug!(sql = %compiled.sql, "Counting tags");

        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let counts = stmt
            .query_map(compiled.params(), |row| {
                Ok(TagCount {
                    tag: Tag::new(row.get(0)?, row.get::<_, String>(1)?),
                    count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }

    /// Distinct tags used among taggables of `scope`
    pub fn list_tags(&self, scope: &TaggableScope, options: &OptionMap) -> Result<Vec<Tag>> {
        let options = ListTagsOptions::try_from(options)?;
        let compiled = list_sql(scope, &options);
        debug!(sql = %compiled.sql, "Listing tags");

        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let tags = stmt
            .query_map(compiled.params(), |row| {
                Ok(Tag::new(row.get(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// The `limit` most used tags, optionally in one context
    pub fn top_tags(
        &self,
        scope: &TaggableScope,
        context: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TagCount>> {
        let options = TagCountOptions {
            on: context.map(String::from),
            order: Some(TagOrder::count_desc()),
            limit: Some(limit),
            ..TagCountOptions::default()
        };
        self.counts(scope, &options)
    }
}

fn tagging_filter(
    sql: &mut SqlBuilder<'_>,
    alias: &str,
    scope: &TaggableScope,
    filters: &TaggingFilters<'_>,
) -> String {
    let mut parts = vec![Column::tagging(alias, Field::TaggableType).equals(&scope.taggable_type)];
    if let Some(context) = filters.on {
        parts.push(Column::tagging(alias, Field::Context).equals(context));
    }
    parts.push(
        Column::tagging(alias, Field::CreatedAt)
            .between(filters.start_at.clone(), filters.end_at.clone()),
    );
    if let Some(id) = filters.id {
        parts.push(Column::tagging(alias, Field::TaggableId).equals(id));
    }

    let rendered = sql.predicate(&Predicate::and(parts));
    match sql.within_scope(&Column::tagging(alias, Field::TaggableId), scope) {
        Some(membership) => format!("{} AND {}", rendered, membership),
        None => rendered,
    }
}

fn order_clause(order: Option<TagOrder>) -> String {
    let order = order.unwrap_or(TagOrder {
        key: TagSortKey::Id,
        direction: Direction::Asc,
    });
    let column = match order.key {
        TagSortKey::Id => "tags.id",
        TagSortKey::Name => "tags.name",
        TagSortKey::Count => "counts.tags_count",
    };
    match order.key {
        TagSortKey::Id => format!("{} {}", column, order.direction.as_sql()),
        _ => format!("{} {}, tags.id ASC", column, order.direction.as_sql()),
    }
}

fn limit_clause(sql: &mut SqlBuilder<'_>, limit: Option<usize>) -> String {
    match limit {
        Some(limit) => format!(" LIMIT {}", sql.bind(&Value::Int(limit as i64))),
        None => String::new(),
    }
}

pub fn count_sql(scope: &TaggableScope, options: &TagCountOptions) -> CompiledSql {
    let filters = TaggingFilters {
        on: options.on.as_deref(),
        start_at: options.start_at.map(Value::from),
        end_at: options.end_at.map(Value::from),
        id: options.id,
    };

    let mut sql = SqlBuilder::for_scope(scope);
    let filter = tagging_filter(&mut sql, COUNTED_ALIAS, scope, &filters);
    let mut having = format!("COUNT(*) >= {}", sql.bind(&Value::Int(options.at_least)));
    if let Some(at_most) = options.at_most {
        having.push_str(&format!(" AND COUNT(*) <= {}", sql.bind(&Value::Int(at_most))));
    }
    let conditions = sql.predicate(options.conditions.as_ref().unwrap_or(&Predicate::True));
    let limit = limit_clause(&mut sql, options.limit);

    sql.finish(format!(
        "SELECT tags.id, tags.name, counts.tags_count \
         FROM tags \
         JOIN (SELECT {alias}.tag_id AS tag_id, COUNT(*) AS tags_count \
               FROM taggings AS {alias} \
               WHERE {filter} \
               GROUP BY {alias}.tag_id \
               HAVING {having}) AS counts ON counts.tag_id = tags.id \
         WHERE {conditions} \
         ORDER BY {order}{limit}",
        alias = COUNTED_ALIAS,
        filter = filter,
        having = having,
        conditions = conditions,
        order = order_clause(options.order),
        limit = limit,
    ))
}

pub fn list_sql(scope: &TaggableScope, options: &ListTagsOptions) -> CompiledSql {
    let filters = TaggingFilters {
        on: options.on.as_deref(),
        start_at: options.start_at.map(Value::from),
        end_at: options.end_at.map(Value::from),
        id: options.id,
    };

    let mut sql = SqlBuilder::for_scope(scope);
    let filter = tagging_filter(&mut sql, LISTED_ALIAS, scope, &filters);
    let conditions = sql.predicate(options.conditions.as_ref().unwrap_or(&Predicate::True));
    let limit = limit_clause(&mut sql, options.limit);

    sql.finish(format!(
        "SELECT tags.id, tags.name \
         FROM tags \
         WHERE tags.id IN (SELECT {alias}.tag_id FROM taggings AS {alias} WHERE {filter}) \
           AND {conditions} \
         ORDER BY {order}{limit}",
        alias = LISTED_ALIAS,
        filter = filter,
        conditions = conditions,
        order = order_clause(options.order),
        limit = limit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reconciler::reconcile;
    use crate::domain::{NewTagging, TagList, TaggableRef};
    use crate::error::TaggableError;
    use crate::infrastructure::{Database, StoreSettings};
    use chrono::{TimeZone, Utc};

    fn tagged(db: &mut Database, id: i64, context: &str, names: &[&str]) {
        reconcile(db, &TaggableRef::new("Article", id), context, &TagList::from(names)).unwrap();
    }

    /// ruby: 3, rails: 2, rust: 1
    fn fixture() -> Database {
        let mut db = Database::open_in_memory(StoreSettings::default()).unwrap();
        tagged(&mut db, 1, "tags", &["ruby", "rails"]);
        tagged(&mut db, 2, "tags", &["ruby", "rails"]);
        tagged(&mut db, 3, "tags", &["ruby", "rust"]);
        db
    }

    fn counts(db: &Database, options: OptionMap) -> Vec<(String, i64)> {
        Aggregator::new(db.conn())
            .count_tags(&TaggableScope::tagged("Article"), &options)
            .unwrap()
            .into_iter()
            .map(|c| (c.tag.name, c.count))
            .collect()
    }

    fn pairs(entries: &[(&str, i64)]) -> Vec<(String, i64)> {
        entries.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn counts_every_tag_by_default() {
        let db = fixture();
        assert_eq!(
            counts(&db, OptionMap::new()),
            pairs(&[("ruby", 3), ("rails", 2), ("rust", 1)])
        );
    }

    #[test]
    fn at_least_excludes_rare_tags() {
        let db = fixture();
        assert_eq!(
            counts(&db, OptionMap::new().set("at_least", 2i64)),
            pairs(&[("ruby", 3), ("rails", 2)])
        );
        assert_eq!(
            counts(&db, OptionMap::new().set("at_least", 0i64)),
            counts(&db, OptionMap::new().set("at_least", 1i64))
        );
    }

    #[test]
    fn at_most_caps_frequency() {
        let db = fixture();
        assert_eq!(
            counts(&db, OptionMap::new().set("at_most", 2i64)),
            pairs(&[("rails", 2), ("rust", 1)])
        );
    }

    #[test]
    fn order_and_limit_apply_last() {
        let db = fixture();
        let options = OptionMap::new().set("order", "name asc").set("limit", 2i64);
        assert_eq!(counts(&db, options), pairs(&[("rails", 2), ("ruby", 3)]));

        let top = Aggregator::new(db.conn())
            .top_tags(&TaggableScope::tagged("Article"), None, 1)
            .unwrap();
        assert_eq!(top[0].tag.name, "ruby");
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn id_restricts_to_one_taggable() {
        let db = fixture();
        assert_eq!(
            counts(&db, OptionMap::new().set("id", 3i64)),
            pairs(&[("ruby", 1), ("rust", 1)])
        );
    }

    #[test]
    fn context_and_conditions() {
        let mut db = fixture();
        tagged(&mut db, 4, "skills", &["rust"]);
        assert_eq!(
            counts(&db, OptionMap::new().set("on", "skills")),
            pairs(&[("rust", 1)])
        );
        assert_eq!(
            counts(&db, OptionMap::new().set("conditions", "ru")),
            pairs(&[("ruby", 3), ("rust", 2)])
        );
    }

    #[test]
    fn top_tags_orders_by_count_within_context() {
        let mut db = fixture();
        tagged(&mut db, 4, "skills", &["rust", "go"]);
        tagged(&mut db, 5, "skills", &["rust"]);
        let aggregator = Aggregator::new(db.conn());
        let scope = TaggableScope::tagged("Article");

        let top: Vec<(String, i64)> = aggregator
            .top_tags(&scope, Some("skills"), 5)
            .unwrap()
            .into_iter()
            .map(|c| (c.tag.name, c.count))
            .collect();
        assert_eq!(top, pairs(&[("rust", 2), ("go", 1)]));

        let overall = aggregator.top_tags(&scope, None, 2).unwrap();
        assert_eq!(overall[0].tag.name, "ruby");
        assert_eq!(overall[1].tag.name, "rust");
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let db = Database::open_in_memory(StoreSettings::default()).unwrap();
        let tags = db.tags().resolve(&["old", "edge", "new"]).unwrap();
        let days = [1, 10, 20];
        for (i, (tag, day)) in tags.iter().zip(days).enumerate() {
            let when = Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap();
            db.taggings()
                .insert(&NewTagging::system(tag.id, &TaggableRef::new("Article", i as i64), "tags").at(when))
                .unwrap();
        }

        let options = OptionMap::new()
            .set("start_at", "2025-01-10")
            .set("end_at", "2025-01-20");
        assert_eq!(counts(&db, options), pairs(&[("edge", 1), ("new", 1)]));

        let options = OptionMap::new().set("end_at", "2025-01-10");
        assert_eq!(counts(&db, options), pairs(&[("old", 1), ("edge", 1)]));
    }

    #[test]
    fn list_tags_skips_grouping() {
        let db = fixture();
        let scope = TaggableScope::tagged("Article");
        let options = ListTagsOptions::default();
        let compiled = list_sql(&scope, &options);
        assert!(!compiled.sql.contains("GROUP BY"));
        assert!(!compiled.sql.contains("COUNT"));

        let names: Vec<String> = Aggregator::new(db.conn())
            .list_tags(&scope, &OptionMap::new().set("order", "name"))
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["rails", "ruby", "rust"]);
    }

    #[test]
    fn list_tags_rejects_thresholds() {
        let db = fixture();
        let result = Aggregator::new(db.conn())
            .list_tags(&TaggableScope::tagged("Article"), &OptionMap::new().set("at_least", 2i64));
        assert!(matches!(result, Err(TaggableError::InvalidOption { .. })));
    }

    #[test]
    fn other_types_and_host_rows_scope_counts() {
        let mut db = fixture();
        reconcile(
            &mut db,
            &TaggableRef::new("User", 1),
            "tags",
            &TagList::from(&["rust"][..]),
        )
        .unwrap();
        db.conn()
            .execute_batch(
                "CREATE TABLE articles (id INTEGER PRIMARY KEY);
                 INSERT INTO articles (id) VALUES (1), (3);",
            )
            .unwrap();

        assert_eq!(counts(&db, OptionMap::new())[2], ("rust".to_string(), 1));

        let scope = TaggableScope::table("Article", "articles", "id").unwrap();
        let scoped: Vec<(String, i64)> = Aggregator::new(db.conn())
            .count_tags(&scope, &OptionMap::new())
            .unwrap()
            .into_iter()
            .map(|c| (c.tag.name, c.count))
            .collect();
        assert_eq!(scoped, pairs(&[("ruby", 2), ("rails", 1), ("rust", 1)]));
    }
}
