//! Finding taggables by their tags
//!
//! [`QueryEngine::filter`] turns tag names and `tagged_with` options into a
//! [`Predicate`] over the taggable collection. Each required tag becomes an
//! `EXISTS` over its own aliased taggings subquery, so a taggable row is never
//! repeated and nothing is loaded into memory.

use crate::domain::options::{Direction, TaggableOrder, TaggedWithOptions};
use crate::domain::{
    Column, Field, OptionMap, Owner, Predicate, Source, Subquery, Tag, TagId, TagList,
    TaggableScope,
};
use crate::error::{Result, TaggableError};
use crate::infrastructure::{CompiledSql, SqlBuilder, StoreSettings, TagStore};
use rusqlite::Connection;
use tracing::debug;

const EXCLUDED_ALIAS: &str = "excluded";
const GROUP_COUNT_ALIAS: &str = "group_count";
const GROUP_MATCH_ALIAS: &str = "group_match";

/// A compiled-but-not-executed `tagged_with` query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggableFilter {
    pub predicate: Predicate,
    /// Known to match nothing; executing it never touches the store
    pub empty: bool,
    pub order: Option<TaggableOrder>,
}

impl TaggableFilter {
    fn nothing() -> Self {
        TaggableFilter {
            predicate: Predicate::False,
            empty: true,
            order: None,
        }
    }
}

pub struct QueryEngine<'c> {
    conn: &'c Connection,
    settings: &'c StoreSettings,
}

impl<'c> QueryEngine<'c> {
    pub fn new(conn: &'c Connection, settings: &'c StoreSettings) -> Self {
        QueryEngine { conn, settings }
    }

    /// Build the filter for taggables of `scope` tagged with `names`
    pub fn filter<S: AsRef<str>>(
        &self,
        scope: &TaggableScope,
        names: &[S],
        options: &OptionMap,
    ) -> Result<TaggableFilter> {
        let options = TaggedWithOptions::try_from(options)?;
        if let (Some(order), Source::Tagged) = (&options.order, &scope.source) {
            if order.column != scope.primary_key() {
                return Err(TaggableError::invalid_value(
                    "order",
                    format!("'{}' is not a column of {}", order.column, scope.taggable_type),
                ));
            }
        }

        let list: TagList = names.iter().map(|name| name.as_ref()).collect();
        let names = list.deduped(self.settings.policy);
        if names.is_empty() {
            return Ok(TaggableFilter::nothing());
        }

        let store = TagStore::new(self.conn, self.settings);
        let tags = if options.wild {
            store.matching_like_any(&names)?
        } else {
            store.find_any(&names)?
        };

        let groups = match self.groups(&names, &tags, &options) {
            Some(groups) => groups,
            None => {
                debug!(requested = names.len(), found = tags.len(), "Unresolvable tag names");
                return Ok(TaggableFilter::nothing());
            }
        };

        let tag_ids: Vec<TagId> = tags.iter().map(|t| t.id).collect();
        let mut parts: Vec<Predicate> = groups
            .iter()
            .enumerate()
            .map(|(i, ids)| {
                let alias = format!("taggings_{}", i);
                let for_tag = if options.exclude {
                    Column::tagging(&alias, Field::TagId).not_in(ids.iter().copied())
                } else {
                    Column::tagging(&alias, Field::TagId).is_in(ids.iter().copied())
                };
                let filter = Predicate::and([self.join_scope(&alias, scope, &options), for_tag]);
                Predicate::exists(Subquery::taggings(alias, Field::Id, filter))
            })
            .collect();

        if options.exclude {
            parts.push(without_taggings(scope, &tag_ids));
        }
        if options.match_all {
            parts.extend(self.having_all_tags(scope, &tag_ids, &options));
        }

        let predicate = Predicate::and(parts);
        Ok(TaggableFilter {
            empty: predicate.is_false(),
            predicate,
            order: options.order,
        })
    }

    /// Ids of taggables of `scope` tagged with `names`
    pub fn tagged_with<S: AsRef<str>>(
        &self,
        scope: &TaggableScope,
        names: &[S],
        options: &OptionMap,
    ) -> Result<Vec<i64>> {
        let filter = self.filter(scope, names, options)?;
        self.execute(scope, &filter)
    }

    pub fn execute(&self, scope: &TaggableScope, filter: &TaggableFilter) -> Result<Vec<i64>> {
        if filter.empty {
            return Ok(Vec::new());
        }

        let compiled = to_sql(scope, filter);
        debug!(sql = %compiled.sql, params = compiled.params.len(), "Running tagged_with");

        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let ids = stmt
            .query_map(compiled.params(), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// The tag ids each existential join must hit, or `None` when some name
    /// can't be satisfied
    fn groups(
        &self,
        names: &[String],
        tags: &[Tag],
        options: &TaggedWithOptions,
    ) -> Option<Vec<Vec<TagId>>> {
        if tags.is_empty() {
            return None;
        }
        let all_ids: Vec<TagId> = tags.iter().map(|t| t.id).collect();
        if options.any {
            return Some(vec![all_ids]);
        }
        if options.wild {
            return Some(if options.exclude {
                vec![all_ids]
            } else {
                all_ids.into_iter().map(|id| vec![id]).collect()
            });
        }

        let policy = self.settings.policy;
        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            let ids: Vec<TagId> = tags
                .iter()
                .filter(|tag| policy.same(&tag.name, name))
                .map(|tag| tag.id)
                .collect();
            if ids.is_empty() {
                return None;
            }
            groups.push(ids);
        }

        // Excluded taggables are removed by one join over every resolved id
        if options.exclude {
            return Some(vec![all_ids]);
        }
        Some(groups)
    }

    /// Correlation with the outer taggable plus the `on` and `owned_by` scoping
    fn join_scope(&self, alias: &str, scope: &TaggableScope, options: &TaggedWithOptions) -> Predicate {
        let mut parts = vec![
            Column::tagging(alias, Field::TaggableId).eq_column(Column::taggable(Field::Id)),
            Column::tagging(alias, Field::TaggableType).equals(&scope.taggable_type),
        ];
        if let Some(context) = &options.on {
            parts.push(Column::tagging(alias, Field::Context).equals(context));
        }
        if let Some(owner) = &options.owned_by {
            parts.push(owned_by(alias, owner));
        }
        Predicate::and(parts)
    }

    /// The taggable's distinct tags within the join scope are exactly `tag_ids`
    fn having_all_tags(
        &self,
        scope: &TaggableScope,
        tag_ids: &[TagId],
        options: &TaggedWithOptions,
    ) -> [Predicate; 2] {
        let count = tag_ids.len() as i64;
        let all = Predicate::CountEquals {
            subquery: Box::new(Subquery::taggings(
                GROUP_COUNT_ALIAS,
                Field::TagId,
                self.join_scope(GROUP_COUNT_ALIAS, scope, options),
            )),
            count,
        };
        let matching = Predicate::CountEquals {
            subquery: Box::new(Subquery::taggings(
                GROUP_MATCH_ALIAS,
                Field::TagId,
                Predicate::and([
                    self.join_scope(GROUP_MATCH_ALIAS, scope, options),
                    Column::tagging(GROUP_MATCH_ALIAS, Field::TagId).is_in(tag_ids.iter().copied()),
                ]),
            )),
            count,
        };
        [all, matching]
    }
}

fn owned_by(alias: &str, owner: &Owner) -> Predicate {
    Predicate::and([
        Column::tagging(alias, Field::TaggerId).equals(owner.owner_id),
        Column::tagging(alias, Field::TaggerType).equals(&owner.owner_type),
    ])
}

/// Anti-join against every taggable of the type carrying any of `tag_ids`,
/// in any context
fn without_taggings(scope: &TaggableScope, tag_ids: &[TagId]) -> Predicate {
    Predicate::InSubquery {
        column: Column::taggable(Field::Id),
        subquery: Box::new(Subquery::taggings(
            EXCLUDED_ALIAS,
            Field::TaggableId,
            Predicate::and([
                Column::tagging(EXCLUDED_ALIAS, Field::TaggableType).equals(&scope.taggable_type),
                Column::tagging(EXCLUDED_ALIAS, Field::TagId).is_in(tag_ids.iter().copied()),
            ]),
        )),
        negated: true,
    }
}

/// SQL for a filter; rows are distinct since every tag condition is an `EXISTS`
pub fn to_sql(scope: &TaggableScope, filter: &TaggableFilter) -> CompiledSql {
    let mut sql = SqlBuilder::for_scope(scope);
    let source = sql.taggable_source(scope);
    let condition = sql.predicate(&filter.predicate);
    let (column, direction) = match &filter.order {
        Some(order) => (order.column.as_str(), order.direction),
        None => (scope.primary_key(), Direction::Asc),
    };
    sql.finish(format!(
        "SELECT taggable.{} FROM {} WHERE {} ORDER BY taggable.{} {}",
        scope.primary_key(),
        source,
        condition,
        column,
        direction.as_sql()
    ))
}
