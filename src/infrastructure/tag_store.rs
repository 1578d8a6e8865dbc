//! Tag lookup and creation under the store's name policy
//!
//! Names are matched on the stored `name_key` column, which holds
//! [`NamePolicy::comparable`] of the name. Creating a tag outside of
//! [`TagStore::resolve`] consults the injected [`NameUniquenessPolicy`].

use crate::domain::predicate::escape_like;
use crate::domain::tag::validate_name;
use crate::domain::{Column, Field, NamePolicy, Predicate, Tag, TagId};
use crate::error::{Result, TaggableError};
use crate::infrastructure::database::StoreSettings;
use crate::infrastructure::sql::SqlBuilder;
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, trace};

/// Decides whether a new tag name may be stored
pub trait NameUniquenessPolicy: Send + Sync + fmt::Debug {
    /// `existing` holds the stored tags whose names compare equal to `name`
    fn check(&self, name: &str, existing: &[Tag]) -> Result<()>;
}

/// Rejects a name that is already taken under the name policy
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueNames;

impl NameUniquenessPolicy for UniqueNames {
    fn check(&self, name: &str, existing: &[Tag]) -> Result<()> {
        match existing.first() {
            Some(tag) => Err(TaggableError::Validation(format!(
                "name '{}' has already been taken by tag '{}'",
                name, tag.name
            ))),
            None => Ok(()),
        }
    }
}

/// Accepts every name
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowDuplicateNames;

impl NameUniquenessPolicy for AllowDuplicateNames {
    fn check(&self, _name: &str, _existing: &[Tag]) -> Result<()> {
        Ok(())
    }
}

pub struct TagStore<'c> {
    conn: &'c Connection,
    policy: NamePolicy,
    uniqueness: &'c dyn NameUniquenessPolicy,
}

impl<'c> TagStore<'c> {
    pub fn new(conn: &'c Connection, settings: &'c StoreSettings) -> Self {
        TagStore {
            conn,
            policy: settings.policy,
            uniqueness: settings.uniqueness.as_ref(),
        }
    }

    /// Find or create one tag per distinct name, in first-seen order.
    ///
    /// Names that compare equal under the policy resolve to the same tag. When
    /// duplicates are already stored the oldest one wins. Empty input never
    /// touches the store.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        for name in names {
            validate_name(name.as_ref())?;
        }

        let mut by_key: HashMap<String, Tag> = HashMap::new();
        for tag in self.find_any(names)? {
            by_key.entry(self.policy.comparable(&tag.name)).or_insert(tag);
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for name in names {
            let name = name.as_ref();
            let key = self.policy.comparable(name);
            let tag = match by_key.get(&key) {
                Some(tag) => tag.clone(),
                None => {
                    let tag = self.insert(name)?;
                    by_key.insert(key, tag.clone());
                    tag
                }
            };
            if seen.insert(tag.id) {
                resolved.push(tag);
            }
        }
        Ok(resolved)
    }

    /// Stored tags matching any of `names`; unmatched names are skipped
    pub fn find_any<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = names
            .iter()
            .map(|name| self.policy.comparable(name.as_ref()))
            .collect();
        self.select(&Column::tag(Field::NameKey).is_in(keys))
    }

    /// Oldest tag with this name, if any
    pub fn find_named(&self, name: &str) -> Result<Option<Tag>> {
        Ok(self.find_any(&[name])?.into_iter().next())
    }

    /// Tags whose name contains `fragment`, ignoring case
    pub fn matching_like(&self, fragment: &str) -> Result<Vec<Tag>> {
        self.select(&self.contains(fragment))
    }

    /// Tags whose name contains any of `fragments`
    pub fn matching_like_any<S: AsRef<str>>(&self, fragments: &[S]) -> Result<Vec<Tag>> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }
        let predicate = Predicate::or(fragments.iter().map(|f| self.contains(f.as_ref())));
        self.select(&predicate)
    }

    /// Case-insensitive exact lookup, creating the tag when nothing matches
    pub fn find_or_create_with_like(&self, name: &str) -> Result<Tag> {
        validate_name(name)?;
        let column = match self.policy {
            NamePolicy::Strict => Column::tag(Field::Name),
            NamePolicy::Normalized => Column::tag(Field::NameKey),
        };
        let exact = Predicate::Like(column, escape_like(&self.policy.comparable(name)));
        match self.select(&exact)?.into_iter().next() {
            Some(tag) => Ok(tag),
            None => self.create(name),
        }
    }

    /// Create a tag, subject to the uniqueness policy
    pub fn create(&self, name: &str) -> Result<Tag> {
        validate_name(name)?;
        let existing = self.find_any(&[name])?;
        self.uniqueness.check(name, &existing)?;
        self.insert(name)
    }

    pub fn get(&self, id: TagId) -> Result<Tag> {
        self.conn
            .query_row(
                "SELECT id, name FROM tags WHERE id = ?1",
                [id],
                tag_from_row,
            )
            .optional()?
            .ok_or_else(|| TaggableError::NotFound(format!("tag {}", id)))
    }

    /// Change a tag's name; the only update a tag ever receives
    pub fn rename(&self, id: TagId, name: &str) -> Result<Tag> {
        validate_name(name)?;
        let existing: Vec<Tag> = self
            .find_any(&[name])?
            .into_iter()
            .filter(|tag| tag.id != id)
            .collect();
        self.uniqueness.check(name, &existing)?;

        let changed = self.conn.execute(
            "UPDATE tags SET name = ?1, name_key = ?2 WHERE id = ?3",
            rusqlite::params![name, self.policy.comparable(name), id],
        )?;
        if changed == 0 {
            return Err(TaggableError::NotFound(format!("tag {}", id)));
        }
        debug!(id, name, "Renamed tag");
        Ok(Tag::new(id, name))
    }

    /// Number of taggings referencing the tag
    pub fn count(&self, id: TagId) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM taggings WHERE tag_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn all(&self) -> Result<Vec<Tag>> {
        self.select(&Predicate::True)
    }

    fn contains(&self, fragment: &str) -> Predicate {
        match self.policy {
            NamePolicy::Strict => Predicate::contains(Column::tag(Field::Name), fragment),
            NamePolicy::Normalized => Predicate::contains(
                Column::tag(Field::NameKey),
                &self.policy.comparable(fragment),
            ),
        }
    }

    fn insert(&self, name: &str) -> Result<Tag> {
        self.conn.execute(
            "INSERT INTO tags (name, name_key) VALUES (?1, ?2)",
            [name, self.policy.comparable(name).as_str()],
        )?;
        let id = self.conn.last_insert_rowid();
        trace!(id, name, "Created tag");
        Ok(Tag::new(id, name))
    }

    fn select(&self, predicate: &Predicate) -> Result<Vec<Tag>> {
        let mut sql = SqlBuilder::new();
        let filter = sql.predicate(predicate);
        let compiled = sql.finish(format!(
            "SELECT tags.id, tags.name FROM tags WHERE {} ORDER BY tags.id",
            filter
        ));
        trace!(sql = %compiled.sql, "Selecting tags");

        let mut stmt = self.conn.prepare(&compiled.sql)?;
        let tags = stmt
            .query_map(compiled.params(), tag_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}

pub(crate) fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag::new(row.get(0)?, row.get::<_, String>(1)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Database;
    use std::sync::Arc;

    fn db(policy: NamePolicy) -> Database {
        Database::open_in_memory(StoreSettings::default().with_policy(policy)).unwrap()
    }

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn resolve_collapses_case_variants() {
        let db = db(NamePolicy::Normalized);
        let tags = db.tags().resolve(&["Ruby", "ruby", "RUBY"]).unwrap();
        assert_eq!(names(&tags), vec!["Ruby"]);
        assert_eq!(db.tags().all().unwrap().len(), 1);
    }

    #[test]
    fn resolve_reuses_existing_tags() {
        let db = db(NamePolicy::Normalized);
        let first = db.tags().resolve(&["rust", "cli"]).unwrap();
        let second = db.tags().resolve(&["CLI", "web", "Rust"]).unwrap();
        assert_eq!(second[0].id, first[1].id);
        assert_eq!(second[2].id, first[0].id);
        assert_eq!(names(&second), vec!["cli", "web", "rust"]);
    }

    #[test]
    fn resolve_strict_keeps_case_variants_apart() {
        let db = db(NamePolicy::Strict);
        let tags = db.tags().resolve(&["Ruby", "ruby"]).unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn resolve_empty_input() {
        let db = db(NamePolicy::Normalized);
        let none: [&str; 0] = [];
        assert!(db.tags().resolve(&none).unwrap().is_empty());
    }

    #[test]
    fn resolve_validates_every_name_before_writing() {
        let db = db(NamePolicy::Normalized);
        let long = "x".repeat(256);
        let result = db.tags().resolve(&["ok", long.as_str()]);
        assert!(matches!(result, Err(TaggableError::Validation(_))));
        assert!(db.tags().all().unwrap().is_empty());
    }

    #[test]
    fn find_any_does_not_create() {
        let db = db(NamePolicy::Normalized);
        db.tags().resolve(&["x"]).unwrap();
        let found = db.tags().find_any(&["X", "nonexistent"]).unwrap();
        assert_eq!(names(&found), vec!["x"]);
        assert_eq!(db.tags().all().unwrap().len(), 1);
    }

    #[test]
    fn matching_like_escapes_wildcards() {
        let db = db(NamePolicy::Normalized);
        db.tags().resolve(&["100% done", "1000 done", "Rust_lang", "rustlang"]).unwrap();

        assert_eq!(names(&db.tags().matching_like("0%").unwrap()), vec!["100% done"]);
        assert_eq!(names(&db.tags().matching_like("T_L").unwrap()), vec!["Rust_lang"]);
        assert_eq!(
            names(&db.tags().matching_like("RUST").unwrap()),
            vec!["Rust_lang", "rustlang"]
        );
    }

    #[test]
    fn matching_like_any_unions_fragments() {
        let db = db(NamePolicy::Normalized);
        db.tags().resolve(&["rust", "ruby", "go"]).unwrap();
        let tags = db.tags().matching_like_any(&["ru", "g"]).unwrap();
        assert_eq!(names(&tags), vec!["rust", "ruby", "go"]);
    }

    #[test]
    fn create_respects_uniqueness_policy() {
        let db = db(NamePolicy::Normalized);
        db.tags().create("Rust").unwrap();
        assert!(matches!(
            db.tags().create("rust"),
            Err(TaggableError::Validation(_))
        ));

        let settings = StoreSettings::default().with_uniqueness(Arc::new(AllowDuplicateNames));
        let lenient = Database::open_in_memory(settings).unwrap();
        lenient.tags().create("Rust").unwrap();
        lenient.tags().create("rust").unwrap();
        assert_eq!(lenient.tags().all().unwrap().len(), 2);

        let resolved = lenient.tags().resolve(&["RUST"]).unwrap();
        assert_eq!(names(&resolved), vec!["Rust"]);
    }

    #[test]
    fn find_or_create_with_like_matches_exact_name_only() {
        let db = db(NamePolicy::Normalized);
        let rust = db.tags().create("Rust").unwrap();
        assert_eq!(db.tags().find_or_create_with_like("rust").unwrap(), rust);

        let created = db.tags().find_or_create_with_like("rus").unwrap();
        assert_ne!(created.id, rust.id);
        assert_eq!(created.name, "rus");
    }

    #[test]
    fn get_missing_tag_is_not_found() {
        let db = db(NamePolicy::Normalized);
        assert!(matches!(db.tags().get(42), Err(TaggableError::NotFound(_))));
    }

    #[test]
    fn rename_updates_lookup_key() {
        let db = db(NamePolicy::Normalized);
        let tag = db.tags().create("js").unwrap();
        db.tags().create("rust").unwrap();

        let renamed = db.tags().rename(tag.id, "JavaScript").unwrap();
        assert_eq!(db.tags().get(tag.id).unwrap(), renamed);
        assert_eq!(db.tags().find_named("javascript").unwrap(), Some(renamed));
        assert!(db.tags().find_named("js").unwrap().is_none());

        assert!(matches!(
            db.tags().rename(tag.id, "RUST"),
            Err(TaggableError::Validation(_))
        ));
        assert!(db.tags().rename(tag.id, "javascript").is_ok());
        assert!(matches!(
            db.tags().rename(99, "other"),
            Err(TaggableError::NotFound(_))
        ));
    }
}
