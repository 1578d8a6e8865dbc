//! Tagging rows: filtered insert, delete and listing

use crate::domain::{NewTagging, Owner, Tag, TagId, TaggableRef, Tagging};
use crate::error::{Result, TaggableError};
use crate::infrastructure::sql::{from_millis, to_millis};
use crate::infrastructure::tag_store::tag_from_row;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::trace;

pub struct TaggingStore<'c> {
    conn: &'c Connection,
}

impl<'c> TaggingStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        TaggingStore { conn }
    }

    /// Store one association.
    ///
    /// A row identical to an existing one means another writer got there
    /// first and fails with `Concurrency`.
    pub fn insert(&self, tagging: &NewTagging) -> Result<Tagging> {
        let (tagger_id, tagger_type) = match &tagging.tagger {
            Some(owner) => (Some(owner.owner_id), Some(owner.owner_type.as_str())),
            None => (None, None),
        };

        self.conn
            .execute(
                "INSERT INTO taggings
                    (tag_id, taggable_id, taggable_type, tagger_id, tagger_type, context, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    tagging.tag_id,
                    tagging.taggable.taggable_id,
                    tagging.taggable.taggable_type,
                    tagger_id,
                    tagger_type,
                    tagging.context,
                    to_millis(tagging.created_at),
                ],
            )
            .map_err(|e| {
                if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
                        return TaggableError::Concurrency(format!(
                            "tag {} is already applied to {} on '{}'",
                            tagging.tag_id, tagging.taggable, tagging.context
                        ));
                    }
                    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                        return TaggableError::NotFound(format!("tag {}", tagging.tag_id));
                    }
                }
                TaggableError::from(e)
            })?;

        let id = self.conn.last_insert_rowid();
        trace!(id, tag_id = tagging.tag_id, taggable = %tagging.taggable, "Inserted tagging");
        Ok(Tagging {
            id,
            tag_id: tagging.tag_id,
            taggable: tagging.taggable.clone(),
            tagger: tagging.tagger.clone(),
            context: tagging.context.clone(),
            created_at: tagging.created_at,
        })
    }

    /// Delete the untagged-by-anyone rows linking `taggable` to `tag_ids` in
    /// `context`. An empty id list deletes nothing.
    pub fn delete_for_tags(
        &self,
        taggable: &TaggableRef,
        context: &str,
        tag_ids: &[TagId],
    ) -> Result<usize> {
        if tag_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; tag_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM taggings
             WHERE taggable_id = ? AND taggable_type = ? AND context = ?
               AND tagger_id IS NULL AND tagger_type IS NULL
               AND tag_id IN ({})",
            placeholders
        );

        let mut values: Vec<rusqlite::types::Value> = vec![
            taggable.taggable_id.into(),
            taggable.taggable_type.clone().into(),
            context.to_string().into(),
        ];
        values.extend(tag_ids.iter().map(|id| rusqlite::types::Value::from(*id)));

        let deleted = self.conn.execute(&sql, params_from_iter(values))?;
        trace!(deleted, taggable = %taggable, context, "Deleted taggings");
        Ok(deleted)
    }

    /// Delete every tagging of `taggable`, owned or not, in every context
    pub fn delete_all_for(&self, taggable: &TaggableRef) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM taggings WHERE taggable_id = ?1 AND taggable_type = ?2",
            params![taggable.taggable_id, taggable.taggable_type],
        )?;
        Ok(deleted)
    }

    /// Rows of `taggable`, optionally limited to one context, by ascending id
    pub fn list(&self, taggable: &TaggableRef, context: Option<&str>) -> Result<Vec<Tagging>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tag_id, taggable_type, taggable_id, tagger_type, tagger_id, context, created_at
             FROM taggings
             WHERE taggable_id = ?1 AND taggable_type = ?2 AND (?3 IS NULL OR context = ?3)
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(
                params![taggable.taggable_id, taggable.taggable_type, context],
                tagging_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Tags applied without a tagger in `context`, in stored order
    pub fn tags_on(&self, taggable: &TaggableRef, context: &str) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT tags.id, tags.name
             FROM taggings
             JOIN tags ON tags.id = taggings.tag_id
             WHERE taggings.taggable_id = ?1 AND taggings.taggable_type = ?2
               AND taggings.context = ?3
               AND taggings.tagger_id IS NULL AND taggings.tagger_type IS NULL
             ORDER BY taggings.id",
        )?;
        let tags = stmt
            .query_map(
                params![taggable.taggable_id, taggable.taggable_type, context],
                tag_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Distinct tags applied by anyone in `context`, by first application
    pub fn all_tags_on(&self, taggable: &TaggableRef, context: &str) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT tags.id, tags.name
             FROM taggings
             JOIN tags ON tags.id = taggings.tag_id
             WHERE taggings.taggable_id = ?1 AND taggings.taggable_type = ?2
               AND taggings.context = ?3
             GROUP BY tags.id, tags.name
             ORDER BY MIN(taggings.id)",
        )?;
        let tags = stmt
            .query_map(
                params![taggable.taggable_id, taggable.taggable_type, context],
                tag_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Contexts `taggable` has taggings in
    pub fn contexts_of(&self, taggable: &TaggableRef) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT context FROM taggings
             WHERE taggable_id = ?1 AND taggable_type = ?2
             GROUP BY context
             ORDER BY MIN(id)",
        )?;
        let contexts = stmt
            .query_map(
                params![taggable.taggable_id, taggable.taggable_type],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(contexts)
    }
}

fn tagging_from_row(row: &Row<'_>) -> rusqlite::Result<Tagging> {
    let tagger_type: Option<String> = row.get(4)?;
    let tagger_id: Option<i64> = row.get(5)?;
    let tagger = match (tagger_type, tagger_id) {
        (Some(owner_type), Some(owner_id)) => Some(Owner::new(owner_type, owner_id)),
        _ => None,
    };

    Ok(Tagging {
        id: row.get(0)?,
        tag_id: row.get(1)?,
        taggable: TaggableRef::new(row.get::<_, String>(2)?, row.get(3)?),
        tagger,
        context: row.get(6)?,
        created_at: from_millis(7, row.get(7)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{Database, StoreSettings};
    use chrono::{TimeZone, Utc};

    fn setup() -> (Database, Vec<Tag>) {
        let db = Database::open_in_memory(StoreSettings::default()).unwrap();
        let tags = db.tags().resolve(&["a", "b", "c"]).unwrap();
        (db, tags)
    }

    #[test]
    fn insert_and_list_round_trip() {
        let (db, tags) = setup();
        let article = TaggableRef::new("Article", 1);
        let when = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        let stored = db
            .taggings()
            .insert(&NewTagging::system(tags[0].id, &article, "topics").at(when))
            .unwrap();
        db.taggings()
            .insert(&NewTagging::system(tags[1].id, &article, "topics").owned_by(Owner::new("User", 2)))
            .unwrap();

        let rows = db.taggings().list(&article, Some("topics")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], stored);
        assert_eq!(rows[0].created_at, when);
        assert_eq!(rows[1].tagger, Some(Owner::new("User", 2)));
        assert!(db.taggings().list(&article, Some("other")).unwrap().is_empty());
        assert_eq!(db.taggings().list(&article, None).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_insert_is_a_concurrency_error() {
        let (db, tags) = setup();
        let article = TaggableRef::new("Article", 1);
        let tagging = NewTagging::system(tags[0].id, &article, "topics");

        db.taggings().insert(&tagging).unwrap();
        assert!(matches!(
            db.taggings().insert(&tagging),
            Err(TaggableError::Concurrency(_))
        ));

        // Same tag from a tagger is a distinct association
        db.taggings()
            .insert(&tagging.clone().owned_by(Owner::new("User", 1)))
            .unwrap();
    }

    #[test]
    fn negative_tagger_id_does_not_collide_with_system_row() {
        let (db, tags) = setup();
        let article = TaggableRef::new("Article", 1);
        let system = NewTagging::system(tags[0].id, &article, "topics");
        let owned = system.clone().owned_by(Owner::new("User", -1));

        db.taggings().insert(&system).unwrap();
        db.taggings().insert(&owned).unwrap();
        assert_eq!(db.taggings().list(&article, None).unwrap().len(), 2);

        assert!(matches!(
            db.taggings().insert(&owned),
            Err(TaggableError::Concurrency(_))
        ));
        db.taggings()
            .insert(&system.clone().owned_by(Owner::new("Team", -1)))
            .unwrap();
    }

    #[test]
    fn insert_with_missing_tag_is_not_found() {
        let (db, _) = setup();
        let article = TaggableRef::new("Article", 1);
        assert!(matches!(
            db.taggings().insert(&NewTagging::system(999, &article, "topics")),
            Err(TaggableError::NotFound(_))
        ));
    }

    #[test]
    fn delete_for_tags_only_touches_system_rows() {
        let (db, tags) = setup();
        let article = TaggableRef::new("Article", 1);
        let store = db.taggings();
        store.insert(&NewTagging::system(tags[0].id, &article, "topics")).unwrap();
        store
            .insert(&NewTagging::system(tags[0].id, &article, "topics").owned_by(Owner::new("User", 1)))
            .unwrap();
        store.insert(&NewTagging::system(tags[0].id, &article, "skills")).unwrap();

        assert_eq!(store.delete_for_tags(&article, "topics", &[]).unwrap(), 0);
        assert_eq!(store.delete_for_tags(&article, "topics", &[tags[0].id]).unwrap(), 1);

        assert!(store.tags_on(&article, "topics").unwrap().is_empty());
        assert_eq!(store.all_tags_on(&article, "topics").unwrap(), vec![tags[0].clone()]);
        assert_eq!(store.tags_on(&article, "skills").unwrap(), vec![tags[0].clone()]);
    }

    #[test]
    fn tags_on_follows_insertion_order() {
        let (db, tags) = setup();
        let article = TaggableRef::new("Article", 7);
        let store = db.taggings();
        for tag in [&tags[2], &tags[0], &tags[1]] {
            store.insert(&NewTagging::system(tag.id, &article, "topics")).unwrap();
        }
        let names: Vec<String> = store
            .tags_on(&article, "topics")
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn delete_all_for_clears_every_context() {
        let (db, tags) = setup();
        let article = TaggableRef::new("Article", 1);
        let other = TaggableRef::new("Article", 2);
        let store = db.taggings();
        store.insert(&NewTagging::system(tags[0].id, &article, "topics")).unwrap();
        store.insert(&NewTagging::system(tags[1].id, &article, "skills")).unwrap();
        store.insert(&NewTagging::system(tags[0].id, &other, "topics")).unwrap();

        assert_eq!(
            store.contexts_of(&article).unwrap(),
            vec!["topics".to_string(), "skills".to_string()]
        );
        assert_eq!(store.delete_all_for(&article).unwrap(), 2);
        assert!(store.list(&article, None).unwrap().is_empty());
        assert_eq!(store.list(&other, None).unwrap().len(), 1);
    }
}
