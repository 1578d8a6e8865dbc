//! Host entity model
//!
//! A [`Taggable`] caches one [`TagList`] per context. Lists are read from the
//! store on first access, changed in memory by [`Taggable::set_tag_list`], and
//! written back by [`Taggable::save`], which reconciles every pending context
//! in one transaction.

use crate::application::aggregator::Aggregator;
use crate::application::reconciler::{ReconcileReport, Reconciler};
use crate::domain::{OptionMap, TagCount, TagList, TagListChange, TaggableRef, TaggableScope};
use crate::error::Result;
use crate::infrastructure::Database;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Taggable {
    target: TaggableRef,
    lists: BTreeMap<String, TagList>,
    pending: BTreeSet<String>,
    custom_contexts: Vec<String>,
}

impl Taggable {
    pub fn new(target: TaggableRef) -> Self {
        Taggable {
            target,
            lists: BTreeMap::new(),
            pending: BTreeSet::new(),
            custom_contexts: Vec::new(),
        }
    }

    pub fn target(&self) -> &TaggableRef {
        &self.target
    }

    /// Contexts used on this instance that the store never declared
    pub fn custom_contexts(&self) -> &[String] {
        &self.custom_contexts
    }

    /// Contexts with an assignment not yet saved
    pub fn pending_contexts(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(|c| c.as_str())
    }

    /// The tag list of `context`, loading it on first access
    pub fn tag_list(&mut self, db: &Database, context: &str) -> Result<&TagList> {
        self.register(db, context);
        if !self.lists.contains_key(context) {
            let stored: TagList = db
                .taggings()
                .tags_on(&self.target, context)?
                .into_iter()
                .map(|tag| tag.name)
                .collect();
            self.lists.insert(context.to_string(), stored);
        }
        Ok(&self.lists[context])
    }

    /// Replace the tag list of `context` in memory; `save` persists it
    pub fn set_tag_list(
        &mut self,
        db: &Database,
        context: &str,
        list: impl Into<TagList>,
    ) -> Result<TagListChange> {
        let previous = self.tag_list(db, context)?.clone();
        let next = list.into();
        let change = TagListChange {
            previous,
            next: next.clone(),
        };

        if change.is_changed() {
            self.pending.insert(context.to_string());
        }
        self.lists.insert(context.to_string(), next);
        Ok(change)
    }

    /// Reconcile every pending context atomically. Saved contexts are reloaded
    /// from the store on next access.
    pub fn save(&mut self, db: &mut Database) -> Result<Vec<ReconcileReport>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }

        let target = &self.target;
        let work: Vec<(&str, &TagList)> = self
            .pending
            .iter()
            .filter_map(|context| {
                self.lists
                    .get(context)
                    .map(|list| (context.as_str(), list))
            })
            .collect();

        let reports = db.write(|conn, settings| {
            let reconciler = Reconciler::new(conn, settings);
            work.iter()
                .map(|(context, list)| reconciler.apply(target, context, list))
                .collect::<Result<Vec<_>>>()
        })?;

        debug!(taggable = %self.target, contexts = reports.len(), "Saved tag lists");
        for report in &reports {
            self.lists.remove(&report.context);
        }
        self.pending.clear();
        Ok(reports)
    }

    /// Drop every cached list and unsaved assignment
    pub fn reload(&mut self) {
        self.lists.clear();
        self.pending.clear();
    }

    /// Tags applied by anyone in `context`, including owned taggings
    pub fn all_tags_list(&self, db: &Database, context: &str) -> Result<TagList> {
        Ok(db
            .taggings()
            .all_tags_on(&self.target, context)?
            .into_iter()
            .map(|tag| tag.name)
            .collect())
    }

    /// Tag counts restricted to this instance
    pub fn tag_counts_on(
        &self,
        db: &Database,
        context: &str,
        options: &OptionMap,
    ) -> Result<Vec<TagCount>> {
        let mut options = options.clone();
        options.insert("on", context);
        options.insert("id", self.target.taggable_id);
        Aggregator::new(db.conn()).count_tags(&TaggableScope::tagged(&self.target.taggable_type), &options)
    }

    fn register(&mut self, db: &Database, context: &str) {
        if !db.settings().contexts.is_declared(context)
            && !self.custom_contexts.iter().any(|c| c == context)
        {
            self.custom_contexts.push(context.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContextConfig, ContextRegistry, NewTagging, Owner};
    use crate::infrastructure::StoreSettings;

    fn db() -> Database {
        let contexts = ContextRegistry::new()
            .declare("skills", ContextConfig::ordered())
            .declare("interests", ContextConfig::default());
        Database::open_in_memory(StoreSettings::default().with_contexts(contexts)).unwrap()
    }

    fn names(list: &TagList) -> Vec<&str> {
        list.iter().collect()
    }

    #[test]
    fn set_tag_list_reports_previous_and_next() {
        let mut db = db();
        let mut user = Taggable::new(TaggableRef::new("User", 1));

        let change = user
            .set_tag_list(&db, "skills", TagList::parse("ruby, rails", ","))
            .unwrap();
        assert!(change.previous.is_empty());
        assert_eq!(names(&change.next), vec!["ruby", "rails"]);
        assert_eq!(user.pending_contexts().collect::<Vec<_>>(), vec!["skills"]);

        user.save(&mut db).unwrap();
        assert_eq!(user.pending_contexts().count(), 0);

        let change = user
            .set_tag_list(&db, "skills", TagList::parse("rails", ","))
            .unwrap();
        assert_eq!(names(&change.previous), vec!["ruby", "rails"]);
        assert_eq!(names(&change.next), vec!["rails"]);
    }

    #[test]
    fn unchanged_assignment_is_not_pending() {
        let mut db = db();
        let mut user = Taggable::new(TaggableRef::new("User", 1));
        user.set_tag_list(&db, "interests", TagList::parse("a", ","))
            .unwrap();
        user.save(&mut db).unwrap();

        let change = user
            .set_tag_list(&db, "interests", TagList::parse("a", ","))
            .unwrap();
        assert!(!change.is_changed());
        assert!(user.save(&mut db).unwrap().is_empty());
    }

    #[test]
    fn save_reconciles_every_pending_context() {
        let mut db = db();
        let mut user = Taggable::new(TaggableRef::new("User", 1));
        user.set_tag_list(&db, "skills", TagList::parse("c, a, b", ","))
            .unwrap();
        user.set_tag_list(&db, "interests", TagList::parse("x", ","))
            .unwrap();

        let reports = user.save(&mut db).unwrap();
        assert_eq!(reports.len(), 2);

        let mut fresh = Taggable::new(TaggableRef::new("User", 1));
        assert_eq!(names(fresh.tag_list(&db, "skills").unwrap()), vec!["c", "a", "b"]);
        assert_eq!(names(fresh.tag_list(&db, "interests").unwrap()), vec!["x"]);
    }

    #[test]
    fn failed_save_keeps_pending_state() {
        let mut db = db();
        let mut user = Taggable::new(TaggableRef::new("User", 1));
        user.set_tag_list(&db, "interests", TagList::parse("ok", ","))
            .unwrap();
        let long = "y".repeat(256);
        user.set_tag_list(&db, "skills", TagList::from(vec![long]))
            .unwrap();

        assert!(user.save(&mut db).is_err());
        assert_eq!(user.pending_contexts().count(), 2);
        assert!(db.taggings().list(user.target(), None).unwrap().is_empty());
    }

    #[test]
    fn custom_contexts_are_registered_on_use() {
        let db = db();
        let mut user = Taggable::new(TaggableRef::new("User", 1));
        user.tag_list(&db, "skills").unwrap();
        user.tag_list(&db, "moods").unwrap();
        user.tag_list(&db, "moods").unwrap();
        assert_eq!(user.custom_contexts(), &["moods".to_string()]);
    }

    #[test]
    fn reload_discards_unsaved_lists() {
        let mut db = db();
        let mut user = Taggable::new(TaggableRef::new("User", 1));
        user.set_tag_list(&db, "interests", TagList::parse("a", ","))
            .unwrap();
        user.save(&mut db).unwrap();

        user.set_tag_list(&db, "interests", TagList::parse("b", ","))
            .unwrap();
        user.reload();
        assert_eq!(names(user.tag_list(&db, "interests").unwrap()), vec!["a"]);
    }

    #[test]
    fn all_tags_list_includes_owned_taggings() {
        let mut db = db();
        let mut user = Taggable::new(TaggableRef::new("User", 1));
        user.set_tag_list(&db, "interests", TagList::parse("mine", ","))
            .unwrap();
        user.save(&mut db).unwrap();

        let tag = db.tags().resolve(&["theirs"]).unwrap().remove(0);
        db.taggings()
            .insert(
                &NewTagging::system(tag.id, user.target(), "interests")
                    .owned_by(Owner::new("User", 2)),
            )
            .unwrap();

        assert_eq!(names(user.tag_list(&db, "interests").unwrap()), vec!["mine"]);
        assert_eq!(
            names(&user.all_tags_list(&db, "interests").unwrap()),
            vec!["mine", "theirs"]
        );
    }

    #[test]
    fn tag_counts_on_instance() {
        let mut db = db();
        let mut first = Taggable::new(TaggableRef::new("User", 1));
        let mut second = Taggable::new(TaggableRef::new("User", 2));
        first
            .set_tag_list(&db, "interests", TagList::parse("a, b", ","))
            .unwrap();
        second
            .set_tag_list(&db, "interests", TagList::parse("a", ","))
            .unwrap();
        first.save(&mut db).unwrap();
        second.save(&mut db).unwrap();

        let counts = second
            .tag_counts_on(&db, "interests", &OptionMap::new())
            .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].tag.name, "a");
        assert_eq!(counts[0].count, 1);
    }
}
