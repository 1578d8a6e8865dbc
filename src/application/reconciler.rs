//! Tag list reconciliation use case
//!
//! Turns a desired [`TagList`] for one taggable and context into tagging row
//! deletes and inserts. [`Reconciler::apply`] expects to run inside a
//! transaction; [`reconcile`] opens one.

use crate::domain::{NewTagging, ReconcilePlan, Tag, TagList, TaggableRef};
use crate::error::Result;
use crate::infrastructure::{Database, StoreSettings, TagStore, TaggingStore};
use rusqlite::Connection;
use tracing::{debug, info};

/// What one reconciliation changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub taggable: TaggableRef,
    pub context: String,
    pub removed: Vec<Tag>,
    pub added: Vec<Tag>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

pub struct Reconciler<'c> {
    conn: &'c Connection,
    settings: &'c StoreSettings,
}

impl<'c> Reconciler<'c> {
    pub fn new(conn: &'c Connection, settings: &'c StoreSettings) -> Self {
        Reconciler { conn, settings }
    }

    /// Resolve the desired names and diff them against the stored system tags
    pub fn plan(
        &self,
        taggable: &TaggableRef,
        context: &str,
        desired: &TagList,
    ) -> Result<ReconcilePlan> {
        let names = desired.deduped(self.settings.policy);
        let desired_tags = TagStore::new(self.conn, self.settings).resolve(&names)?;
        let current = TaggingStore::new(self.conn).tags_on(taggable, context)?;
        let preserve_order = self.settings.contexts.config_for(context).preserve_order;

        debug!(
            taggable = %taggable,
            context,
            current = current.len(),
            desired = desired_tags.len(),
            preserve_order,
            "Planning reconciliation"
        );
        Ok(ReconcilePlan::compute(&current, &desired_tags, preserve_order))
    }

    /// Plan, then delete and insert the tagging rows
    pub fn apply(
        &self,
        taggable: &TaggableRef,
        context: &str,
        desired: &TagList,
    ) -> Result<ReconcileReport> {
        let plan = self.plan(taggable, context, desired)?;
        let taggings = TaggingStore::new(self.conn);

        if !plan.remove.is_empty() {
            taggings.delete_for_tags(taggable, context, &plan.remove_ids())?;
        }
        for tag in &plan.add {
            taggings.insert(&NewTagging::system(tag.id, taggable, context))?;
        }

        if !plan.is_empty() {
            info!(
                taggable = %taggable,
                context,
                removed = plan.remove.len(),
                added = plan.add.len(),
                "Reconciled tag list"
            );
        }

        Ok(ReconcileReport {
            taggable: taggable.clone(),
            context: context.to_string(),
            removed: plan.remove,
            added: plan.add,
        })
    }
}

/// Reconcile one context of one taggable in its own transaction
pub fn reconcile(
    db: &mut Database,
    taggable: &TaggableRef,
    context: &str,
    desired: &TagList,
) -> Result<ReconcileReport> {
    db.write(|conn, settings| Reconciler::new(conn, settings).apply(taggable, context, desired))
}
