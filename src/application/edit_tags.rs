//! Edit tag list use case
//!
//! Replaces, extends or trims the system tag list of one taggable in one
//! context and saves the result.

use crate::application::taggable::Taggable;
use crate::domain::{NamePolicy, TagList, TagListChange, TaggableRef};
use crate::error::Result;
use crate::infrastructure::Database;
use tracing::debug;

/// How the given names combine with the stored list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEdit {
    Replace,
    Add,
    Remove,
}

/// Apply `edit` with `given` to the list stored on `target` in `context`
pub fn edit_tags(
    db: &mut Database,
    target: TaggableRef,
    context: &str,
    given: &TagList,
    edit: TagEdit,
) -> Result<TagListChange> {
    let policy = db.settings().policy;
    let mut taggable = Taggable::new(target);

    let current = taggable.tag_list(db, context)?.clone();
    let next = combine(current, given, edit, policy);
    debug!(taggable = %taggable.target(), context, ?edit, "Editing tag list");

    let change = taggable.set_tag_list(db, context, next)?;
    taggable.save(db)?;
    Ok(change)
}

/// The list after applying `edit`; names already present under `policy` are
/// not added twice
fn combine(current: TagList, given: &TagList, edit: TagEdit, policy: NamePolicy) -> TagList {
    match edit {
        TagEdit::Replace => given.clone(),
        TagEdit::Add => {
            let mut list = current;
            for name in given.iter() {
                if !list.iter().any(|existing| policy.same(existing, name)) {
                    list.add(name);
                }
            }
            list
        }
        TagEdit::Remove => {
            let mut list = current;
            for name in given.iter() {
                list.remove(name, policy);
            }
            list
        }
    }
}
