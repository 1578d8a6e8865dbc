//! Rename tag use case

use crate::domain::Tag;
use crate::error::{Result, TaggableError};
use crate::infrastructure::{Database, TagStore};
use tracing::info;

/// Rename the tag named `from` (under the store's name policy) to `to`.
///
/// Every tagging keeps pointing at the same tag, so the new name shows up on
/// every taggable at once.
pub fn rename_tag(db: &mut Database, from: &str, to: &str) -> Result<Tag> {
    let tag = db.write(|conn, settings| {
        let store = TagStore::new(conn, settings);
        let tag = store
            .find_named(from)?
            .ok_or_else(|| TaggableError::NotFound(format!("tag '{}'", from)))?;
        store.rename(tag.id, to)
    })?;
    info!(id = tag.id, from, to = %tag.name, "Renamed tag");
    Ok(tag)
}
