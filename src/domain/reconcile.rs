//! Tag list reconciliation planning
//!
//! Given the tags currently stored for one taggable and context (in ascending
//! tagging id order) and the desired tags, compute which associations to delete
//! and which to insert.
//!
//! Without order preservation this is a plain set difference. With it, stored
//! order is insertion order and rows can't be moved, so every shared tag after
//! the longest correctly positioned prefix is deleted and inserted again.

use super::tag::{Tag, TagId};
use std::collections::HashSet;

/// Deletions and insertions needed to turn the current tags into the desired ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Tags whose associations must be deleted, in current order
    pub remove: Vec<Tag>,
    /// Tags to associate, in insertion order
    pub add: Vec<Tag>,
}

impl ReconcilePlan {
    /// Compute the plan. `desired` is expected to be free of duplicates;
    /// repeated ids after the first are ignored.
    pub fn compute(current: &[Tag], desired: &[Tag], preserve_order: bool) -> Self {
        let desired = dedupe_by_id(desired);
        let desired_ids: HashSet<TagId> = desired.iter().map(|t| t.id).collect();
        let current_ids: HashSet<TagId> = current.iter().map(|t| t.id).collect();

        if !preserve_order {
            return ReconcilePlan {
                remove: current
                    .iter()
                    .filter(|t| !desired_ids.contains(&t.id))
                    .cloned()
                    .collect(),
                add: desired
                    .iter()
                    .filter(|t| !current_ids.contains(&t.id))
                    .cloned()
                    .collect(),
            };
        }

        let shared: Vec<&Tag> = current
            .iter()
            .filter(|t| desired_ids.contains(&t.id))
            .collect();

        let stable = shared
            .iter()
            .zip(desired.iter())
            .take_while(|(stored, wanted)| stored.id == wanted.id)
            .count();

        // Every desired tag past the stable prefix is either new or out of place
        let add: Vec<Tag> = desired[stable..].to_vec();
        let reinserted: HashSet<TagId> = add
            .iter()
            .filter(|t| current_ids.contains(&t.id))
            .map(|t| t.id)
            .collect();

        let remove = current
            .iter()
            .filter(|t| !desired_ids.contains(&t.id) || reinserted.contains(&t.id))
            .cloned()
            .collect();

        ReconcilePlan { remove, add }
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }

    pub fn remove_ids(&self) -> Vec<TagId> {
        self.remove.iter().map(|t| t.id).collect()
    }
}

fn dedupe_by_id(tags: &[Tag]) -> Vec<Tag> {
    let mut seen = HashSet::new();
    tags.iter().filter(|t| seen.insert(t.id)).cloned().collect()
}
