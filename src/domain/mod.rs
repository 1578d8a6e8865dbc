//! Domain layer - Tagging model and pure algorithms

pub mod context;
pub mod options;
pub mod predicate;
pub mod reconcile;
pub mod scope;
pub mod tag;
pub mod tag_list;
pub mod tagging;

pub use context::{ContextConfig, ContextRegistry};
pub use options::{
    ListTagsOptions, OptionMap, OptionValue, TagCountOptions, TaggedWithOptions,
};
pub use predicate::{Alias, Column, Field, Predicate, Subquery, Value};
pub use reconcile::ReconcilePlan;
pub use scope::{Source, TaggableScope};
pub use tag::{NamePolicy, Tag, TagCount, TagId};
pub use tag_list::{TagList, TagListChange};
pub use tagging::{NewTagging, Owner, TaggableRef, Tagging};
