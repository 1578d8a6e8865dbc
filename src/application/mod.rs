//! Application layer - Use cases and orchestration

pub mod aggregator;
pub mod edit_tags;
pub mod init;
pub mod manage_config;
pub mod query_engine;
pub mod reconciler;
pub mod rename_tag;
pub mod taggable;

pub use aggregator::Aggregator;
pub use edit_tags::{edit_tags, TagEdit};
pub use manage_config::ConfigService;
pub use query_engine::{QueryEngine, TaggableFilter};
pub use reconciler::{reconcile, ReconcileReport, Reconciler};
pub use rename_tag::rename_tag;
pub use taggable::Taggable;
