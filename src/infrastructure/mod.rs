//! Infrastructure layer - Persistence and workspace I/O

pub mod config;
pub mod database;
pub mod repository;
pub mod sql;
pub mod tag_store;
pub mod tagging_store;

pub use config::Config;
pub use database::{Database, StoreSettings};
pub use repository::{FileSystemRepository, WorkspaceRepository};
pub use sql::{CompiledSql, SqlBuilder};
pub use tag_store::{AllowDuplicateNames, NameUniquenessPolicy, TagStore, UniqueNames};
pub use tagging_store::TaggingStore;
