//! taggable - Contextual tagging for arbitrary entities
//!
//! Tags are named labels attached to taggable entities (identified by a type
//! name and an id) within named contexts, optionally on behalf of an owner.
//! The crate stores tags and taggings in SQLite, reconciles desired tag lists
//! against stored rows, finds taggables by tag, and aggregates tag usage.

pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::TaggableError;
