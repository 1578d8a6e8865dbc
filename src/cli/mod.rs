//! CLI layer - Command-line interface

pub mod commands;
pub mod output;

pub use commands::{Cli, Commands, ScopeArgs};
pub use output::{format_ids, format_tag_counts, format_tag_list, format_tags};
