//! CLI command definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taggable")]
#[command(about = "Contextual tagging store backed by SQLite", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// A taggable type and, optionally, the host table it lives in
#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Taggable type (e.g., Article, User)
    #[arg(value_name = "TYPE")]
    pub taggable_type: String,

    /// Host table holding the taggables, restricting results to its rows
    #[arg(long)]
    pub table: Option<String>,

    /// Primary key column of the host table
    #[arg(long, default_value = "id")]
    pub key: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new tag store
    Init {
        /// Directory to initialize (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Tag name policy (strict, normalized)
        #[arg(short, long, default_value = "normalized")]
        policy: String,
    },

    /// View or modify configuration
    Config {
        /// Config key to get or set
        key: Option<String>,

        /// Value to set (if provided, sets the key)
        value: Option<String>,

        /// List all configuration
        #[arg(short, long)]
        list: bool,
    },

    /// Replace the tag list of a taggable in one context
    Set {
        #[arg(value_name = "TYPE")]
        taggable_type: String,
        id: i64,

        /// Delimited tag list; empty clears the context
        tags: String,

        /// Context to tag in
        #[arg(long, default_value = "tags")]
        on: String,
    },

    /// Add tags to a taggable's list
    Add {
        #[arg(value_name = "TYPE")]
        taggable_type: String,
        id: i64,
        tags: String,

        #[arg(long, default_value = "tags")]
        on: String,
    },

    /// Remove tags from a taggable's list
    Remove {
        #[arg(value_name = "TYPE")]
        taggable_type: String,
        id: i64,
        tags: String,

        #[arg(long, default_value = "tags")]
        on: String,
    },

    /// Show the tags of a taggable
    Show {
        #[arg(value_name = "TYPE")]
        taggable_type: String,
        id: i64,

        /// Only this context (default: every context in use)
        #[arg(long)]
        on: Option<String>,

        /// Include tags applied by owners
        #[arg(long)]
        all: bool,
    },

    /// Find taggables carrying the given tags
    Tagged {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Delimited tag list
        tags: String,

        /// Query option as key=value (any, exclude, match_all, wild, on, owned_by, order)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Print the generated SQL instead of running it
        #[arg(long)]
        explain: bool,
    },

    /// Count taggings per tag
    Counts {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Aggregation option as key=value (on, at_least, at_most, start_at, end_at, order, limit, conditions, id)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },

    /// List tags in use
    Tags {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Listing option as key=value (on, start_at, end_at, order, limit, conditions, id)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },

    /// Rename a tag everywhere it is used
    Rename {
        /// Current tag name
        from: String,

        /// New tag name
        to: String,
    },
}
