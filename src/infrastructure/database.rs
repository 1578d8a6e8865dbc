//! SQLite store
//!
//! One [`Database`] owns one connection. Reads go through [`Database::tags`] and
//! [`Database::taggings`]; writes that must land together go through
//! [`Database::write`], which runs them in a single `BEGIN IMMEDIATE`
//! transaction.

use crate::domain::{ContextRegistry, NamePolicy};
use crate::error::{Result, TaggableError};
use crate::infrastructure::tag_store::{NameUniquenessPolicy, TagStore, UniqueNames};
use crate::infrastructure::tagging_store::TaggingStore;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS index_tags_on_name_key ON tags (name_key);

    CREATE TABLE IF NOT EXISTS taggings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tag_id INTEGER NOT NULL REFERENCES tags (id) ON DELETE CASCADE,
        taggable_id INTEGER NOT NULL,
        taggable_type TEXT NOT NULL,
        tagger_id INTEGER,
        tagger_type TEXT,
        context TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        CHECK ((tagger_id IS NULL) = (tagger_type IS NULL))
    );
    DROP INDEX IF EXISTS index_taggings_identity;
    CREATE UNIQUE INDEX IF NOT EXISTS index_taggings_system_identity
        ON taggings (tag_id, taggable_id, taggable_type, context)
        WHERE tagger_id IS NULL;
    CREATE UNIQUE INDEX IF NOT EXISTS index_taggings_owned_identity
        ON taggings (tag_id, taggable_id, taggable_type, context, tagger_id, tagger_type)
        WHERE tagger_id IS NOT NULL;
    CREATE INDEX IF NOT EXISTS index_taggings_on_taggable
        ON taggings (taggable_id, taggable_type, context);
";

const POLICY_KEY: &str = "name_policy";

/// Settings fixed when a store is opened
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub policy: NamePolicy,
    pub uniqueness: Arc<dyn NameUniquenessPolicy>,
    pub contexts: ContextRegistry,
    pub busy_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            policy: NamePolicy::default(),
            uniqueness: Arc::new(UniqueNames),
            contexts: ContextRegistry::default(),
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl StoreSettings {
    pub fn with_policy(mut self, policy: NamePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_uniqueness(mut self, uniqueness: Arc<dyn NameUniquenessPolicy>) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    pub fn with_contexts(mut self, contexts: ContextRegistry) -> Self {
        self.contexts = contexts;
        self
    }
}

#[derive(Debug)]
pub struct Database {
    conn: Connection,
    settings: StoreSettings,
}

impl Database {
    /// Open (creating if needed) the database file at `path`
    pub fn open(path: &Path, settings: StoreSettings) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), "Opening tag store");
        let conn = Connection::open(path)?;
        Self::init(conn, settings)
    }

    pub fn open_in_memory(settings: StoreSettings) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, settings)
    }

    fn init(conn: Connection, settings: StoreSettings) -> Result<Self> {
        conn.busy_timeout(settings.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        check_policy(&conn, settings.policy)?;
        Ok(Database { conn, settings })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn tags(&self) -> TagStore<'_> {
        TagStore::new(&self.conn, &self.settings)
    }

    pub fn taggings(&self) -> TaggingStore<'_> {
        TaggingStore::new(&self.conn)
    }

    /// Run `f` inside one immediate transaction; nothing is kept if it fails
    pub fn write<T>(
        &mut self,
        f: impl FnOnce(&Connection, &StoreSettings) -> Result<T>,
    ) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx, &self.settings)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Record the name policy on first open and refuse to reopen under another one
fn check_policy(conn: &Connection, policy: NamePolicy) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            [POLICY_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match stored {
        None => {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                [POLICY_KEY, policy.as_str()],
            )?;
            Ok(())
        }
        Some(stored) if stored == policy.as_str() => Ok(()),
        Some(stored) => Err(TaggableError::Config(format!(
            "Tag store was created with the '{}' name policy and can't be opened with '{}'",
            stored, policy
        ))),
    }
}
