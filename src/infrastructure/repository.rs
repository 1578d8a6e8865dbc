//! Workspace discovery and layout

use crate::error::{Result, TaggableError};
use crate::infrastructure::config::{Config, WORKSPACE_DIR};
use crate::infrastructure::database::Database;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the workspace root explicitly
pub const ROOT_ENV: &str = "TAGGABLE_ROOT";

/// Abstract access to a tagging workspace
pub trait WorkspaceRepository {
    /// Get the root directory of this workspace
    fn root(&self) -> &Path;

    /// Load configuration from .taggable/config.toml
    fn load_config(&self) -> Result<Config>;

    /// Save configuration to .taggable/config.toml
    fn save_config(&self, config: &Config) -> Result<()>;

    /// Check if .taggable directory exists
    fn is_initialized(&self) -> bool;

    /// Create .taggable directory structure
    fn initialize(&self) -> Result<()>;

    /// Open the tag store with the settings from the config
    fn open_database(&self) -> Result<Database>;
}

/// File system implementation of WorkspaceRepository
#[derive(Debug, Clone)]
pub struct FileSystemRepository {
    pub root: PathBuf,
}

impl FileSystemRepository {
    /// Create a new repository with the given root directory
    pub fn new(root: PathBuf) -> Self {
        FileSystemRepository { root }
    }

    /// Discover workspace root by walking up from current directory
    /// First checks TAGGABLE_ROOT environment variable, then falls back to discovery
    pub fn discover() -> Result<Self> {
        if let Ok(root_path) = std::env::var(ROOT_ENV) {
            let path = PathBuf::from(root_path);
            if Self::has_workspace_dir(&path) {
                return Ok(FileSystemRepository::new(path));
            } else {
                return Err(TaggableError::Config(format!(
                    "{} is set to '{}' but no {} directory found. \
                    Run 'taggable init' in that directory or unset {}.",
                    ROOT_ENV,
                    path.display(),
                    WORKSPACE_DIR,
                    ROOT_ENV
                )));
            }
        }

        let current_dir = std::env::current_dir()?;
        Self::discover_from(&current_dir)
    }

    /// Discover workspace root by walking up from a specific starting directory
    pub fn discover_from(start: &Path) -> Result<Self> {
        let mut current = start.to_path_buf();

        loop {
            if Self::has_workspace_dir(&current) {
                return Ok(FileSystemRepository::new(current));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Err(TaggableError::NotWorkspace(start.to_path_buf())),
            }
        }
    }

    fn has_workspace_dir(path: &Path) -> bool {
        path.join(WORKSPACE_DIR).is_dir()
    }
}

impl WorkspaceRepository for FileSystemRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    fn load_config(&self) -> Result<Config> {
        Config::load_from_dir(&self.root)
    }

    fn save_config(&self, config: &Config) -> Result<()> {
        config.save_to_dir(&self.root)
    }

    fn is_initialized(&self) -> bool {
        Self::has_workspace_dir(&self.root)
    }

    fn initialize(&self) -> Result<()> {
        let dir = self.root.join(WORKSPACE_DIR);

        if dir.exists() {
            return Err(TaggableError::Config(format!(
                "Directory already initialized: {}",
                self.root.display()
            )));
        }

        fs::create_dir(&dir)?;
        Ok(())
    }

    fn open_database(&self) -> Result<Database> {
        let config = self.load_config()?;
        Database::open(&Config::database_path(&self.root), config.store_settings())
    }
}
