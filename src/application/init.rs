//! Initialize workspace use case

use crate::domain::NamePolicy;
use crate::error::Result;
use crate::infrastructure::{Config, FileSystemRepository, WorkspaceRepository};
use std::fs;
use std::path::Path;
use tracing::info;

/// Initialize a new tag store at the specified path.
pub fn init(path: &Path, policy: NamePolicy) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }

    let repo = FileSystemRepository::new(path.to_path_buf());
    repo.initialize()?;

    let config = Config::new(policy);
    repo.save_config(&config)?;

    // Opening once stamps the name policy into the database
    repo.open_database()?;
    info!(root = %path.display(), policy = %policy, "Initialized workspace");

    println!("Initialized taggable workspace at {}", path.display());
    println!("Name policy: {}", policy);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaggableError;
    use crate::infrastructure::Database;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_config_and_database() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        init(&root, NamePolicy::Strict).unwrap();

        let config = Config::load_from_dir(&root).unwrap();
        assert_eq!(config.name_policy, NamePolicy::Strict);
        assert!(Config::database_path(&root).exists());
    }

    #[test]
    fn test_init_stamps_policy() {
        let temp = TempDir::new().unwrap();
        init(temp.path(), NamePolicy::Strict).unwrap();

        let path = Config::database_path(temp.path());
        let settings = Config::new(NamePolicy::Normalized).store_settings();
        assert!(matches!(
            Database::open(&path, settings),
            Err(TaggableError::Config(_))
        ));
    }

    #[test]
    fn test_init_twice_fails() {
        let temp = TempDir::new().unwrap();
        init(temp.path(), NamePolicy::Normalized).unwrap();
        assert!(init(temp.path(), NamePolicy::Normalized).is_err());
    }
}
