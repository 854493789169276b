//! Implementation of the `init` command.
//!
//! This module handles initialization of a new pegboard board, creating
//! the `.pegboard/` directory with configuration and the snapshot file,
//! seeded with the default registry and a starting project.

use crate::domain::NewProject;
use crate::error::{Error, Result};
use crate::storage::{create_storage, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the project created by `init` when none is given.
pub const DEFAULT_PROJECT: &str = "default";

/// Name of the board directory.
pub const BOARD_DIR_NAME: &str = ".pegboard";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the snapshot data file.
pub const BOARD_FILE_NAME: &str = "board.jsonl";

/// Name of the gitignore file within .pegboard.
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Maximum project name length accepted by `init`.
pub const MAX_PROJECT_NAME_LENGTH: usize = 64;

/// Maximum directory depth to traverse when searching for the board root.
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Configuration file structure for a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardConfig {
    /// Name of the project CLI commands target when none is specified.
    #[serde(rename = "default-project")]
    pub default_project: String,

    /// Storage configuration.
    pub storage: StorageConfig,
}

/// Storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Storage backend type ("jsonl" or "memory").
    pub backend: String,

    /// Path to the data file, relative to the board root.
    pub data_file: String,
}

impl BoardConfig {
    /// Create a new configuration with the given default project.
    pub fn new(project: &str) -> Self {
        Self {
            default_project: project.to_string(),
            storage: StorageConfig {
                backend: "jsonl".to_string(),
                data_file: format!("{BOARD_DIR_NAME}/{BOARD_FILE_NAME}"),
            },
        }
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config`
    /// if it does not parse as YAML.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on serialization failure and `Error::Io`
    /// on write failure.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Resolve this configuration to a storage backend rooted at the
    /// board root directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unrecognized backend name.
    pub fn to_backend(&self, root: &Path) -> Result<StorageBackend> {
        match self.storage.backend.as_str() {
            "jsonl" => Ok(StorageBackend::Jsonl(root.join(&self.storage.data_file))),
            "memory" => Ok(StorageBackend::InMemory),
            other => Err(Error::Config(format!("Unknown storage backend: '{other}'"))),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT)
    }
}

/// Result of the init command.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created board directory.
    pub board_dir: PathBuf,
    /// Path to the created config file.
    pub config_file: PathBuf,
    /// Path to the created snapshot file.
    pub board_file: PathBuf,
    /// Path to the created gitignore file.
    pub gitignore_file: PathBuf,
    /// Name of the starting project.
    pub project: String,
}

/// Validate a starting project name.
///
/// Expects pre-trimmed input; callers trim whitespace first.
pub fn validate_project_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("Project name cannot be empty".to_string()));
    }
    if name.len() > MAX_PROJECT_NAME_LENGTH {
        return Err(Error::Config(format!(
            "Project name cannot exceed {MAX_PROJECT_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Initialize a new board in the given directory.
///
/// Creates `.pegboard/` with a config file, a snapshot file holding the
/// seeded registry and the starting project, and a gitignore.
///
/// # Errors
///
/// Returns `Error::Config` if the directory is already initialized or
/// the project name is invalid, and `Error::Io` on file system failures.
pub async fn init(base_dir: &Path, project: Option<&str>) -> Result<InitResult> {
    let project = project.unwrap_or(DEFAULT_PROJECT).trim();
    validate_project_name(project)?;

    let board_dir = base_dir.join(BOARD_DIR_NAME);
    if board_dir.exists() {
        return Err(Error::Config(format!(
            "Pegboard is already initialized in this directory. Found existing '{BOARD_DIR_NAME}'"
        )));
    }

    fs::create_dir_all(&board_dir).await?;

    let config_file = board_dir.join(CONFIG_FILE_NAME);
    let config = BoardConfig::new(project);
    config.save(&config_file).await?;

    // Write the first snapshot through the storage layer so the file
    // carries the seeded registry and the starting project.
    let board_file = board_dir.join(BOARD_FILE_NAME);
    let mut storage = create_storage(StorageBackend::Jsonl(board_file.clone())).await?;
    storage
        .create_project(NewProject {
            name: project.to_string(),
            description: None,
        })
        .await?;
    storage.save().await?;

    let gitignore_file = board_dir.join(GITIGNORE_FILE_NAME);
    let gitignore_content = "\
# Pegboard metadata that should not be tracked
# The board.jsonl file should be tracked for collaboration
";
    fs::write(&gitignore_file, gitignore_content).await?;

    Ok(InitResult {
        board_dir,
        config_file,
        board_file,
        gitignore_file,
        project: project.to_string(),
    })
}

/// Check whether a directory has been initialized.
pub fn is_initialized(base_dir: &Path) -> bool {
    base_dir.join(BOARD_DIR_NAME).exists()
}

/// Find the board root by searching up the directory tree.
///
/// Returns the directory containing `.pegboard/`, or `None` if no board
/// is found within the depth limit.
pub fn find_board_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(BOARD_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case::simple("api")]
    #[case::with_spaces_inside("backend services")]
    #[case::max_length("a".repeat(64))]
    fn validate_project_name_valid(#[case] name: impl AsRef<str>) {
        assert!(validate_project_name(name.as_ref()).is_ok());
    }

    #[rstest]
    #[case::empty("", "empty")]
    #[case::too_long("a".repeat(65), "cannot exceed 64")]
    fn validate_project_name_invalid(#[case] name: impl AsRef<str>, #[case] expected: &str) {
        let err = validate_project_name(name.as_ref()).unwrap_err().to_string();
        assert!(err.contains(expected), "expected '{expected}' in '{err}'");
    }

    #[test]
    fn config_new() {
        let config = BoardConfig::new("api");
        assert_eq!(config.default_project, "api");
        assert_eq!(config.storage.backend, "jsonl");
        assert_eq!(config.storage.data_file, ".pegboard/board.jsonl");
    }

    #[tokio::test]
    async fn config_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let original = BoardConfig::new("backend");
        original.save(&path).await.unwrap();

        let loaded = BoardConfig::load(&path).await.unwrap();
        assert_eq!(original, loaded);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("default-project: backend"));
        assert!(content.contains("backend: jsonl"));
    }

    #[test]
    fn config_to_backend() {
        let root = Path::new("/work");

        let jsonl = BoardConfig::new("api").to_backend(root).unwrap();
        assert_eq!(
            jsonl.data_path(),
            Some(Path::new("/work/.pegboard/board.jsonl"))
        );

        let mut config = BoardConfig::new("api");
        config.storage.backend = "sqlite".to_string();
        assert!(config.to_backend(root).is_err());
    }

    #[tokio::test]
    async fn init_creates_directory_structure() {
        let temp_dir = TempDir::new().unwrap();

        let result = init(temp_dir.path(), None).await.unwrap();

        assert!(result.board_dir.exists());
        assert!(result.config_file.exists());
        assert!(result.board_file.exists());
        assert!(result.gitignore_file.exists());
        assert_eq!(result.project, DEFAULT_PROJECT);
    }

    #[tokio::test]
    async fn init_seeds_registry_and_project() {
        let temp_dir = TempDir::new().unwrap();

        let result = init(temp_dir.path(), Some("api")).await.unwrap();

        let (storage, warnings) = crate::storage::memory::load_snapshot(&result.board_file)
            .await
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(storage.states().await.unwrap().len(), 4);
        assert_eq!(storage.types().await.unwrap().len(), 4);
        assert_eq!(storage.priorities().await.unwrap().len(), 4);

        let projects = storage.list_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "api");
    }

    #[tokio::test]
    async fn init_fails_if_already_initialized() {
        let temp_dir = TempDir::new().unwrap();

        init(temp_dir.path(), None).await.unwrap();
        let err = init(temp_dir.path(), None).await.unwrap_err().to_string();
        assert!(err.to_lowercase().contains("already initialized"));
    }

    #[tokio::test]
    async fn init_fails_with_invalid_project() {
        let temp_dir = TempDir::new().unwrap();

        let result = init(temp_dir.path(), Some("   ")).await;
        assert!(result.is_err());
    }

    #[test]
    fn is_initialized_reflects_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_initialized(temp_dir.path()));

        std::fs::create_dir(temp_dir.path().join(BOARD_DIR_NAME)).unwrap();
        assert!(is_initialized(temp_dir.path()));
    }

    #[test]
    fn find_board_root_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(BOARD_DIR_NAME)).unwrap();

        let sub_dir = temp_dir.path().join("src").join("nested");
        std::fs::create_dir_all(&sub_dir).unwrap();

        assert_eq!(
            find_board_root(&sub_dir),
            Some(temp_dir.path().to_path_buf())
        );
    }

    #[test]
    fn find_board_root_not_found() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_board_root(temp_dir.path()).is_none());
    }
}
