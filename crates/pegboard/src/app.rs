//! Application context for CLI command execution.
//!
//! The `App` struct finds the board, loads configuration, and owns the
//! storage backend for the duration of a command.

use crate::commands::init::{find_board_root, BoardConfig, BOARD_DIR_NAME, CONFIG_FILE_NAME};
use crate::error::{Error, Result};
use crate::storage::{create_storage, BoardStorage};
use std::path::{Path, PathBuf};

/// Application context for CLI operations.
///
/// Storage is loaded from the board directory on creation. Mutating
/// commands go through [`App::commit`] so a failed save rolls the
/// in-memory board back to the on-disk state.
pub struct App {
    storage: Box<dyn BoardStorage>,

    /// Path to the board directory (.pegboard).
    board_dir: PathBuf,

    /// Loaded configuration.
    config: BoardConfig,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("board_dir", &self.board_dir)
            .field("config", &self.config)
            .field("storage", &"<dyn BoardStorage>")
            .finish()
    }
}

impl App {
    /// Create an App instance from the given working directory.
    ///
    /// Searches up the directory tree for a `.pegboard/` directory, loads
    /// configuration, and initializes storage.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no board is found and propagates
    /// configuration or storage errors.
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_board_root(working_dir).ok_or_else(|| {
            Error::Config(
                "Not a pegboard directory (or any parent). Run 'pegboard init' first.".to_string(),
            )
        })?;

        let board_dir = root_dir.join(BOARD_DIR_NAME);
        let config = BoardConfig::load(&board_dir.join(CONFIG_FILE_NAME)).await?;

        let backend = config.to_backend(&root_dir)?;
        let storage = create_storage(backend).await?;

        Ok(Self {
            storage,
            board_dir,
            config,
        })
    }

    /// Get a mutable reference to the storage.
    pub fn storage_mut(&mut self) -> &mut dyn BoardStorage {
        self.storage.as_mut()
    }

    /// Get an immutable reference to the storage.
    pub fn storage(&self) -> &dyn BoardStorage {
        self.storage.as_ref()
    }

    /// Get the path to the board directory.
    pub fn board_dir(&self) -> &Path {
        &self.board_dir
    }

    /// Get the configured default project name.
    pub fn default_project(&self) -> &str {
        &self.config.default_project
    }

    /// Persist the in-memory board.
    ///
    /// On a failed save, the board is reloaded from disk before the
    /// error propagates, so memory never stays ahead of the file.
    pub async fn commit(&mut self) -> Result<()> {
        if let Err(err) = self.storage.save().await {
            self.storage.reload().await?;
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use crate::domain::NewProject;
    use tempfile::TempDir;

    #[tokio::test]
    async fn app_from_initialized_directory() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path(), Some("api")).await.unwrap();

        let app = App::from_directory(temp_dir.path()).await.unwrap();

        assert_eq!(app.default_project(), "api");
        assert!(app.board_dir().ends_with(".pegboard"));
        assert_eq!(app.storage().list_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn app_from_subdirectory_finds_board() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path(), None).await.unwrap();

        let sub_dir = temp_dir.path().join("src").join("lib");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let app = App::from_directory(&sub_dir).await.unwrap();
        assert_eq!(app.default_project(), init::DEFAULT_PROJECT);
    }

    #[tokio::test]
    async fn app_from_uninitialized_directory_fails() {
        let temp_dir = TempDir::new().unwrap();

        let err = App::from_directory(temp_dir.path())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("Not a pegboard directory"));
    }

    #[tokio::test]
    async fn commit_persists_changes() {
        let temp_dir = TempDir::new().unwrap();
        init::init(temp_dir.path(), None).await.unwrap();

        let mut app = App::from_directory(temp_dir.path()).await.unwrap();
        app.storage_mut()
            .create_project(NewProject {
                name: "second".to_string(),
                description: None,
            })
            .await
            .unwrap();
        app.commit().await.unwrap();

        let reopened = App::from_directory(temp_dir.path()).await.unwrap();
        assert_eq!(reopened.storage().list_projects().await.unwrap().len(), 2);
    }
}
