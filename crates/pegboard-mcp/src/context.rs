//! Workspace context management for the MCP server.
//!
//! This module handles:
//! - Workspace detection (walking up to find `.pegboard/`)
//! - Path canonicalization
//! - Per-workspace storage instance management
//!
//! # Lock Ordering
//!
//! When using `Context` with `Tools`, locks must be acquired in this order:
//! 1. `Context` read/write lock (via `Arc<RwLock<Context>>`)
//! 2. Storage read/write lock (via `Arc<RwLock<Box<dyn BoardStorage>>>`)
//!
//! Never attempt to acquire a context lock while holding a storage lock.
//! This prevents potential deadlocks in concurrent scenarios.

use crate::error::{Error, Result};
use pegboard::commands::init::{BoardConfig, BOARD_DIR_NAME, CONFIG_FILE_NAME};
use pegboard::storage::{create_storage, BoardStorage};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum number of cached workspaces to prevent resource exhaustion.
///
/// When this limit is reached, the oldest workspace is evicted from cache.
const MAX_CACHED_WORKSPACES: usize = 32;

/// Global context state for the MCP server.
///
/// Manages workspace contexts and storage instances for multi-workspace support.
pub struct Context {
    /// The current active workspace root.
    current_workspace: Option<PathBuf>,

    /// Per-workspace storage instances (limited to [`MAX_CACHED_WORKSPACES`]).
    storage_cache: HashMap<PathBuf, Arc<RwLock<Box<dyn BoardStorage>>>>,

    /// Per-workspace board file paths (discovered from config).
    board_paths: HashMap<PathBuf, PathBuf>,

    /// Insertion order for FIFO cache eviction.
    cache_order: VecDeque<PathBuf>,
}

impl Context {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_workspace: None,
            storage_cache: HashMap::new(),
            board_paths: HashMap::new(),
            cache_order: VecDeque::new(),
        }
    }

    /// Set the current workspace root.
    ///
    /// This will:
    /// 1. Canonicalize the path (resolves `..`, symlinks, validates existence)
    /// 2. Validate the path is safe (no null bytes, is absolute)
    /// 3. Verify a `.pegboard/` directory exists
    /// 4. Create or retrieve a storage instance
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace path doesn't exist, has no
    /// `.pegboard/` directory, or if storage creation fails.
    pub async fn set_workspace(&mut self, workspace_root: &Path) -> Result<WorkspaceInfo> {
        debug!(path = %workspace_root.display(), "Setting workspace");

        // Canonicalize to resolve symlinks and `..` (prevents path traversal)
        let canonical = workspace_root
            .canonicalize()
            .map_err(|e| Error::WorkspaceNotFound {
                path: workspace_root.display().to_string(),
                source: Some(e),
            })?;

        validate_path(&canonical)?;

        let board_dir = canonical.join(BOARD_DIR_NAME);
        if !board_dir.exists() {
            debug!(path = %board_dir.display(), "No .pegboard directory found");
            return Err(Error::NoBoardDirectory(canonical.display().to_string()));
        }

        // Load config to get storage settings
        let config_path = board_dir.join(CONFIG_FILE_NAME);
        let config = BoardConfig::load(&config_path)
            .await
            .map_err(|e| Error::ConfigLoad {
                path: config_path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(project = %config.default_project, backend = %config.storage.backend, "Loaded config");

        let backend = config.to_backend(&canonical)?;
        let board_path = backend.data_path().map_or_else(
            || canonical.join(&config.storage.data_file),
            Path::to_path_buf,
        );
        debug!(board_path = %board_path.display(), "Board path from backend");

        self.current_workspace = Some(canonical.clone());
        self.board_paths.insert(canonical.clone(), board_path.clone());

        if self.storage_cache.contains_key(&canonical) {
            debug!("Using cached storage instance");
        } else {
            debug!("Creating new storage instance");
            // Evict oldest workspace if cache is full
            while self.storage_cache.len() >= MAX_CACHED_WORKSPACES {
                self.evict_oldest();
            }

            let storage = create_storage(backend).await?;
            self.storage_cache
                .insert(canonical.clone(), Arc::new(RwLock::new(storage)));
            self.cache_order.push_back(canonical.clone());
        }

        Ok(WorkspaceInfo {
            workspace_root: canonical,
            board_path,
        })
    }

    /// Evict the oldest cached workspace to make room for new entries.
    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.cache_order.pop_front() {
            self.storage_cache.remove(&oldest);
            self.board_paths.remove(&oldest);
            tracing::debug!(workspace = %oldest.display(), "Evicted workspace from cache");
        }
    }

    /// Get the current workspace root.
    #[must_use]
    pub fn current_workspace(&self) -> Option<&PathBuf> {
        self.current_workspace.as_ref()
    }

    /// Get the board file path for the current workspace.
    #[must_use]
    pub fn current_board_path(&self) -> Option<&PathBuf> {
        self.current_workspace
            .as_ref()
            .and_then(|ws| self.board_paths.get(ws))
    }

    /// Get storage for the current workspace.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoContext` if no workspace has been set, or
    /// `Error::WorkspaceNotInitialized` if the workspace wasn't initialized
    /// via `set_workspace()`.
    pub fn storage(&self) -> Result<Arc<RwLock<Box<dyn BoardStorage>>>> {
        let workspace = self.current_workspace.as_ref().ok_or(Error::NoContext)?;

        self.storage_cache
            .get(workspace)
            .cloned()
            .ok_or_else(|| Error::WorkspaceNotInitialized(workspace.display().to_string()))
    }

    /// Get storage for a specific workspace, or the current one if not specified.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No context is set and no workspace path is provided
    /// - The workspace path doesn't exist
    /// - The workspace exists but wasn't initialized via `set_workspace()`
    pub fn storage_for(
        &self,
        workspace_root: Option<&Path>,
    ) -> Result<Arc<RwLock<Box<dyn BoardStorage>>>> {
        let workspace = match workspace_root {
            Some(path) => path.canonicalize().map_err(|e| Error::WorkspaceNotFound {
                path: path.display().to_string(),
                source: Some(e),
            })?,
            None => self.current_workspace.clone().ok_or(Error::NoContext)?,
        };

        self.storage_cache
            .get(&workspace)
            .cloned()
            .ok_or_else(|| Error::WorkspaceNotInitialized(workspace.display().to_string()))
    }

    /// Get the configured default project name for the current workspace.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoContext` if no workspace has been set, or a
    /// config error if the config file cannot be read.
    pub async fn default_project(&self) -> Result<String> {
        let workspace = self.current_workspace.as_ref().ok_or(Error::NoContext)?;
        let config_path = workspace.join(BOARD_DIR_NAME).join(CONFIG_FILE_NAME);
        let config = BoardConfig::load(&config_path)
            .await
            .map_err(|e| Error::ConfigLoad {
                path: config_path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(config.default_project)
    }

    /// Discover and set the workspace by walking up from the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no `.pegboard/` directory is found in the path
    /// hierarchy, or if storage creation fails.
    pub async fn discover_and_set_workspace(&mut self, start: &Path) -> Result<WorkspaceInfo> {
        let workspace_root = discover_workspace(start)?;
        self.set_workspace(&workspace_root).await
    }

    /// Get the number of cached workspaces (for testing).
    #[cfg(test)]
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.storage_cache.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    /// The canonical path to the workspace root.
    pub workspace_root: PathBuf,

    /// The path to the board file.
    pub board_path: PathBuf,
}

/// Validate that a path is safe to use as a workspace.
///
/// Canonicalized paths must be absolute, free of null bytes, and free of
/// parent-directory components.
fn validate_path(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Workspace path must be absolute",
        )));
    }

    let path_str = path.to_string_lossy();
    if path_str.contains('\0') {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Workspace path contains invalid characters",
        )));
    }

    for component in path.components() {
        if let std::path::Component::ParentDir = component {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Workspace path contains parent directory references",
            )));
        }
    }

    Ok(())
}

/// Discover a pegboard workspace by walking up from the given directory.
///
/// Returns the canonicalized workspace root (directory containing `.pegboard/`).
///
/// # Errors
///
/// Returns `Error::NoBoardDirectory` if no `.pegboard/` directory is found,
/// or `Error::WorkspaceNotFound` if the path cannot be canonicalized.
pub fn discover_workspace(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let board_dir = current.join(BOARD_DIR_NAME);
        if board_dir.exists() && board_dir.is_dir() {
            // Canonicalize to resolve symlinks (e.g., /var -> /private/var on macOS)
            return current
                .canonicalize()
                .map_err(|e| Error::WorkspaceNotFound {
                    path: current.display().to_string(),
                    source: Some(e),
                });
        }

        if !current.pop() {
            break;
        }
    }

    Err(Error::NoBoardDirectory(start.display().to_string()))
}
