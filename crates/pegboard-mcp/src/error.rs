//! Error types for the pegboard MCP server.

use thiserror::Error;

/// Errors that can occur in the pegboard MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// No workspace context has been set.
    #[error("No workspace context set. Call set_context first.")]
    NoContext,

    /// The specified workspace was not found or path is invalid.
    #[error("Workspace not found: {path}")]
    WorkspaceNotFound {
        /// The path that was not found.
        path: String,
        /// The underlying IO error, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// Workspace exists but was not initialized via `set_context`.
    #[error("Workspace not initialized: {0}. Call set_context first.")]
    WorkspaceNotInitialized(String),

    /// Failed to discover a pegboard board.
    #[error("No .pegboard directory found in {0} or parent directories")]
    NoBoardDirectory(String),

    /// Failed to load the board configuration.
    #[error("Failed to load config from {path}: {reason}")]
    ConfigLoad {
        /// Path to the config file.
        path: String,
        /// Why loading failed.
        reason: String,
    },

    /// The requested project was not found.
    #[error("No project matching '{0}'")]
    ProjectNotFound(String),

    /// An error from the pegboard storage layer.
    #[error("Storage error: {0}")]
    Storage(#[from] pegboard::error::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MCP protocol error.
    #[error("MCP error: {0}")]
    Mcp(String),
}

/// Result type for pegboard MCP operations.
pub type Result<T> = std::result::Result<T, Error>;
