//! Error types for pegboard operations.

use crate::domain::{ProjectId, TicketId};
use std::io;
use thiserror::Error;

/// The error type for pegboard operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization or parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Project not found.
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// Ticket not found.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// Comment not found.
    #[error("Comment not found: {0}")]
    CommentNotFound(i64),

    /// Attachment not found.
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(i64),

    /// A state reference did not resolve against the registry.
    #[error("Invalid state: '{0}'")]
    UnknownState(String),

    /// A required field was missing or empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A ticket cannot depend on itself.
    #[error("Ticket {0} cannot depend on itself")]
    SelfDependency(TicketId),

    /// Adding the dependency would create a circular dependency.
    #[error("Adding dependency {dependent} -> {dependency} would create a circular dependency")]
    CircularDependency {
        /// The ticket that would gain the dependency.
        dependent: TicketId,
        /// The ticket being depended upon.
        dependency: TicketId,
    },
}

/// A specialized Result type for pegboard operations.
pub type Result<T> = std::result::Result<T, Error>;
