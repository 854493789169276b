//! MCP server for pegboard task tracking.
//!
//! This crate provides an MCP (Model Context Protocol) server that exposes
//! pegboard's board to AI assistants.
//!
//! # Architecture
//!
//! The server uses the `rmcp` crate for MCP protocol handling and directly
//! wraps the `BoardStorage` trait from the pegboard crate. Mutating tools
//! save the board after each change; a failed save reloads from disk so
//! the cached board never drifts ahead of the file.
//!
//! # Tools
//!
//! ## Context Management
//! - `set_context` - Set the workspace root for all operations
//! - `where_am_i` - Show current workspace context
//!
//! ## Board Queries
//! - `board_status` - Ticket counts by state and project
//! - `list_projects` - List all projects
//! - `find_project` - Find projects by name (exact, then fuzzy)
//! - `list_tickets` - List tickets, optionally by project
//! - `show_ticket` - Ticket details with dependencies and comments
//!
//! ## Board Modification
//! - `create_ticket` - Create a new ticket
//! - `update_ticket_state` - Move a ticket through the workflow
//! - `add_comment` - Comment on a ticket
//! - `add_dependency` - Link tickets in the dependency graph

pub mod context;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::PegboardMcpServer;
