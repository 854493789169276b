//! MCP tool implementations.
//!
//! This module contains the implementations for all MCP tools exposed by
//! the server. Mutating tools persist through `save()`; a failed save
//! triggers a `reload()` so the cached board never drifts ahead of disk.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::models::{resolve_ticket, McpTicket, SetContextResponse, WhereAmIResponse};
use pegboard::domain::{
    BoardStatus, Comment, NewTicket, Project, StateRef, Ticket, TicketId, TicketView,
    TYPE_STORY,
};
use pegboard::storage::BoardStorage;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tool implementations for the pegboard MCP server.
pub struct Tools {
    context: Arc<RwLock<Context>>,
}

impl Tools {
    /// Create a new Tools instance with the given context.
    pub fn new(context: Arc<RwLock<Context>>) -> Self {
        Self { context }
    }

    /// Set the workspace context.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace path is invalid or has no
    /// `.pegboard/` directory.
    pub async fn set_context(&self, workspace_root: &str) -> Result<SetContextResponse> {
        let path = Path::new(workspace_root);
        let mut context = self.context.write().await;
        let info = context.set_workspace(path).await?;

        Ok(SetContextResponse {
            workspace_root: info.workspace_root.display().to_string(),
            board_path: info.board_path.display().to_string(),
            message: "Context set successfully".to_string(),
        })
    }

    /// Get current workspace information.
    ///
    /// # Errors
    ///
    /// Does not currently return errors; `Result` for API consistency.
    pub async fn where_am_i(&self) -> Result<WhereAmIResponse> {
        let context = self.context.read().await;

        match context.current_workspace() {
            Some(workspace) => Ok(WhereAmIResponse {
                workspace_root: Some(workspace.display().to_string()),
                board_path: context.current_board_path().map(|p| p.display().to_string()),
                context_set: true,
            }),
            None => Ok(WhereAmIResponse {
                workspace_root: None,
                board_path: None,
                context_set: false,
            }),
        }
    }

    /// Get the board summary (ticket counts by state and by project).
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or storage operations fail.
    pub async fn board_status(&self, workspace_root: Option<&str>) -> Result<BoardStatus> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        Ok(storage.board_status().await?)
    }

    /// List all projects on the board.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or storage operations fail.
    pub async fn list_projects(&self, workspace_root: Option<&str>) -> Result<Vec<Project>> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        Ok(storage.list_projects().await?)
    }

    /// Find projects by name.
    ///
    /// An exact match wins; otherwise every project whose name contains the
    /// query (case-insensitive) is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, no project matches, or
    /// storage operations fail.
    pub async fn find_project(
        &self,
        query: &str,
        workspace_root: Option<&str>,
    ) -> Result<Vec<Project>> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        let projects = storage.list_projects().await?;

        if let Some(exact) = projects.iter().find(|p| p.name == query) {
            return Ok(vec![exact.clone()]);
        }

        let needle = query.to_lowercase();
        let matches: Vec<Project> = projects
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect();

        if matches.is_empty() {
            return Err(Error::ProjectNotFound(query.to_string()));
        }
        Ok(matches)
    }

    /// List tickets, optionally filtered to a single project by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the project filter matches
    /// nothing, or storage operations fail.
    pub async fn list_tickets(
        &self,
        project: Option<&str>,
        workspace_root: Option<&str>,
    ) -> Result<Vec<McpTicket>> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        let filter = match project {
            Some(name) => Some(project_named(storage.as_ref(), name).await?.id),
            None => None,
        };

        let tickets = storage.list_tickets(filter).await?;
        resolve_all(storage.as_ref(), tickets).await
    }

    /// Show a ticket with its dependencies, dependents, comments, and
    /// resolution status.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the ticket doesn't exist, or
    /// storage operations fail.
    pub async fn show_ticket(
        &self,
        ticket_id: i64,
        workspace_root: Option<&str>,
    ) -> Result<(TicketView, Vec<Comment>)> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let storage = storage.read().await;

        let view = storage.ticket_view(TicketId(ticket_id)).await?;
        let comments = storage.comments_for(TicketId(ticket_id)).await?;
        Ok((view, comments))
    }

    /// Create a new ticket.
    ///
    /// The project defaults to the board's configured default project and
    /// the type to "story"; assistants usually describe feature work.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, validation fails, or storage
    /// operations fail.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_ticket(
        &self,
        what: String,
        project: Option<&str>,
        ticket_type: Option<&str>,
        priority: Option<&str>,
        state: Option<&str>,
        why: Option<String>,
        acceptance_criteria: Option<String>,
        test_steps: Option<String>,
        workspace_root: Option<&str>,
    ) -> Result<McpTicket> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;

        let default_project;
        let project_name = match project {
            Some(name) => name,
            None => {
                default_project = context.default_project().await?;
                &default_project
            }
        };

        let mut storage = storage.write().await;

        let project_id = project_named(storage.as_ref(), project_name).await?.id;
        let type_name = ticket_type.unwrap_or(TYPE_STORY);
        let type_id = storage
            .types()
            .await?
            .into_iter()
            .find(|t| t.name == type_name)
            .ok_or_else(|| Error::Mcp(format!("Unknown ticket type '{type_name}'")))?
            .id;
        let priority_id = match priority {
            Some(name) => Some(
                storage
                    .priorities()
                    .await?
                    .into_iter()
                    .find(|p| p.name == name)
                    .ok_or_else(|| Error::Mcp(format!("Unknown priority '{name}'")))?
                    .id,
            ),
            None => None,
        };

        let ticket = storage
            .create_ticket(NewTicket {
                project_id,
                type_id,
                priority_id,
                state: state.map(StateRef::parse),
                what,
                why,
                acceptance_criteria,
                test_steps,
            })
            .await?;
        persist(storage.as_mut()).await?;

        let resolved = resolve_all(storage.as_ref(), vec![ticket]).await?;
        resolved
            .into_iter()
            .next()
            .ok_or_else(|| Error::Mcp("Created ticket vanished during resolution".to_string()))
    }

    /// Move a ticket to a different workflow state.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the ticket or state doesn't
    /// exist, or storage operations fail.
    pub async fn update_ticket_state(
        &self,
        ticket_id: i64,
        state: &str,
        workspace_root: Option<&str>,
    ) -> Result<McpTicket> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let ticket = storage
            .transition_ticket(TicketId(ticket_id), StateRef::parse(state))
            .await?;
        persist(storage.as_mut()).await?;

        let resolved = resolve_all(storage.as_ref(), vec![ticket]).await?;
        resolved
            .into_iter()
            .next()
            .ok_or_else(|| Error::Mcp("Updated ticket vanished during resolution".to_string()))
    }

    /// Add a comment to a ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the ticket doesn't exist,
    /// the content is empty, or storage operations fail.
    pub async fn add_comment(
        &self,
        ticket_id: i64,
        content: String,
        workspace_root: Option<&str>,
    ) -> Result<Comment> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        let comment = storage.add_comment(TicketId(ticket_id), content).await?;
        persist(storage.as_mut()).await?;
        Ok(comment)
    }

    /// Record that one ticket depends on another.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, either ticket doesn't exist,
    /// the edge would be a self-loop or an immediate cycle, or storage
    /// operations fail.
    pub async fn add_dependency(
        &self,
        ticket_id: i64,
        depends_on: i64,
        workspace_root: Option<&str>,
    ) -> Result<String> {
        let context = self.context.read().await;
        let storage = context.storage_for(workspace_root.map(Path::new))?;
        let mut storage = storage.write().await;

        storage
            .add_dependency(TicketId(ticket_id), TicketId(depends_on))
            .await?;
        persist(storage.as_mut()).await?;

        Ok(format!("Ticket #{ticket_id} now depends on #{depends_on}"))
    }
}

/// Save the board; on failure, reload from disk before surfacing the error.
async fn persist(storage: &mut dyn BoardStorage) -> Result<()> {
    if let Err(err) = storage.save().await {
        storage.reload().await?;
        return Err(err.into());
    }
    Ok(())
}

/// Look up a project by exact name.
async fn project_named(storage: &dyn BoardStorage, name: &str) -> Result<Project> {
    storage
        .list_projects()
        .await?
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| Error::ProjectNotFound(name.to_string()))
}

/// Resolve a batch of tickets against the registry tables.
async fn resolve_all(storage: &dyn BoardStorage, tickets: Vec<Ticket>) -> Result<Vec<McpTicket>> {
    let projects = storage.list_projects().await?;
    let types = storage.types().await?;
    let priorities = storage.priorities().await?;
    let states = storage.states().await?;

    Ok(tickets
        .into_iter()
        .map(|t| resolve_ticket(t, &projects, &types, &priorities, &states))
        .collect())
}
