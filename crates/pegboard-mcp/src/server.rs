//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp.

use crate::context::Context;
use crate::models::{
    AddCommentParams, AddDependencyParams, BoardStatusParams, CreateTicketParams,
    FindProjectParams, ListProjectsParams, ListTicketsParams, SetContextParams, ShowTicketParams,
    UpdateTicketStateParams,
};
use crate::tools::Tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{
    handler::server::ServerHandler, tool, tool_handler, tool_router, ErrorData as McpError,
    ServiceExt,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The pegboard MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct PegboardMcpServer {
    /// Shared context for workspace management.
    context: Arc<RwLock<Context>>,
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PegboardMcpServer {
    /// Set the workspace context for subsequent operations.
    #[tool(
        description = "Set the workspace root directory for all subsequent operations. Call this first before using other tools."
    )]
    async fn set_context(
        &self,
        Parameters(params): Parameters<SetContextParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.set_context(&params.workspace_root).await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::json(response)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Get current workspace context information.
    #[tool(description = "Show current workspace context and board file path. Useful for debugging.")]
    async fn where_am_i(&self) -> Result<CallToolResult, McpError> {
        match self.tools.where_am_i().await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::json(response)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Get the board summary.
    #[tool(
        description = "Get a board summary: total ticket count plus breakdowns by workflow state and by project."
    )]
    async fn board_status(
        &self,
        Parameters(params): Parameters<BoardStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .board_status(params.workspace_root.as_deref())
            .await
        {
            Ok(status) => Ok(CallToolResult::success(vec![Content::json(status)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// List all projects.
    #[tool(description = "List all projects on the board with their ids and descriptions.")]
    async fn list_projects(
        &self,
        Parameters(params): Parameters<ListProjectsParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .list_projects(params.workspace_root.as_deref())
            .await
        {
            Ok(projects) => Ok(CallToolResult::success(vec![Content::json(projects)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Find projects by name.
    #[tool(
        description = "Find projects by name. Exact matches win; otherwise returns every project whose name contains the query (case-insensitive)."
    )]
    async fn find_project(
        &self,
        Parameters(params): Parameters<FindProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .find_project(&params.query, params.workspace_root.as_deref())
            .await
        {
            Ok(projects) => Ok(CallToolResult::success(vec![Content::json(projects)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// List tickets with an optional project filter.
    #[tool(
        description = "List tickets with registry references resolved to names. Optionally filter by project name."
    )]
    async fn list_tickets(
        &self,
        Parameters(params): Parameters<ListTicketsParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .list_tickets(params.project.as_deref(), params.workspace_root.as_deref())
            .await
        {
            Ok(tickets) => Ok(CallToolResult::success(vec![Content::json(tickets)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Show detailed information about a specific ticket.
    #[tool(
        description = "Show a ticket's full details including dependencies, dependents, comments, and whether all dependencies are resolved."
    )]
    async fn show_ticket(
        &self,
        Parameters(params): Parameters<ShowTicketParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .show_ticket(params.ticket_id, params.workspace_root.as_deref())
            .await
        {
            Ok((view, comments)) => Ok(CallToolResult::success(vec![Content::json(
                serde_json::json!({ "ticket": view, "comments": comments }),
            )?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Create a new ticket.
    #[tool(
        description = "Create a new ticket (bug, story, task, or spike) with optional priority, initial state, rationale, and acceptance criteria. Defaults: the configured default project, type 'story', state 'backlog'."
    )]
    async fn create_ticket(
        &self,
        Parameters(params): Parameters<CreateTicketParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .create_ticket(
                params.what,
                params.project.as_deref(),
                params.ticket_type.as_deref(),
                params.priority.as_deref(),
                params.state.as_deref(),
                params.why,
                params.acceptance_criteria,
                params.test_steps,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(ticket) => Ok(CallToolResult::success(vec![Content::json(ticket)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Move a ticket to a different workflow state.
    #[tool(
        description = "Move a ticket to a workflow state by name or id. Moving to 'done' stamps the completion date and records a delivery metric; leaving 'done' clears it."
    )]
    async fn update_ticket_state(
        &self,
        Parameters(params): Parameters<UpdateTicketStateParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .update_ticket_state(
                params.ticket_id,
                &params.state,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(ticket) => Ok(CallToolResult::success(vec![Content::json(ticket)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Add a comment to a ticket.
    #[tool(description = "Add a comment to a ticket. Useful for recording progress notes or findings.")]
    async fn add_comment(
        &self,
        Parameters(params): Parameters<AddCommentParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .add_comment(
                params.ticket_id,
                params.content,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(comment) => Ok(CallToolResult::success(vec![Content::json(comment)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Add a dependency between tickets.
    #[tool(
        description = "Record that one ticket depends on another. Self-dependencies and immediate two-ticket cycles are rejected; duplicates are ignored."
    )]
    async fn add_dependency(
        &self,
        Parameters(params): Parameters<AddDependencyParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .add_dependency(
                params.ticket_id,
                params.depends_on,
                params.workspace_root.as_deref(),
            )
            .await
        {
            Ok(message) => Ok(CallToolResult::success(vec![Content::text(message)])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }
}

impl PegboardMcpServer {
    /// Create a new pegboard MCP server.
    #[must_use]
    pub fn new() -> Self {
        let context = Arc::new(RwLock::new(Context::new()));
        let tools = Arc::new(Tools::new(Arc::clone(&context)));

        Self {
            context,
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the context.
    #[must_use]
    pub fn context(&self) -> &Arc<RwLock<Context>> {
        &self.context
    }

    /// Run the server over stdio transport until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to start or the session
    /// ends abnormally.
    pub async fn run(self) -> anyhow::Result<()> {
        let service = self.serve(rmcp::transport::stdio()).await?;
        service.waiting().await?;
        Ok(())
    }
}

impl Default for PegboardMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PegboardMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pegboard-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Pegboard MCP server for task tracking. Call set_context first to set the workspace."
                    .into(),
            ),
        }
    }
}
