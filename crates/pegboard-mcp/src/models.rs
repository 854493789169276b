//! MCP parameter and response models.
//!
//! Parameter structs derive `JsonSchema` so rmcp can publish tool input
//! schemas; response structs wrap pegboard domain types for MCP transport.

use pegboard::domain::{Project, Ticket};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Tool Parameters
// ============================================================================

/// Parameters for the `set_context` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetContextParams {
    /// Absolute path to the workspace root (the directory containing `.pegboard/`).
    pub workspace_root: String,
}

/// Parameters for the `board_status` tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct BoardStatusParams {
    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `list_projects` tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListProjectsParams {
    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `find_project` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindProjectParams {
    /// Project name or fragment to search for.
    pub query: String,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `list_tickets` tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTicketsParams {
    /// Project name to filter by; lists all tickets when omitted.
    pub project: Option<String>,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `show_ticket` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ShowTicketParams {
    /// Numeric ticket id.
    pub ticket_id: i64,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `create_ticket` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTicketParams {
    /// What the ticket is about (required).
    pub what: String,

    /// Project name; defaults to the board's configured default project.
    pub project: Option<String>,

    /// Ticket type name (bug, story, task, spike); defaults to "story".
    pub ticket_type: Option<String>,

    /// Priority name (low, medium, high, critical).
    pub priority: Option<String>,

    /// Initial state by name or id; defaults to "backlog".
    pub state: Option<String>,

    /// Why the ticket matters.
    pub why: Option<String>,

    /// Acceptance criteria.
    pub acceptance_criteria: Option<String>,

    /// Test steps.
    pub test_steps: Option<String>,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `update_ticket_state` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateTicketStateParams {
    /// Numeric ticket id.
    pub ticket_id: i64,

    /// Target state, by name (e.g. "done") or numeric id.
    pub state: String,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `add_comment` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddCommentParams {
    /// Numeric ticket id.
    pub ticket_id: i64,

    /// Comment text (required, non-empty).
    pub content: String,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

/// Parameters for the `add_dependency` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddDependencyParams {
    /// The ticket that is blocked.
    pub ticket_id: i64,

    /// The ticket it depends on.
    pub depends_on: i64,

    /// Workspace root override; uses the current context when omitted.
    pub workspace_root: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Response from the `set_context` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetContextResponse {
    /// The workspace root that was set.
    pub workspace_root: String,

    /// The path to the board file.
    pub board_path: String,

    /// Status message.
    pub message: String,
}

/// Response from the `where_am_i` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhereAmIResponse {
    /// The current workspace root, if set.
    pub workspace_root: Option<String>,

    /// The current board file path, if set.
    pub board_path: Option<String>,

    /// Whether a context is currently set.
    pub context_set: bool,
}

/// Ticket representation for MCP responses.
///
/// Registry references are resolved to names so assistants never have to
/// join against the registry tables themselves.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpTicket {
    /// Numeric ticket id.
    pub id: i64,

    /// Owning project name.
    pub project: String,

    /// Ticket type name.
    pub ticket_type: String,

    /// Priority name, if set.
    pub priority: Option<String>,

    /// Current state name.
    pub state: String,

    /// Ticket summary.
    pub what: String,

    /// Rationale.
    pub why: Option<String>,

    /// Acceptance criteria.
    pub acceptance_criteria: Option<String>,

    /// Test steps.
    pub test_steps: Option<String>,

    /// Creation timestamp (ISO 8601).
    pub created_date: String,

    /// Completion timestamp (ISO 8601), if completed.
    pub completed_date: Option<String>,
}

/// Build an [`McpTicket`] by resolving registry references against the
/// board's live tables.
pub(crate) fn resolve_ticket(
    ticket: Ticket,
    projects: &[Project],
    types: &[pegboard::domain::TicketType],
    priorities: &[pegboard::domain::TicketPriority],
    states: &[pegboard::domain::TicketState],
) -> McpTicket {
    let name_of = |lookup: Option<&str>| lookup.unwrap_or("?").to_string();

    McpTicket {
        id: ticket.id.0,
        project: name_of(
            projects
                .iter()
                .find(|p| p.id == ticket.project_id)
                .map(|p| p.name.as_str()),
        ),
        ticket_type: name_of(
            types
                .iter()
                .find(|t| t.id == ticket.type_id)
                .map(|t| t.name.as_str()),
        ),
        priority: ticket.priority_id.and_then(|id| {
            priorities
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.clone())
        }),
        state: name_of(
            states
                .iter()
                .find(|s| s.id == ticket.state_id)
                .map(|s| s.name.as_str()),
        ),
        what: ticket.what,
        why: ticket.why,
        acceptance_criteria: ticket.acceptance_criteria,
        test_steps: ticket.test_steps,
        created_date: ticket.created_date.to_rfc3339(),
        completed_date: ticket.completed_date.map(|t| t.to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pegboard::domain::{
        PriorityId, ProjectId, StateId, TicketId, TicketPriority, TicketState, TicketType, TypeId,
    };

    #[test]
    fn resolve_ticket_maps_registry_names() {
        let projects = vec![Project {
            id: ProjectId(1),
            name: "api".to_string(),
            description: None,
            created_date: Utc::now(),
        }];
        let types = vec![TicketType {
            id: TypeId(1),
            name: "bug".to_string(),
        }];
        let priorities = vec![TicketPriority {
            id: PriorityId(4),
            name: "critical".to_string(),
        }];
        let states = vec![TicketState {
            id: StateId(2),
            name: "in progress".to_string(),
        }];

        let ticket = Ticket {
            id: TicketId(7),
            project_id: ProjectId(1),
            type_id: TypeId(1),
            priority_id: Some(PriorityId(4)),
            state_id: StateId(2),
            what: "Fix login redirect".to_string(),
            why: None,
            acceptance_criteria: None,
            test_steps: None,
            created_date: Utc::now(),
            completed_date: None,
        };

        let resolved = resolve_ticket(ticket, &projects, &types, &priorities, &states);
        assert_eq!(resolved.id, 7);
        assert_eq!(resolved.project, "api");
        assert_eq!(resolved.ticket_type, "bug");
        assert_eq!(resolved.priority.as_deref(), Some("critical"));
        assert_eq!(resolved.state, "in progress");
        assert!(resolved.completed_date.is_none());
    }

    #[test]
    fn resolve_ticket_tolerates_missing_registry_rows() {
        let ticket = Ticket {
            id: TicketId(7),
            project_id: ProjectId(9),
            type_id: TypeId(9),
            priority_id: None,
            state_id: StateId(9),
            what: "Orphaned references".to_string(),
            why: None,
            acceptance_criteria: None,
            test_steps: None,
            created_date: Utc::now(),
            completed_date: None,
        };

        let resolved = resolve_ticket(ticket, &[], &[], &[], &[]);
        assert_eq!(resolved.project, "?");
        assert_eq!(resolved.state, "?");
        assert!(resolved.priority.is_none());
    }
}
