//! Domain types for the pegboard Kanban tracker.
//!
//! This module contains the core entities: projects, tickets, the registry
//! rows tickets reference (type, priority, state), ticket-owned rows
//! (comments, attachments, metrics), and the dependency edge entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the state newly created tickets default to.
pub const STATE_BACKLOG: &str = "backlog";

/// Name of the distinguished completion state.
pub const STATE_DONE: &str = "done";

/// Name of the state archived tickets occupy.
pub const STATE_ARCHIVED: &str = "archived";

/// Ticket type name that marks a change as a failure when completed.
pub const TYPE_BUG: &str = "bug";

/// Default ticket type assigned by the assistant tool layer.
pub const TYPE_STORY: &str = "story";

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a project.
    ProjectId
);
id_type!(
    /// Unique identifier for a ticket.
    TicketId
);
id_type!(
    /// Unique identifier for a ticket state registry row.
    StateId
);
id_type!(
    /// Unique identifier for a ticket type registry row.
    TypeId
);
id_type!(
    /// Unique identifier for a ticket priority registry row.
    PriorityId
);

/// A workflow state a ticket can occupy (e.g. "backlog", "done").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketState {
    /// Unique identifier.
    pub id: StateId,

    /// Unique state name.
    pub name: String,
}

/// A ticket type (e.g. "bug", "story").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    /// Unique identifier.
    pub id: TypeId,

    /// Unique type name.
    pub name: String,
}

/// A ticket priority level (e.g. "low", "critical").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPriority {
    /// Unique identifier.
    pub id: PriorityId,

    /// Unique priority name.
    pub name: String,
}

/// A project: a named collection of tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier.
    pub id: ProjectId,

    /// Project name.
    pub name: String,

    /// Project description.
    pub description: Option<String>,

    /// Creation timestamp.
    pub created_date: DateTime<Utc>,
}

/// Data for creating a new project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    /// Project name (required, non-empty).
    pub name: String,

    /// Project description.
    pub description: Option<String>,
}

/// Data for updating an existing project.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    /// New name (if updating).
    pub name: Option<String>,

    /// New description (if updating; `Some(None)` clears it).
    pub description: Option<Option<String>>,
}

/// A ticket: a unit of work tracked on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier.
    pub id: TicketId,

    /// Owning project.
    pub project_id: ProjectId,

    /// Ticket type reference.
    pub type_id: TypeId,

    /// Ticket priority reference (optional).
    pub priority_id: Option<PriorityId>,

    /// Current workflow state reference.
    pub state_id: StateId,

    /// What the ticket is about.
    pub what: String,

    /// Why the ticket matters.
    pub why: Option<String>,

    /// Criteria for considering the ticket done.
    pub acceptance_criteria: Option<String>,

    /// Steps to test the ticket's functionality.
    pub test_steps: Option<String>,

    /// Creation timestamp, set once.
    pub created_date: DateTime<Utc>,

    /// Completion timestamp; non-null iff the current state is "done".
    pub completed_date: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Apply a state transition that has already been resolved against the
    /// registry.
    ///
    /// Sets the state field and maintains the completion-timestamp
    /// invariant: entering "done" sets `completed_date` only if it is
    /// currently unset (idempotent re-entry preserves the first completion
    /// time); any other state clears it unconditionally.
    pub fn apply_state(&mut self, state_id: StateId, state_name: &str) {
        self.state_id = state_id;

        if state_name == STATE_DONE {
            if self.completed_date.is_none() {
                self.completed_date = Some(Utc::now());
            }
        } else {
            self.completed_date = None;
        }
    }
}

/// Data for creating a new ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    /// Owning project (must exist).
    pub project_id: ProjectId,

    /// Ticket type reference.
    pub type_id: TypeId,

    /// Ticket priority reference (optional).
    pub priority_id: Option<PriorityId>,

    /// Initial state; defaults to "backlog" when `None`.
    pub state: Option<StateRef>,

    /// What the ticket is about (required, non-empty).
    pub what: String,

    /// Why the ticket matters.
    pub why: Option<String>,

    /// Criteria for considering the ticket done.
    pub acceptance_criteria: Option<String>,

    /// Steps to test the ticket's functionality.
    pub test_steps: Option<String>,
}

/// Data for updating an existing ticket.
///
/// Only fields present are modified. A state change goes through the same
/// transition logic as [`crate::storage::BoardStorage::transition_ticket`].
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    /// New owning project (must exist).
    pub project_id: Option<ProjectId>,

    /// New type reference.
    pub type_id: Option<TypeId>,

    /// New priority reference (`Some(None)` clears it).
    pub priority_id: Option<Option<PriorityId>>,

    /// New state.
    pub state: Option<StateRef>,

    /// New summary.
    pub what: Option<String>,

    /// New rationale.
    pub why: Option<String>,

    /// New acceptance criteria.
    pub acceptance_criteria: Option<String>,

    /// New test steps.
    pub test_steps: Option<String>,
}

/// A state reference at the interface boundary.
///
/// Callers may address a workflow state either by registry id or by exact
/// (case-sensitive) name. Both forms are resolved to a canonical registry
/// row before any mutation; a reference that misses surfaces
/// [`crate::error::Error::UnknownState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateRef {
    /// Address a state by its registry id.
    ById(StateId),

    /// Address a state by exact name.
    ByName(String),
}

impl StateRef {
    /// Parse a raw string into a state reference.
    ///
    /// A value that parses as an integer is treated as an id; anything else
    /// as a name.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => Self::ById(StateId(id)),
            Err(_) => Self::ByName(raw.to_string()),
        }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ById(id) => write!(f, "#{id}"),
            Self::ByName(name) => write!(f, "'{name}'"),
        }
    }
}

/// A directed dependency edge: `dependent_id` requires completion of
/// `dependency_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The ticket that has the dependency.
    pub dependent_id: TicketId,

    /// The ticket being depended upon.
    pub dependency_id: TicketId,

    /// When the edge was created.
    pub created_date: DateTime<Utc>,
}

/// A comment on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier.
    pub id: i64,

    /// Owning ticket.
    pub ticket_id: TicketId,

    /// Comment text.
    pub content: String,

    /// Creation timestamp.
    pub created_date: DateTime<Utc>,

    /// Last-edit timestamp, if the comment was edited.
    pub updated_date: Option<DateTime<Utc>>,
}

/// A file attached to a ticket.
///
/// Only the metadata lives here; upload handling and the file bytes
/// themselves are external concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique identifier.
    pub id: i64,

    /// Owning ticket.
    pub ticket_id: TicketId,

    /// Original filename.
    pub filename: String,

    /// Where the file is stored.
    pub file_path: String,

    /// MIME type.
    pub file_type: String,

    /// Size in bytes.
    pub file_size: i64,

    /// Upload timestamp.
    pub uploaded_date: DateTime<Utc>,
}

/// Data for attaching a file to a ticket.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    /// Original filename.
    pub filename: String,

    /// Where the file is stored.
    pub file_path: String,

    /// MIME type.
    pub file_type: String,

    /// Size in bytes.
    pub file_size: i64,
}

/// A delivery-performance metric record owned by a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// Unique identifier.
    pub id: i64,

    /// Owning ticket.
    pub ticket_id: TicketId,

    /// Minutes from ticket creation to completion.
    pub lead_time: Option<i64>,

    /// Whether the change resulted in a failure.
    pub change_failure: bool,

    /// When the associated change was deployed.
    pub deployment_date: Option<DateTime<Utc>>,

    /// Minutes to restore service after a failure.
    pub restoration_time: Option<i64>,

    /// When the record was written.
    pub record_date: DateTime<Utc>,
}

/// Data for reporting a failure against a deployed ticket.
#[derive(Debug, Clone, Default)]
pub struct FailureReport {
    /// Minutes to restore service, if known.
    pub restoration_time: Option<i64>,

    /// Deployment timestamp; defaults to now for newly created records.
    pub deployment_date: Option<DateTime<Utc>>,
}

/// Lightweight ticket projection used for dependency and dependent lists.
///
/// Bounded on purpose: serializing full ticket payloads here would recurse
/// through the graph without limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    /// Ticket id.
    pub id: TicketId,

    /// Ticket summary.
    pub what: String,

    /// Current state id.
    pub state: StateId,

    /// Current state name, if the registry row exists.
    pub state_name: Option<String>,
}

/// Full outward-facing ticket payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketView {
    /// Ticket id.
    pub id: TicketId,

    /// Owning project.
    pub project_id: ProjectId,

    /// Type id.
    #[serde(rename = "type")]
    pub type_id: TypeId,

    /// Type name, if the registry row exists.
    pub type_name: Option<String>,

    /// Priority id.
    pub priority: Option<PriorityId>,

    /// Priority name, if set and the registry row exists.
    pub priority_name: Option<String>,

    /// State id.
    pub state: StateId,

    /// State name, if the registry row exists.
    pub state_name: Option<String>,

    /// Ticket summary.
    pub what: String,

    /// Rationale.
    pub why: Option<String>,

    /// Acceptance criteria.
    pub acceptance_criteria: Option<String>,

    /// Test steps.
    pub test_steps: Option<String>,

    /// Creation timestamp.
    pub created_date: Option<DateTime<Utc>>,

    /// Completion timestamp.
    pub completed_date: Option<DateTime<Utc>>,

    /// Attachments owned by this ticket.
    pub attachments: Vec<Attachment>,

    /// Tickets this one requires.
    pub dependencies: Vec<TicketRef>,

    /// Tickets that require this one.
    pub dependents: Vec<TicketRef>,

    /// Whether every direct dependency is in the "done" state.
    pub all_dependencies_resolved: bool,
}

/// Per-state ticket count in a board summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCount {
    /// State name.
    pub state: String,

    /// Number of tickets currently in this state.
    pub count: usize,
}

/// Board-wide summary: total tickets plus counts per registry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStatus {
    /// Total number of tickets on the board.
    pub total_tickets: usize,

    /// Ticket counts per state, in registry order.
    pub by_state: Vec<StateCount>,

    /// Ticket counts per project.
    pub by_project: Vec<ProjectCount>,
}

/// Per-project ticket count in a board summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCount {
    /// Project id.
    pub project_id: ProjectId,

    /// Project name.
    pub name: String,

    /// Number of tickets in the project.
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_in(state_id: StateId) -> Ticket {
        Ticket {
            id: TicketId(1),
            project_id: ProjectId(1),
            type_id: TypeId(2),
            priority_id: None,
            state_id,
            what: "Test ticket".to_string(),
            why: None,
            acceptance_criteria: None,
            test_steps: None,
            created_date: Utc::now(),
            completed_date: None,
        }
    }

    #[test]
    fn apply_state_into_done_sets_completed() {
        let mut ticket = ticket_in(StateId(1));
        assert!(ticket.completed_date.is_none());

        ticket.apply_state(StateId(4), STATE_DONE);
        assert_eq!(ticket.state_id, StateId(4));
        assert!(ticket.completed_date.is_some());
    }

    #[test]
    fn apply_state_done_reentry_preserves_first_completion() {
        let mut ticket = ticket_in(StateId(1));
        ticket.apply_state(StateId(4), STATE_DONE);
        let first = ticket.completed_date;

        ticket.apply_state(StateId(4), STATE_DONE);
        assert_eq!(ticket.completed_date, first);
    }

    #[test]
    fn apply_state_away_from_done_clears_completed() {
        let mut ticket = ticket_in(StateId(1));
        ticket.apply_state(StateId(4), STATE_DONE);
        assert!(ticket.completed_date.is_some());

        ticket.apply_state(StateId(2), "in progress");
        assert!(ticket.completed_date.is_none());
    }

    #[test]
    fn apply_state_unknown_name_clears_completed() {
        // An id that resolves to a non-"done" name behaves like any other
        // state for completion purposes.
        let mut ticket = ticket_in(StateId(1));
        ticket.apply_state(StateId(4), STATE_DONE);
        ticket.apply_state(StateId(99), "someday");
        assert!(ticket.completed_date.is_none());
    }

    #[test]
    fn state_ref_parse() {
        assert_eq!(StateRef::parse("3"), StateRef::ById(StateId(3)));
        assert_eq!(
            StateRef::parse("in progress"),
            StateRef::ByName("in progress".to_string())
        );
        assert_eq!(StateRef::parse(" 12 "), StateRef::ById(StateId(12)));
    }

    #[test]
    fn ticket_serialization_round_trip() {
        let ticket = ticket_in(StateId(2));
        let json = serde_json::to_string(&ticket).unwrap();
        let back: Ticket = serde_json::from_str(&json).unwrap();
        assert_eq!(ticket, back);
    }
}
