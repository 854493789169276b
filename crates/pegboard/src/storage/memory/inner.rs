//! Core in-memory board data structures.
//!
//! This module contains the inner board structure that holds all data and
//! is wrapped in `Arc<Mutex<>>` for thread safety. It also owns the two
//! pieces of business logic every mutation path funnels through: state
//! reference resolution and the done-transition (completion stamp plus
//! metric record).

use crate::domain::{
    Attachment, Comment, Metric, PriorityId, Project, ProjectId, StateId, StateRef, Ticket,
    TicketId, TicketPriority, TicketState, TicketType, TypeId,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::{BTreeMap, HashMap};

/// Default workflow states seeded into a fresh board, in display order.
const SEED_STATES: [&str; 4] = ["backlog", "in progress", "review", "done"];

/// Default ticket types seeded into a fresh board.
const SEED_TYPES: [&str; 4] = ["bug", "story", "task", "spike"];

/// Default priorities seeded into a fresh board, lowest first.
const SEED_PRIORITIES: [&str; 4] = ["low", "medium", "high", "critical"];

/// Inner board structure (not thread-safe).
///
/// # Graph representation
///
/// The dependency graph uses petgraph's `StableDiGraph` with edges
/// directed from dependent to dependency. Node weights are ticket ids,
/// edge weights are edge creation times. Every ticket in `self.tickets`
/// has a corresponding entry in `self.node_map`.
pub(crate) struct BoardInner {
    /// Projects indexed by id.
    pub(super) projects: HashMap<ProjectId, Project>,

    /// Tickets indexed by id.
    pub(super) tickets: HashMap<TicketId, Ticket>,

    /// Workflow state registry, in registry order.
    pub(super) states: Vec<TicketState>,

    /// Ticket type registry, in registry order.
    pub(super) types: Vec<TicketType>,

    /// Priority registry, in registry order.
    pub(super) priorities: Vec<TicketPriority>,

    /// Comments indexed by id; BTreeMap keeps iteration in id order.
    pub(super) comments: BTreeMap<i64, Comment>,

    /// Attachment records indexed by id.
    pub(super) attachments: BTreeMap<i64, Attachment>,

    /// Delivery metric records indexed by id.
    pub(super) metrics: BTreeMap<i64, Metric>,

    /// Dependency graph: dependent -> dependency, weighted by creation time.
    pub(super) graph: StableDiGraph<TicketId, DateTime<Utc>>,

    /// Mapping from ticket id to graph node.
    pub(super) node_map: HashMap<TicketId, NodeIndex>,

    /// Id sequences; `next` hands out the stored value and increments.
    pub(super) sequences: Sequences,
}

/// Monotonic id sequences, one per entity kind.
#[derive(Debug, Clone)]
pub(super) struct Sequences {
    pub(super) project: i64,
    pub(super) ticket: i64,
    pub(super) state: i64,
    pub(super) ticket_type: i64,
    pub(super) priority: i64,
    pub(super) comment: i64,
    pub(super) attachment: i64,
    pub(super) metric: i64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            project: 1,
            ticket: 1,
            state: 1,
            ticket_type: 1,
            priority: 1,
            comment: 1,
            attachment: 1,
            metric: 1,
        }
    }
}

/// Hand out the next value of a sequence field.
pub(super) fn next(seq: &mut i64) -> i64 {
    let value = *seq;
    *seq += 1;
    value
}

impl BoardInner {
    /// Create a new board with the default registry seeded.
    pub(crate) fn new() -> Self {
        let mut board = Self::empty();
        board.seed_registry();
        board
    }

    /// Create a board with nothing in it, registry included. Snapshot
    /// loading starts here and seeds only if the file carried no registry.
    pub(super) fn empty() -> Self {
        Self {
            projects: HashMap::new(),
            tickets: HashMap::new(),
            states: Vec::new(),
            types: Vec::new(),
            priorities: Vec::new(),
            comments: BTreeMap::new(),
            attachments: BTreeMap::new(),
            metrics: BTreeMap::new(),
            graph: StableDiGraph::new(),
            node_map: HashMap::new(),
            sequences: Sequences::default(),
        }
    }

    /// Seed any registry table that is still empty.
    pub(super) fn seed_registry(&mut self) {
        if self.states.is_empty() {
            for name in SEED_STATES {
                let id = StateId(next(&mut self.sequences.state));
                self.states.push(TicketState {
                    id,
                    name: name.to_string(),
                });
            }
        }
        if self.types.is_empty() {
            for name in SEED_TYPES {
                let id = TypeId(next(&mut self.sequences.ticket_type));
                self.types.push(TicketType {
                    id,
                    name: name.to_string(),
                });
            }
        }
        if self.priorities.is_empty() {
            for name in SEED_PRIORITIES {
                let id = PriorityId(next(&mut self.sequences.priority));
                self.priorities.push(TicketPriority {
                    id,
                    name: name.to_string(),
                });
            }
        }
    }

    /// Resolve a state reference against the registry.
    ///
    /// Resolution happens before any mutation, so a bad reference leaves
    /// the board untouched.
    pub(super) fn resolve_state(&self, state: &StateRef) -> Result<TicketState> {
        let found = match state {
            StateRef::ById(id) => self.states.iter().find(|s| s.id == *id),
            StateRef::ByName(name) => self.states.iter().find(|s| s.name == *name),
        };
        found
            .cloned()
            .ok_or_else(|| Error::UnknownState(state.to_string()))
    }

    /// Look up a registry state by name.
    pub(super) fn state_named(&self, name: &str) -> Option<&TicketState> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Look up a state's name by id.
    pub(super) fn state_name(&self, id: StateId) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.as_str())
    }

    /// Move a ticket to a resolved state, recording a delivery metric on
    /// the transition into "done".
    ///
    /// The metric is written only when the ticket was not already
    /// completed, so re-asserting "done" neither moves the completion
    /// stamp nor double-counts the delivery. Lead time is the whole
    /// minutes from creation to completion; a completed bug additionally
    /// counts as a failed change with its restoration time equal to the
    /// lead time.
    pub(super) fn transition(&mut self, id: TicketId, state: &TicketState) -> Result<Ticket> {
        let ticket = self
            .tickets
            .get_mut(&id)
            .ok_or(Error::TicketNotFound(id))?;

        let was_completed = ticket.completed_date.is_some();
        ticket.apply_state(state.id, &state.name);
        let ticket = ticket.clone();

        if !was_completed {
            if let Some(completed) = ticket.completed_date {
                let lead_time = (completed - ticket.created_date).num_minutes();
                let is_bug = self
                    .types
                    .iter()
                    .any(|t| t.id == ticket.type_id && t.name == crate::domain::TYPE_BUG);

                let metric_id = next(&mut self.sequences.metric);
                self.metrics.insert(
                    metric_id,
                    Metric {
                        id: metric_id,
                        ticket_id: id,
                        lead_time: Some(lead_time),
                        change_failure: is_bug,
                        deployment_date: Some(completed),
                        restoration_time: is_bug.then_some(lead_time),
                        record_date: Utc::now(),
                    },
                );
            }
        }

        Ok(ticket)
    }

    /// Remove a ticket and everything hanging off it: owned rows and the
    /// graph node (which drops all edges in both directions).
    pub(super) fn remove_ticket(&mut self, id: TicketId) {
        self.tickets.remove(&id);
        self.comments.retain(|_, c| c.ticket_id != id);
        self.attachments.retain(|_, a| a.ticket_id != id);
        self.metrics.retain(|_, m| m.ticket_id != id);
        if let Some(node) = self.node_map.remove(&id) {
            self.graph.remove_node(node);
        }
    }
}
