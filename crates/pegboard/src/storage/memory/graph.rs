//! Dependency graph operations using petgraph.
//!
//! Free functions over the graph and node map so both the trait
//! implementation and snapshot loading can share them.

use crate::domain::TicketId;
use chrono::{DateTime, Utc};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

pub(super) type DependencyGraph = StableDiGraph<TicketId, DateTime<Utc>>;

/// Whether a direct edge `dependent -> dependency` exists.
///
/// This is deliberately a single-edge lookup, not a reachability query:
/// the guard in `add_dependency` only rejects the immediate reverse edge,
/// so the accepted edge set would change if this walked the graph.
/// A missing node means no edge.
pub(super) fn edge_exists(
    graph: &DependencyGraph,
    node_map: &HashMap<TicketId, NodeIndex>,
    dependent: TicketId,
    dependency: TicketId,
) -> bool {
    match (node_map.get(&dependent), node_map.get(&dependency)) {
        (Some(&from), Some(&to)) => graph.find_edge(from, to).is_some(),
        _ => false,
    }
}

/// Direct dependencies of a ticket: the targets of its outgoing edges.
pub(super) fn direct_dependencies(
    graph: &DependencyGraph,
    node: NodeIndex,
) -> Vec<TicketId> {
    graph
        .edges_directed(node, Direction::Outgoing)
        .map(|edge| graph[edge.target()])
        .collect()
}

/// Direct dependents of a ticket: the sources of its incoming edges.
pub(super) fn direct_dependents(graph: &DependencyGraph, node: NodeIndex) -> Vec<TicketId> {
    graph
        .edges_directed(node, Direction::Incoming)
        .map(|edge| graph[edge.source()])
        .collect()
}
