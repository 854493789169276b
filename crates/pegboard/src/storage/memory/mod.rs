//! In-memory storage backend using HashMap and petgraph.
//!
//! All board data is held in RAM and lost when the process exits unless
//! paired with the JSONL snapshot layer in [`snapshot`]. The plain
//! in-memory board is suitable for testing and short-lived sessions; the
//! CLI and assistant server always wrap it with snapshot persistence.
//!
//! # Architecture
//!
//! - `HashMap<ProjectId, Project>` / `HashMap<TicketId, Ticket>` for O(1)
//!   entity lookups
//! - `BTreeMap<i64, _>` for ticket-owned rows (comments, attachments,
//!   metric records), so iteration order is id order
//! - `petgraph::stable_graph::StableDiGraph` for the dependency relation,
//!   with a `HashMap<TicketId, NodeIndex>` node map
//! - Monotonic integer sequences for id assignment
//!
//! `StableDiGraph` rather than `DiGraph`: deleting a ticket removes its
//! node, and stable indices keep the node map valid without rebuilding it.
//!
//! ## Edge direction convention
//!
//! Edges point from **dependent to dependency**: source -> target means
//! the source ticket requires completion of the target. Edge weights carry
//! the edge creation time so snapshots round-trip it.
//!
//! # Thread safety
//!
//! The board is wrapped in `Arc<Mutex<BoardInner>>`; every trait method
//! acquires the lock, so concurrent tasks see a consistent board.

mod graph;
mod inner;
mod snapshot;
mod trait_impl;

use crate::storage::BoardStorage;
use inner::BoardInner;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use snapshot::{load_snapshot, save_snapshot, LoadWarning, Snapshot};

/// Thread-safe in-memory board.
pub(crate) type Board = Arc<Mutex<BoardInner>>;

/// Create a new in-memory board with a seeded registry.
///
/// The registry starts with the default workflow states ("backlog",
/// "in progress", "review", "done"), ticket types ("bug", "story", "task",
/// "spike"), and priorities ("low", "medium", "high", "critical").
pub fn new_board() -> Box<dyn BoardStorage> {
    Box::new(Arc::new(Mutex::new(BoardInner::new())))
}
