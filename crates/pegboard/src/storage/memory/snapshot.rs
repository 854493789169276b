//! JSONL snapshot persistence for the in-memory board.
//!
//! A snapshot file is JSON Lines: one record per line, each tagged with a
//! `record` field naming its kind. A save writes the whole board in a
//! stable order (registry first, then projects, tickets, dependency edges,
//! and ticket-owned rows) to a temp file and renames it into place, so a
//! crash mid-write leaves the previous snapshot intact.
//!
//! Loading is resilient: malformed lines and rows that reference missing
//! entities are skipped with a warning rather than failing the load.

use super::graph::edge_exists;
use super::inner::BoardInner;
use crate::domain::{
    Attachment, Comment, DependencyEdge, Metric, Project, ProjectId, Ticket, TicketId,
    TicketPriority, TicketState, TicketType,
};
use crate::error::Result;
use crate::storage::BoardStorage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

/// Full board contents, as exported for snapshotting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Workflow state registry.
    pub states: Vec<TicketState>,

    /// Ticket type registry.
    pub types: Vec<TicketType>,

    /// Priority registry.
    pub priorities: Vec<TicketPriority>,

    /// All projects, ordered by id.
    pub projects: Vec<Project>,

    /// All tickets, ordered by id.
    pub tickets: Vec<Ticket>,

    /// All dependency edges, ordered by (dependent, dependency).
    pub dependencies: Vec<DependencyEdge>,

    /// All comments, ordered by id.
    pub comments: Vec<Comment>,

    /// All attachment records, ordered by id.
    pub attachments: Vec<Attachment>,

    /// All delivery metric records, ordered by id.
    pub metrics: Vec<Metric>,
}

/// One line of a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record {
    State(TicketState),
    Type(TicketType),
    Priority(TicketPriority),
    Project(Project),
    Ticket(Ticket),
    Dependency(DependencyEdge),
    Comment(Comment),
    Attachment(Attachment),
    Metric(Metric),
}

/// Non-fatal problems encountered while loading a snapshot file.
///
/// The load continues past each of these; the problematic line or row is
/// skipped. Callers should log them, since they indicate a hand-edited or
/// partially written file.
#[derive(Debug, Clone)]
pub enum LoadWarning {
    /// A line that is not valid JSON or not a known record kind.
    MalformedLine {
        /// 1-based line number in the file.
        line_number: usize,
        /// The parse error.
        error: String,
    },

    /// A ticket whose owning project is not in the file.
    OrphanedTicket {
        /// The skipped ticket.
        ticket: TicketId,
        /// The missing project.
        project: ProjectId,
    },

    /// A dependency edge with a missing endpoint.
    OrphanedEdge {
        /// The edge's dependent ticket.
        dependent: TicketId,
        /// The edge's dependency ticket.
        dependency: TicketId,
    },

    /// A dependency edge from a ticket to itself.
    SelfLoopEdge {
        /// The ticket on both ends.
        ticket: TicketId,
    },

    /// A dependency edge that appears more than once.
    DuplicateEdge {
        /// The edge's dependent ticket.
        dependent: TicketId,
        /// The edge's dependency ticket.
        dependency: TicketId,
    },

    /// A comment, attachment, or metric whose ticket is not in the file.
    OrphanedRow {
        /// Record kind ("comment", "attachment", or "metric").
        kind: &'static str,
        /// The skipped row's id.
        id: i64,
        /// The missing ticket.
        ticket: TicketId,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine { line_number, error } => {
                write!(f, "skipped malformed line {line_number}: {error}")
            }
            Self::OrphanedTicket { ticket, project } => {
                write!(f, "skipped ticket {ticket}: project {project} not in file")
            }
            Self::OrphanedEdge {
                dependent,
                dependency,
            } => {
                write!(
                    f,
                    "skipped dependency {dependent} -> {dependency}: missing endpoint"
                )
            }
            Self::SelfLoopEdge { ticket } => {
                write!(f, "skipped self-dependency on ticket {ticket}")
            }
            Self::DuplicateEdge {
                dependent,
                dependency,
            } => {
                write!(f, "skipped duplicate dependency {dependent} -> {dependency}")
            }
            Self::OrphanedRow { kind, id, ticket } => {
                write!(f, "skipped {kind} {id}: ticket {ticket} not in file")
            }
        }
    }
}

/// Load a board from a snapshot file.
///
/// Registry tables absent from the file are seeded with the defaults, so
/// a snapshot written by an older or partial tool still yields a usable
/// board. Id sequences resume past the highest id seen per entity kind.
///
/// Returns the board plus all non-fatal warnings.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read. Individual bad lines
/// never fail the load.
pub async fn load_snapshot(path: &Path) -> Result<(Box<dyn BoardStorage>, Vec<LoadWarning>)> {
    let contents = tokio::fs::read_to_string(path).await?;

    let mut warnings = Vec::new();
    let mut snapshot = Snapshot::default();

    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(Record::State(s)) => snapshot.states.push(s),
            Ok(Record::Type(t)) => snapshot.types.push(t),
            Ok(Record::Priority(p)) => snapshot.priorities.push(p),
            Ok(Record::Project(p)) => snapshot.projects.push(p),
            Ok(Record::Ticket(t)) => snapshot.tickets.push(t),
            Ok(Record::Dependency(d)) => snapshot.dependencies.push(d),
            Ok(Record::Comment(c)) => snapshot.comments.push(c),
            Ok(Record::Attachment(a)) => snapshot.attachments.push(a),
            Ok(Record::Metric(m)) => snapshot.metrics.push(m),
            Err(error) => warnings.push(LoadWarning::MalformedLine {
                line_number: index + 1,
                error: error.to_string(),
            }),
        }
    }

    let board = build_board(snapshot, &mut warnings);
    Ok((Box::new(Arc::new(Mutex::new(board))), warnings))
}

fn build_board(snapshot: Snapshot, warnings: &mut Vec<LoadWarning>) -> BoardInner {
    let mut board = BoardInner::empty();

    // Registry first: duplicate ids are dropped silently, later rows lose.
    for state in snapshot.states {
        if !board.states.iter().any(|s| s.id == state.id) {
            board.states.push(state);
        }
    }
    for ty in snapshot.types {
        if !board.types.iter().any(|t| t.id == ty.id) {
            board.types.push(ty);
        }
    }
    for priority in snapshot.priorities {
        if !board.priorities.iter().any(|p| p.id == priority.id) {
            board.priorities.push(priority);
        }
    }
    board.sequences.state = next_after(board.states.iter().map(|s| s.id.0));
    board.sequences.ticket_type = next_after(board.types.iter().map(|t| t.id.0));
    board.sequences.priority = next_after(board.priorities.iter().map(|p| p.id.0));
    board.seed_registry();

    for project in snapshot.projects {
        board.projects.insert(project.id, project);
    }

    for ticket in snapshot.tickets {
        if !board.projects.contains_key(&ticket.project_id) {
            warnings.push(LoadWarning::OrphanedTicket {
                ticket: ticket.id,
                project: ticket.project_id,
            });
            continue;
        }
        let node = board.graph.add_node(ticket.id);
        board.node_map.insert(ticket.id, node);
        board.tickets.insert(ticket.id, ticket);
    }

    for edge in snapshot.dependencies {
        if edge.dependent_id == edge.dependency_id {
            warnings.push(LoadWarning::SelfLoopEdge {
                ticket: edge.dependent_id,
            });
            continue;
        }
        let (Some(&from), Some(&to)) = (
            board.node_map.get(&edge.dependent_id),
            board.node_map.get(&edge.dependency_id),
        ) else {
            warnings.push(LoadWarning::OrphanedEdge {
                dependent: edge.dependent_id,
                dependency: edge.dependency_id,
            });
            continue;
        };
        if edge_exists(&board.graph, &board.node_map, edge.dependent_id, edge.dependency_id) {
            warnings.push(LoadWarning::DuplicateEdge {
                dependent: edge.dependent_id,
                dependency: edge.dependency_id,
            });
            continue;
        }
        board.graph.add_edge(from, to, edge.created_date);
    }

    for comment in snapshot.comments {
        if !board.tickets.contains_key(&comment.ticket_id) {
            warnings.push(LoadWarning::OrphanedRow {
                kind: "comment",
                id: comment.id,
                ticket: comment.ticket_id,
            });
            continue;
        }
        board.comments.insert(comment.id, comment);
    }
    for attachment in snapshot.attachments {
        if !board.tickets.contains_key(&attachment.ticket_id) {
            warnings.push(LoadWarning::OrphanedRow {
                kind: "attachment",
                id: attachment.id,
                ticket: attachment.ticket_id,
            });
            continue;
        }
        board.attachments.insert(attachment.id, attachment);
    }
    for metric in snapshot.metrics {
        if !board.tickets.contains_key(&metric.ticket_id) {
            warnings.push(LoadWarning::OrphanedRow {
                kind: "metric",
                id: metric.id,
                ticket: metric.ticket_id,
            });
            continue;
        }
        board.metrics.insert(metric.id, metric);
    }

    board.sequences.project = next_after(board.projects.keys().map(|p| p.0));
    board.sequences.ticket = next_after(board.tickets.keys().map(|t| t.0));
    board.sequences.comment = next_after(board.comments.keys().copied());
    board.sequences.attachment = next_after(board.attachments.keys().copied());
    board.sequences.metric = next_after(board.metrics.keys().copied());

    board
}

fn next_after(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

/// Save a board to a snapshot file with an atomic write.
///
/// Writes every record to `<path>.tmp`, then renames over `path`. The
/// rename is atomic on POSIX filesystems, so an interrupted save leaves
/// the previous snapshot untouched.
///
/// # Errors
///
/// Returns `Error::Io` on file errors and `Error::Json` if serialization
/// fails.
pub async fn save_snapshot(storage: &dyn BoardStorage, path: &Path) -> Result<()> {
    let snapshot = storage.export().await?;

    let mut records: Vec<Record> = Vec::new();
    records.extend(snapshot.states.into_iter().map(Record::State));
    records.extend(snapshot.types.into_iter().map(Record::Type));
    records.extend(snapshot.priorities.into_iter().map(Record::Priority));
    records.extend(snapshot.projects.into_iter().map(Record::Project));
    records.extend(snapshot.tickets.into_iter().map(Record::Ticket));
    records.extend(snapshot.dependencies.into_iter().map(Record::Dependency));
    records.extend(snapshot.comments.into_iter().map(Record::Comment));
    records.extend(snapshot.attachments.into_iter().map(Record::Attachment));
    records.extend(snapshot.metrics.into_iter().map(Record::Metric));

    let temp_path = path.with_extension("tmp");
    let file = File::create(&temp_path).await?;
    let mut writer = BufWriter::new(file);

    for record in &records {
        let json = serde_json::to_string(record)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.flush().await?;
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn records_carry_their_kind_tag() {
        let record = Record::State(TicketState {
            id: crate::domain::StateId(1),
            name: "backlog".to_string(),
        });
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"record\":\"state\""));

        let back: Record = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Record::State(s) if s.name == "backlog"));
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped_with_warnings() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("board.jsonl");

        let project = Project {
            id: ProjectId(1),
            name: "default".to_string(),
            description: None,
            created_date: Utc::now(),
        };
        let good = serde_json::to_string(&Record::Project(project)).unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n{{\"record\":\"unknown\"}}\n")).unwrap();

        let (storage, warnings) = load_snapshot(&path).await.unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], LoadWarning::MalformedLine { line_number: 2, .. }));
        assert_eq!(storage.list_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn orphaned_rows_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("board.jsonl");

        // A ticket pointing at a project the file does not contain.
        let ticket = Ticket {
            id: TicketId(7),
            project_id: ProjectId(99),
            type_id: crate::domain::TypeId(2),
            priority_id: None,
            state_id: crate::domain::StateId(1),
            what: "stray".to_string(),
            why: None,
            acceptance_criteria: None,
            test_steps: None,
            created_date: Utc::now(),
            completed_date: None,
        };
        let line = serde_json::to_string(&Record::Ticket(ticket)).unwrap();
        std::fs::write(&path, format!("{line}\n")).unwrap();

        let (storage, warnings) = load_snapshot(&path).await.unwrap();
        assert!(matches!(
            warnings[0],
            LoadWarning::OrphanedTicket { ticket: TicketId(7), project: ProjectId(99) }
        ));
        assert!(storage.list_tickets(None).await.unwrap().is_empty());
        // Registry was still seeded.
        assert_eq!(storage.states().await.unwrap().len(), 4);
    }
}
