//! BoardStorage trait implementation for the in-memory board.

use super::graph::{direct_dependencies, direct_dependents, edge_exists};
use super::inner::next;
use super::snapshot::Snapshot;
use super::Board;
use crate::domain::{
    Attachment, BoardStatus, Comment, DependencyEdge, FailureReport, Metric, NewAttachment,
    NewProject, NewTicket, Project, ProjectCount, ProjectId, ProjectUpdate, StateCount, StateRef,
    Ticket,
    TicketId, TicketPriority, TicketRef, TicketState, TicketType, TicketUpdate, TicketView,
    STATE_ARCHIVED, STATE_BACKLOG, STATE_DONE,
};
use crate::error::{Error, Result};
use crate::storage::BoardStorage;
use async_trait::async_trait;
use chrono::Utc;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

#[async_trait]
impl BoardStorage for Board {
    async fn create_project(&mut self, project: NewProject) -> Result<Project> {
        let mut inner = self.lock().await;

        if project.name.trim().is_empty() {
            return Err(Error::MissingField("name"));
        }

        let id = ProjectId(next(&mut inner.sequences.project));
        let project = Project {
            id,
            name: project.name,
            description: project.description,
            created_date: Utc::now(),
        };
        inner.projects.insert(id, project.clone());

        Ok(project)
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let inner = self.lock().await;
        Ok(inner.projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let inner = self.lock().await;
        let mut projects: Vec<Project> = inner.projects.values().cloned().collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn update_project(&mut self, id: ProjectId, updates: ProjectUpdate) -> Result<Project> {
        let mut inner = self.lock().await;

        let project = inner
            .projects
            .get_mut(&id)
            .ok_or(Error::ProjectNotFound(id))?;

        if let Some(name) = updates.name {
            if name.trim().is_empty() {
                return Err(Error::MissingField("name"));
            }
            project.name = name;
        }
        if let Some(description) = updates.description {
            project.description = description;
        }

        Ok(project.clone())
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        let mut inner = self.lock().await;

        if !inner.projects.contains_key(&id) {
            return Err(Error::ProjectNotFound(id));
        }

        let ticket_ids: Vec<TicketId> = inner
            .tickets
            .values()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        for ticket_id in ticket_ids {
            inner.remove_ticket(ticket_id);
        }

        inner.projects.remove(&id);
        Ok(())
    }

    async fn create_ticket(&mut self, ticket: NewTicket) -> Result<Ticket> {
        let mut inner = self.lock().await;

        // All validation and resolution up front; nothing mutates until
        // every input has checked out.
        if ticket.what.trim().is_empty() {
            return Err(Error::MissingField("what"));
        }
        if !inner.projects.contains_key(&ticket.project_id) {
            return Err(Error::ProjectNotFound(ticket.project_id));
        }
        let state = match &ticket.state {
            Some(state_ref) => inner.resolve_state(state_ref)?,
            None => inner.resolve_state(&StateRef::ByName(STATE_BACKLOG.to_string()))?,
        };

        let id = TicketId(next(&mut inner.sequences.ticket));
        let stored = Ticket {
            id,
            project_id: ticket.project_id,
            type_id: ticket.type_id,
            priority_id: ticket.priority_id,
            state_id: state.id,
            what: ticket.what,
            why: ticket.why,
            acceptance_criteria: ticket.acceptance_criteria,
            test_steps: ticket.test_steps,
            created_date: Utc::now(),
            completed_date: None,
        };
        inner.tickets.insert(id, stored);
        let node = inner.graph.add_node(id);
        inner.node_map.insert(id, node);

        // Run the transition logic so a ticket created directly in "done"
        // gets its completion stamp and metric record.
        inner.transition(id, &state)
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        let inner = self.lock().await;
        Ok(inner.tickets.get(&id).cloned())
    }

    async fn ticket_view(&self, id: TicketId) -> Result<TicketView> {
        let inner = self.lock().await;

        let ticket = inner.tickets.get(&id).ok_or(Error::TicketNotFound(id))?;
        let node = inner
            .node_map
            .get(&id)
            .copied()
            .ok_or(Error::TicketNotFound(id))?;

        let ticket_ref = |dep_id: TicketId| -> Option<TicketRef> {
            inner.tickets.get(&dep_id).map(|t| TicketRef {
                id: t.id,
                what: t.what.clone(),
                state: t.state_id,
                state_name: inner.state_name(t.state_id).map(str::to_string),
            })
        };

        let mut dependency_ids = direct_dependencies(&inner.graph, node);
        dependency_ids.sort_unstable();
        let mut dependent_ids = direct_dependents(&inner.graph, node);
        dependent_ids.sort_unstable();

        let dependencies: Vec<TicketRef> =
            dependency_ids.iter().filter_map(|&d| ticket_ref(d)).collect();
        let dependents: Vec<TicketRef> =
            dependent_ids.iter().filter_map(|&d| ticket_ref(d)).collect();

        let done_id = inner.state_named(STATE_DONE).map(|s| s.id);
        let all_dependencies_resolved = dependency_ids.iter().all(|dep_id| {
            inner
                .tickets
                .get(dep_id)
                .is_some_and(|t| Some(t.state_id) == done_id)
        });

        let attachments: Vec<Attachment> = inner
            .attachments
            .values()
            .filter(|a| a.ticket_id == id)
            .cloned()
            .collect();

        Ok(TicketView {
            id: ticket.id,
            project_id: ticket.project_id,
            type_id: ticket.type_id,
            type_name: inner
                .types
                .iter()
                .find(|t| t.id == ticket.type_id)
                .map(|t| t.name.clone()),
            priority: ticket.priority_id,
            priority_name: ticket.priority_id.and_then(|p| {
                inner
                    .priorities
                    .iter()
                    .find(|row| row.id == p)
                    .map(|row| row.name.clone())
            }),
            state: ticket.state_id,
            state_name: inner.state_name(ticket.state_id).map(str::to_string),
            what: ticket.what.clone(),
            why: ticket.why.clone(),
            acceptance_criteria: ticket.acceptance_criteria.clone(),
            test_steps: ticket.test_steps.clone(),
            created_date: Some(ticket.created_date),
            completed_date: ticket.completed_date,
            attachments,
            dependencies,
            dependents,
            all_dependencies_resolved,
        })
    }

    async fn list_tickets(&self, project: Option<ProjectId>) -> Result<Vec<Ticket>> {
        let inner = self.lock().await;

        if let Some(project_id) = project {
            if !inner.projects.contains_key(&project_id) {
                return Err(Error::ProjectNotFound(project_id));
            }
        }

        let mut tickets: Vec<Ticket> = inner
            .tickets
            .values()
            .filter(|t| project.is_none_or(|p| t.project_id == p))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.id);
        Ok(tickets)
    }

    async fn update_ticket(&mut self, id: TicketId, updates: TicketUpdate) -> Result<Ticket> {
        let mut inner = self.lock().await;

        if !inner.tickets.contains_key(&id) {
            return Err(Error::TicketNotFound(id));
        }

        // Resolve everything that can fail before touching the ticket.
        if let Some(project_id) = updates.project_id {
            if !inner.projects.contains_key(&project_id) {
                return Err(Error::ProjectNotFound(project_id));
            }
        }
        let resolved_state = match &updates.state {
            Some(state_ref) => Some(inner.resolve_state(state_ref)?),
            None => None,
        };
        if let Some(what) = &updates.what {
            if what.trim().is_empty() {
                return Err(Error::MissingField("what"));
            }
        }

        {
            let ticket = inner
                .tickets
                .get_mut(&id)
                .ok_or(Error::TicketNotFound(id))?;
            if let Some(project_id) = updates.project_id {
                ticket.project_id = project_id;
            }
            if let Some(type_id) = updates.type_id {
                ticket.type_id = type_id;
            }
            if let Some(priority_id) = updates.priority_id {
                ticket.priority_id = priority_id;
            }
            if let Some(what) = updates.what {
                ticket.what = what;
            }
            if let Some(why) = updates.why {
                ticket.why = Some(why);
            }
            if let Some(acceptance_criteria) = updates.acceptance_criteria {
                ticket.acceptance_criteria = Some(acceptance_criteria);
            }
            if let Some(test_steps) = updates.test_steps {
                ticket.test_steps = Some(test_steps);
            }
        }

        match resolved_state {
            Some(state) => inner.transition(id, &state),
            None => inner
                .tickets
                .get(&id)
                .cloned()
                .ok_or(Error::TicketNotFound(id)),
        }
    }

    async fn transition_ticket(&mut self, id: TicketId, state: StateRef) -> Result<Ticket> {
        let mut inner = self.lock().await;

        if !inner.tickets.contains_key(&id) {
            return Err(Error::TicketNotFound(id));
        }
        let state = inner.resolve_state(&state)?;
        inner.transition(id, &state)
    }

    async fn delete_ticket(&mut self, id: TicketId) -> Result<()> {
        let mut inner = self.lock().await;

        if !inner.tickets.contains_key(&id) {
            return Err(Error::TicketNotFound(id));
        }
        inner.remove_ticket(id);
        Ok(())
    }

    async fn archived_tickets(&self) -> Result<Vec<Ticket>> {
        let inner = self.lock().await;

        let Some(archived) = inner.state_named(STATE_ARCHIVED) else {
            // Nothing has ever been archived; the state is provisioned on
            // first use.
            return Ok(Vec::new());
        };
        let archived_id = archived.id;

        let mut tickets: Vec<Ticket> = inner
            .tickets
            .values()
            .filter(|t| t.state_id == archived_id)
            .cloned()
            .collect();
        // Most recently completed first; never-completed tickets last.
        // Option orders None before Some, so a descending sort puts the
        // None completion stamps at the end.
        tickets.sort_by(|a, b| b.completed_date.cmp(&a.completed_date));
        Ok(tickets)
    }

    async fn states(&self) -> Result<Vec<TicketState>> {
        let inner = self.lock().await;
        Ok(inner.states.clone())
    }

    async fn types(&self) -> Result<Vec<TicketType>> {
        let inner = self.lock().await;
        Ok(inner.types.clone())
    }

    async fn priorities(&self) -> Result<Vec<TicketPriority>> {
        let inner = self.lock().await;
        Ok(inner.priorities.clone())
    }

    async fn ensure_state(&mut self, name: &str) -> Result<TicketState> {
        let mut inner = self.lock().await;

        if let Some(existing) = inner.state_named(name) {
            return Ok(existing.clone());
        }

        let state = TicketState {
            id: crate::domain::StateId(next(&mut inner.sequences.state)),
            name: name.to_string(),
        };
        inner.states.push(state.clone());
        Ok(state)
    }

    async fn add_dependency(&mut self, dependent: TicketId, dependency: TicketId) -> Result<()> {
        let mut inner = self.lock().await;

        if dependent == dependency {
            return Err(Error::SelfDependency(dependent));
        }
        if !inner.tickets.contains_key(&dependent) {
            return Err(Error::TicketNotFound(dependent));
        }
        if !inner.tickets.contains_key(&dependency) {
            return Err(Error::TicketNotFound(dependency));
        }

        // Re-asserting an existing edge is a no-op.
        if edge_exists(&inner.graph, &inner.node_map, dependent, dependency) {
            return Ok(());
        }

        // Only the immediate reverse edge blocks the add; longer cycles
        // through intermediate tickets pass this check.
        if edge_exists(&inner.graph, &inner.node_map, dependency, dependent) {
            return Err(Error::CircularDependency {
                dependent,
                dependency,
            });
        }

        let from = inner.node_map[&dependent];
        let to = inner.node_map[&dependency];
        inner.graph.add_edge(from, to, Utc::now());
        Ok(())
    }

    async fn remove_dependency(&mut self, dependent: TicketId, dependency: TicketId) -> Result<()> {
        let mut inner = self.lock().await;

        if !inner.tickets.contains_key(&dependent) {
            return Err(Error::TicketNotFound(dependent));
        }
        if !inner.tickets.contains_key(&dependency) {
            return Err(Error::TicketNotFound(dependency));
        }

        let from = inner.node_map[&dependent];
        let to = inner.node_map[&dependency];
        if let Some(edge) = inner.graph.find_edge(from, to) {
            inner.graph.remove_edge(edge);
        }
        Ok(())
    }

    async fn dependencies_of(&self, id: TicketId) -> Result<Vec<Ticket>> {
        let inner = self.lock().await;

        let node = inner
            .node_map
            .get(&id)
            .copied()
            .ok_or(Error::TicketNotFound(id))?;
        let mut ids = direct_dependencies(&inner.graph, node);
        ids.sort_unstable();
        Ok(ids
            .into_iter()
            .filter_map(|dep_id| inner.tickets.get(&dep_id).cloned())
            .collect())
    }

    async fn dependents_of(&self, id: TicketId) -> Result<Vec<Ticket>> {
        let inner = self.lock().await;

        let node = inner
            .node_map
            .get(&id)
            .copied()
            .ok_or(Error::TicketNotFound(id))?;
        let mut ids = direct_dependents(&inner.graph, node);
        ids.sort_unstable();
        Ok(ids
            .into_iter()
            .filter_map(|dep_id| inner.tickets.get(&dep_id).cloned())
            .collect())
    }

    async fn has_dependency(&self, dependent: TicketId, dependency: TicketId) -> Result<bool> {
        let inner = self.lock().await;
        Ok(edge_exists(
            &inner.graph,
            &inner.node_map,
            dependent,
            dependency,
        ))
    }

    async fn all_dependencies_resolved(&self, id: TicketId) -> Result<bool> {
        let inner = self.lock().await;

        let node = inner
            .node_map
            .get(&id)
            .copied()
            .ok_or(Error::TicketNotFound(id))?;

        let dependency_ids = direct_dependencies(&inner.graph, node);
        if dependency_ids.is_empty() {
            return Ok(true);
        }

        let done_id = inner.state_named(STATE_DONE).map(|s| s.id);
        Ok(dependency_ids.iter().all(|dep_id| {
            inner
                .tickets
                .get(dep_id)
                .is_some_and(|t| Some(t.state_id) == done_id)
        }))
    }

    async fn add_comment(&mut self, ticket: TicketId, content: String) -> Result<Comment> {
        let mut inner = self.lock().await;

        if !inner.tickets.contains_key(&ticket) {
            return Err(Error::TicketNotFound(ticket));
        }
        if content.trim().is_empty() {
            return Err(Error::MissingField("content"));
        }

        let id = next(&mut inner.sequences.comment);
        let comment = Comment {
            id,
            ticket_id: ticket,
            content,
            created_date: Utc::now(),
            updated_date: None,
        };
        inner.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn comments_for(&self, ticket: TicketId) -> Result<Vec<Comment>> {
        let inner = self.lock().await;

        if !inner.tickets.contains_key(&ticket) {
            return Err(Error::TicketNotFound(ticket));
        }
        Ok(inner
            .comments
            .values()
            .filter(|c| c.ticket_id == ticket)
            .cloned()
            .collect())
    }

    async fn update_comment(&mut self, id: i64, content: String) -> Result<Comment> {
        let mut inner = self.lock().await;

        if content.trim().is_empty() {
            return Err(Error::MissingField("content"));
        }
        let comment = inner
            .comments
            .get_mut(&id)
            .ok_or(Error::CommentNotFound(id))?;
        comment.content = content;
        comment.updated_date = Some(Utc::now());
        Ok(comment.clone())
    }

    async fn delete_comment(&mut self, id: i64) -> Result<()> {
        let mut inner = self.lock().await;
        inner
            .comments
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::CommentNotFound(id))
    }

    async fn add_attachment(
        &mut self,
        ticket: TicketId,
        attachment: NewAttachment,
    ) -> Result<Attachment> {
        let mut inner = self.lock().await;

        if !inner.tickets.contains_key(&ticket) {
            return Err(Error::TicketNotFound(ticket));
        }

        let id = next(&mut inner.sequences.attachment);
        let attachment = Attachment {
            id,
            ticket_id: ticket,
            filename: attachment.filename,
            file_path: attachment.file_path,
            file_type: attachment.file_type,
            file_size: attachment.file_size,
            uploaded_date: Utc::now(),
        };
        inner.attachments.insert(id, attachment.clone());
        Ok(attachment)
    }

    async fn attachments_for(&self, ticket: TicketId) -> Result<Vec<Attachment>> {
        let inner = self.lock().await;

        if !inner.tickets.contains_key(&ticket) {
            return Err(Error::TicketNotFound(ticket));
        }
        Ok(inner
            .attachments
            .values()
            .filter(|a| a.ticket_id == ticket)
            .cloned()
            .collect())
    }

    async fn delete_attachment(&mut self, id: i64) -> Result<()> {
        let mut inner = self.lock().await;
        inner
            .attachments
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::AttachmentNotFound(id))
    }

    async fn metrics(&self) -> Result<Vec<Metric>> {
        let inner = self.lock().await;
        Ok(inner.metrics.values().cloned().collect())
    }

    async fn report_failure(&mut self, ticket: TicketId, report: FailureReport) -> Result<Metric> {
        let mut inner = self.lock().await;

        if !inner.tickets.contains_key(&ticket) {
            return Err(Error::TicketNotFound(ticket));
        }

        let existing_id = inner
            .metrics
            .values()
            .find(|m| m.ticket_id == ticket)
            .map(|m| m.id);

        if let Some(id) = existing_id {
            let metric = inner
                .metrics
                .get_mut(&id)
                .ok_or(Error::Storage(format!("metric {id} vanished")))?;
            metric.change_failure = true;
            if let Some(restoration) = report.restoration_time {
                metric.restoration_time = Some(restoration);
            } else if metric.restoration_time.is_none() {
                metric.restoration_time = metric.lead_time;
            }
            if let Some(deployed) = report.deployment_date {
                metric.deployment_date = Some(deployed);
            }
            return Ok(metric.clone());
        }

        // No delivery record yet; failures on never-completed tickets
        // still count toward the failure rate.
        let id = next(&mut inner.sequences.metric);
        let metric = Metric {
            id,
            ticket_id: ticket,
            lead_time: None,
            change_failure: true,
            deployment_date: report.deployment_date.or_else(|| Some(Utc::now())),
            restoration_time: report.restoration_time,
            record_date: Utc::now(),
        };
        inner.metrics.insert(id, metric.clone());
        Ok(metric)
    }

    async fn board_status(&self) -> Result<BoardStatus> {
        let inner = self.lock().await;

        let by_state = inner
            .states
            .iter()
            .map(|state| StateCount {
                state: state.name.clone(),
                count: inner
                    .tickets
                    .values()
                    .filter(|t| t.state_id == state.id)
                    .count(),
            })
            .collect();

        let mut by_project: Vec<ProjectCount> = inner
            .projects
            .values()
            .map(|project| ProjectCount {
                project_id: project.id,
                name: project.name.clone(),
                count: inner
                    .tickets
                    .values()
                    .filter(|t| t.project_id == project.id)
                    .count(),
            })
            .collect();
        by_project.sort_by_key(|p| p.project_id);

        Ok(BoardStatus {
            total_tickets: inner.tickets.len(),
            by_state,
            by_project,
        })
    }

    async fn export(&self) -> Result<Snapshot> {
        let inner = self.lock().await;

        let mut projects: Vec<Project> = inner.projects.values().cloned().collect();
        projects.sort_by_key(|p| p.id);
        let mut tickets: Vec<Ticket> = inner.tickets.values().cloned().collect();
        tickets.sort_by_key(|t| t.id);

        let mut dependencies: Vec<DependencyEdge> = inner
            .graph
            .edge_references()
            .map(|edge| DependencyEdge {
                dependent_id: inner.graph[edge.source()],
                dependency_id: inner.graph[edge.target()],
                created_date: *edge.weight(),
            })
            .collect();
        // Deterministic snapshot ordering keeps saves diff-friendly.
        dependencies.sort_by_key(|e| (e.dependent_id, e.dependency_id));

        Ok(Snapshot {
            states: inner.states.clone(),
            types: inner.types.clone(),
            priorities: inner.priorities.clone(),
            projects,
            tickets,
            dependencies,
            comments: inner.comments.values().cloned().collect(),
            attachments: inner.attachments.values().cloned().collect(),
            metrics: inner.metrics.values().cloned().collect(),
        })
    }

    async fn save(&self) -> Result<()> {
        // The plain in-memory board has no backing store.
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        // No backing store to reload from.
        Ok(())
    }
}
