//! Integration tests for JSONL snapshot persistence.
//!
//! These tests verify that a saved board survives a reload intact: registry
//! rows, projects, tickets, dependency edges, comments, attachments, metrics,
//! and the id sequences that keep new rows unique after a restart.

use pegboard::domain::{
    NewAttachment, NewProject, NewTicket, ProjectId, StateRef, TypeId, STATE_DONE,
};
use pegboard::storage::{create_storage, BoardStorage, StorageBackend};
use tempfile::tempdir;

fn new_ticket(project_id: ProjectId, what: &str) -> NewTicket {
    NewTicket {
        project_id,
        type_id: TypeId(3),
        priority_id: None,
        state: None,
        what: what.to_string(),
        why: None,
        acceptance_criteria: None,
        test_steps: None,
    }
}

#[tokio::test]
async fn save_and_reload_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("board.jsonl");

    let saved_snapshot = {
        let mut storage = create_storage(StorageBackend::Jsonl(path.clone()))
            .await
            .unwrap();

        let project = storage
            .create_project(NewProject {
                name: "api".to_string(),
                description: Some("Backend service".to_string()),
            })
            .await
            .unwrap();
        let blocked = storage
            .create_ticket(new_ticket(project.id, "Blocked work"))
            .await
            .unwrap();
        let blocker = storage
            .create_ticket(new_ticket(project.id, "Blocker"))
            .await
            .unwrap();
        storage.add_dependency(blocked.id, blocker.id).await.unwrap();
        storage
            .transition_ticket(blocker.id, StateRef::ByName(STATE_DONE.to_string()))
            .await
            .unwrap();
        storage
            .add_comment(blocked.id, "Waiting on the blocker".to_string())
            .await
            .unwrap();
        storage
            .add_attachment(
                blocked.id,
                NewAttachment {
                    filename: "trace.log".to_string(),
                    file_path: "/tmp/trace.log".to_string(),
                    file_type: "text/plain".to_string(),
                    file_size: 512,
                },
            )
            .await
            .unwrap();

        storage.save().await.unwrap();
        storage.export().await.unwrap()
    };

    let reloaded = create_storage(StorageBackend::Jsonl(path)).await.unwrap();
    let reloaded_snapshot = reloaded.export().await.unwrap();

    assert_eq!(saved_snapshot, reloaded_snapshot);
    assert_eq!(reloaded_snapshot.tickets.len(), 2);
    assert_eq!(reloaded_snapshot.dependencies.len(), 1);
    assert_eq!(reloaded_snapshot.comments.len(), 1);
    assert_eq!(reloaded_snapshot.attachments.len(), 1);
    assert_eq!(reloaded_snapshot.metrics.len(), 1);
}

#[tokio::test]
async fn sequences_continue_after_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("board.jsonl");

    let (project_id, first_ticket_id) = {
        let mut storage = create_storage(StorageBackend::Jsonl(path.clone()))
            .await
            .unwrap();
        let project = storage
            .create_project(NewProject {
                name: "api".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let ticket = storage
            .create_ticket(new_ticket(project.id, "First"))
            .await
            .unwrap();
        storage.save().await.unwrap();
        (project.id, ticket.id)
    };

    let mut reloaded = create_storage(StorageBackend::Jsonl(path)).await.unwrap();
    let next = reloaded
        .create_ticket(new_ticket(project_id, "Second"))
        .await
        .unwrap();

    assert!(next.id.0 > first_ticket_id.0);
}

#[tokio::test]
async fn missing_file_starts_an_empty_seeded_board() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.jsonl");

    let storage = create_storage(StorageBackend::Jsonl(path)).await.unwrap();

    assert!(storage.list_projects().await.unwrap().is_empty());
    assert_eq!(storage.states().await.unwrap().len(), 4);
}

#[tokio::test]
async fn completion_state_survives_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("board.jsonl");

    let ticket_id = {
        let mut storage = create_storage(StorageBackend::Jsonl(path.clone()))
            .await
            .unwrap();
        let project = storage
            .create_project(NewProject {
                name: "api".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let ticket = storage
            .create_ticket(new_ticket(project.id, "Ship it"))
            .await
            .unwrap();
        storage
            .transition_ticket(ticket.id, StateRef::ByName(STATE_DONE.to_string()))
            .await
            .unwrap();
        storage.save().await.unwrap();
        ticket.id
    };

    let mut reloaded = create_storage(StorageBackend::Jsonl(path)).await.unwrap();
    let ticket = reloaded.get_ticket(ticket_id).await.unwrap().unwrap();
    assert!(ticket.completed_date.is_some());

    // Leaving done after a reload still clears the stamp and writes no
    // duplicate metric.
    let reopened = reloaded
        .transition_ticket(ticket_id, StateRef::ByName("review".to_string()))
        .await
        .unwrap();
    assert!(reopened.completed_date.is_none());
    assert_eq!(reloaded.metrics().await.unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_lines_do_not_poison_the_board() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("board.jsonl");

    {
        let mut storage = create_storage(StorageBackend::Jsonl(path.clone()))
            .await
            .unwrap();
        storage
            .create_project(NewProject {
                name: "api".to_string(),
                description: None,
            })
            .await
            .unwrap();
        storage.save().await.unwrap();
    }

    // Corrupt the file with a half-written line.
    let mut content = tokio::fs::read_to_string(&path).await.unwrap();
    content.push_str("{\"record\":\"ticket\",\"id\":");
    tokio::fs::write(&path, content).await.unwrap();

    let storage = create_storage(StorageBackend::Jsonl(path)).await.unwrap();
    assert_eq!(storage.list_projects().await.unwrap().len(), 1);
}
