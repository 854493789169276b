//! # Pegboard
//!
//! A kanban-style task tracker with projects, tickets, workflow states,
//! dependency edges, and delivery metrics.
//!
//! Tickets move through workflow states (`backlog`, `in progress`,
//! `review`, `done`); entering `done` stamps a completion date and records
//! a delivery metric, leaving it clears the stamp. Dependencies form a
//! directed graph between tickets with shallow cycle rejection. The board
//! persists as line-delimited JSON (`.pegboard/board.jsonl`), friendly to
//! version control.
//!
//! ## Architecture
//!
//! - [`domain`]: Core types (projects, tickets, registry rows, views)
//! - [`storage`]: The [`storage::BoardStorage`] trait and its in-memory
//!   and JSONL-backed implementations
//! - [`metrics`]: DORA-style delivery metrics derived from ticket history
//! - [`app`]: Application context tying board discovery, config, and
//!   storage together
//! - [`cli`] / [`output`] / [`commands`]: The command-line front end
//!
//! ## Example
//!
//! ```no_run
//! use pegboard::domain::{NewProject, NewTicket, StateRef, TypeId};
//! use pegboard::storage::{create_storage, StorageBackend};
//!
//! # async fn example() -> pegboard::error::Result<()> {
//! let mut storage = create_storage(StorageBackend::InMemory).await?;
//!
//! let project = storage
//!     .create_project(NewProject {
//!         name: "api".to_string(),
//!         description: None,
//!     })
//!     .await?;
//!
//! let ticket = storage
//!     .create_ticket(NewTicket {
//!         project_id: project.id,
//!         type_id: TypeId(1),
//!         priority_id: None,
//!         state: None,
//!         what: "Fix login redirect".to_string(),
//!         why: None,
//!         acceptance_criteria: None,
//!         test_steps: None,
//!     })
//!     .await?;
//!
//! storage
//!     .transition_ticket(ticket.id, StateRef::parse("done"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod commands;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod output;
pub mod storage;
