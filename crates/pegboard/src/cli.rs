//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for pegboard using clap's
//! derive API. Commands are grouped by noun (`project`, `ticket`, `dep`,
//! `comment`) with board-wide commands (`init`, `status`, `metrics`) at the
//! top level.
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! pegboard init --project api
//! pegboard ticket create "Fix login redirect" --type bug --priority high
//! pegboard ticket move 3 done
//! pegboard dep add 5 --on 3
//! pegboard metrics
//! ```

use crate::app::App;
use crate::commands::init;
use crate::domain::{
    NewProject, NewTicket, PriorityId, Project, ProjectId, ProjectUpdate, StateRef, TicketId,
    TicketUpdate, TypeId,
};
use crate::output::{self, OutputMode};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

/// Pegboard - a kanban-style task tracker
///
/// Track projects, tickets, workflow states, and dependencies using JSONL
/// storage. The board lives in `.pegboard/board.jsonl` for easy version
/// control integration.
#[derive(Parser, Debug)]
#[command(name = "pegboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new pegboard board
    ///
    /// Creates the `.pegboard/` directory with configuration and a board
    /// file seeded with default states, types, priorities, and a starting
    /// project. Run this once in your project root.
    Init(InitArgs),

    /// Manage projects
    Project {
        /// Project action to perform
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage tickets
    Ticket {
        /// Ticket action to perform
        #[command(subcommand)]
        action: TicketAction,
    },

    /// Manage dependencies between tickets
    Dep {
        /// Dependency action to perform
        #[command(subcommand)]
        action: DepAction,
    },

    /// Manage ticket comments
    Comment {
        /// Comment action to perform
        #[command(subcommand)]
        action: CommentAction,
    },

    /// Show a board summary
    ///
    /// Displays total ticket counts broken down by state and by project.
    Status,

    /// Show delivery metrics
    ///
    /// Displays lead time, deployment frequency, change failure rate,
    /// time to restore, and completion rate derived from completed tickets.
    Metrics,
}

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Name of the starting project (defaults to "default")
    #[arg(short, long)]
    pub project: Option<String>,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Project subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ProjectAction {
    /// Create a new project
    Create {
        /// Project name
        name: String,

        /// Project description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List all projects
    List,

    /// Update an existing project
    Update {
        /// Project id
        id: i64,

        /// New project name
        #[arg(short, long)]
        name: Option<String>,

        /// New project description
        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,

        /// Remove the project description
        #[arg(long)]
        clear_description: bool,
    },

    /// Delete a project and all of its tickets
    Delete {
        /// Project id
        id: i64,
    },
}

/// Ticket subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum TicketAction {
    /// Create a new ticket
    Create {
        /// What the ticket is about
        what: String,

        /// Project name (defaults to the configured default project)
        #[arg(short, long)]
        project: Option<String>,

        /// Ticket type (bug, story, task, spike)
        #[arg(short = 't', long = "type", default_value = "task")]
        ticket_type: String,

        /// Priority (low, medium, high, critical)
        #[arg(long)]
        priority: Option<String>,

        /// Initial state, by name or id (defaults to backlog)
        #[arg(short, long)]
        state: Option<String>,

        /// Why the ticket matters
        #[arg(long)]
        why: Option<String>,

        /// Acceptance criteria
        #[arg(long)]
        acceptance: Option<String>,

        /// Test steps
        #[arg(long)]
        test_steps: Option<String>,
    },

    /// List tickets
    List {
        /// Filter by project name
        #[arg(short, long)]
        project: Option<String>,

        /// List tickets across all projects
        #[arg(short, long, conflicts_with = "project")]
        all: bool,
    },

    /// Show detailed information about a ticket
    Show {
        /// Ticket id
        id: i64,
    },

    /// Update an existing ticket
    ///
    /// Only provided fields are updated; other fields remain unchanged.
    Update {
        /// Ticket id
        id: i64,

        /// Move to a different project (by name)
        #[arg(short, long)]
        project: Option<String>,

        /// New ticket type
        #[arg(short = 't', long = "type")]
        ticket_type: Option<String>,

        /// New priority
        #[arg(long, conflicts_with = "clear_priority")]
        priority: Option<String>,

        /// Remove the priority
        #[arg(long)]
        clear_priority: bool,

        /// New state, by name or id
        #[arg(short, long)]
        state: Option<String>,

        /// New summary
        #[arg(long)]
        what: Option<String>,

        /// New rationale
        #[arg(long)]
        why: Option<String>,

        /// New acceptance criteria
        #[arg(long)]
        acceptance: Option<String>,

        /// New test steps
        #[arg(long)]
        test_steps: Option<String>,
    },

    /// Move a ticket to a different state
    ///
    /// Entering "done" stamps the completion date and records a delivery
    /// metric; leaving "done" clears it.
    Move {
        /// Ticket id
        id: i64,

        /// Target state, by name or id
        state: String,
    },

    /// Delete a ticket permanently
    ///
    /// Removes the ticket along with its comments, attachments, metrics,
    /// and dependency edges. This cannot be undone.
    Delete {
        /// Ticket id
        id: i64,
    },

    /// List archived tickets, most recently completed first
    Archived,
}

/// Dependency subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum DepAction {
    /// Record that one ticket depends on another
    Add {
        /// The ticket that is blocked
        ticket: i64,

        /// The ticket it depends on
        #[arg(long = "on")]
        depends_on: i64,
    },

    /// Remove a dependency
    Remove {
        /// The dependent ticket
        ticket: i64,

        /// The dependency to remove
        #[arg(long = "on")]
        depends_on: i64,
    },

    /// List a ticket's dependencies (or dependents with --reverse)
    List {
        /// Ticket id
        ticket: i64,

        /// List tickets that depend on this one instead
        #[arg(short, long)]
        reverse: bool,
    },
}

/// Comment subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CommentAction {
    /// Add a comment to a ticket
    Add {
        /// Ticket id
        ticket: i64,

        /// Comment text
        content: String,
    },

    /// List a ticket's comments
    List {
        /// Ticket id
        ticket: i64,
    },
}

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing).
    ///
    /// # Errors
    ///
    /// Returns a clap error when the arguments do not parse.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the parsed command against the board in the current
    /// directory (or any parent).
    ///
    /// # Errors
    ///
    /// Propagates board, storage, and I/O errors.
    pub async fn execute(&self) -> Result<()> {
        let mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        match &self.command {
            Some(Commands::Init(args)) => run_init(args, mode).await,
            Some(command) => {
                let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
                let mut app = App::from_directory(&cwd).await?;
                run_command(&mut app, command, mode).await
            }
            None => {
                output::print_message("Pegboard task tracker")?;
                output::print_message("Use --help for more information")?;
                Ok(())
            }
        }
    }
}

async fn run_init(args: &InitArgs, mode: OutputMode) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    let result = init::init(&cwd, args.project.as_deref()).await?;

    match mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "board_dir": result.board_dir,
            "project": result.project,
        }))?,
        OutputMode::Text => {
            if !args.quiet {
                output::print_message(&format!(
                    "Initialized pegboard board in {} (project '{}')",
                    result.board_dir.display(),
                    result.project
                ))?;
            }
        }
    }
    Ok(())
}

async fn run_command(app: &mut App, command: &Commands, mode: OutputMode) -> Result<()> {
    match command {
        Commands::Init(_) => unreachable!("init is handled before board discovery"),
        Commands::Project { action } => run_project(app, action, mode).await,
        Commands::Ticket { action } => run_ticket(app, action, mode).await,
        Commands::Dep { action } => run_dep(app, action, mode).await,
        Commands::Comment { action } => run_comment(app, action, mode).await,
        Commands::Status => {
            let status = app.storage().board_status().await?;
            output::print_status(&status, mode)?;
            Ok(())
        }
        Commands::Metrics => {
            let report = crate::storage::metrics_report(app.storage()).await?;
            output::print_metrics(&report, mode)?;
            Ok(())
        }
    }
}

async fn run_project(app: &mut App, action: &ProjectAction, mode: OutputMode) -> Result<()> {
    match action {
        ProjectAction::Create { name, description } => {
            let project = app
                .storage_mut()
                .create_project(NewProject {
                    name: name.clone(),
                    description: description.clone(),
                })
                .await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&project)?,
                OutputMode::Text => output::print_message(&format!(
                    "Created project #{} '{}'",
                    project.id, project.name
                ))?,
            }
        }
        ProjectAction::List => {
            let projects = app.storage().list_projects().await?;
            output::print_projects(&projects, mode)?;
        }
        ProjectAction::Update {
            id,
            name,
            description,
            clear_description,
        } => {
            let update = ProjectUpdate {
                name: name.clone(),
                description: if *clear_description {
                    Some(None)
                } else {
                    description.clone().map(Some)
                },
            };
            let project = app
                .storage_mut()
                .update_project(ProjectId(*id), update)
                .await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&project)?,
                OutputMode::Text => {
                    output::print_message(&format!("Updated project #{}", project.id))?;
                }
            }
        }
        ProjectAction::Delete { id } => {
            app.storage_mut().delete_project(ProjectId(*id)).await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&serde_json::json!({ "deleted": id }))?,
                OutputMode::Text => output::print_message(&format!("Deleted project #{id}"))?,
            }
        }
    }
    Ok(())
}

async fn run_ticket(app: &mut App, action: &TicketAction, mode: OutputMode) -> Result<()> {
    match action {
        TicketAction::Create {
            what,
            project,
            ticket_type,
            priority,
            state,
            why,
            acceptance,
            test_steps,
        } => {
            let project = resolve_project(app, project.as_deref()).await?;
            let type_id = resolve_type(app, ticket_type).await?;
            let priority_id = match priority {
                Some(name) => Some(resolve_priority(app, name).await?),
                None => None,
            };

            let ticket = app
                .storage_mut()
                .create_ticket(NewTicket {
                    project_id: project.id,
                    type_id,
                    priority_id,
                    state: state.as_deref().map(StateRef::parse),
                    what: what.clone(),
                    why: why.clone(),
                    acceptance_criteria: acceptance.clone(),
                    test_steps: test_steps.clone(),
                })
                .await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&ticket)?,
                OutputMode::Text => output::print_message(&format!(
                    "Created ticket #{} in '{}'",
                    ticket.id, project.name
                ))?,
            }
        }
        TicketAction::List { project, all } => {
            let filter = if *all {
                None
            } else {
                let name = project.as_deref();
                Some(resolve_project(app, name).await?.id)
            };
            let tickets = app.storage().list_tickets(filter).await?;
            let states = app.storage().states().await?;
            output::print_tickets(&tickets, &states, mode)?;
        }
        TicketAction::Show { id } => {
            let view = app.storage().ticket_view(TicketId(*id)).await?;
            let comments = app.storage().comments_for(TicketId(*id)).await?;
            output::print_ticket_details(&view, &comments, mode)?;
        }
        TicketAction::Update {
            id,
            project,
            ticket_type,
            priority,
            clear_priority,
            state,
            what,
            why,
            acceptance,
            test_steps,
        } => {
            let project_id = match project {
                Some(name) => Some(resolve_project(app, Some(name)).await?.id),
                None => None,
            };
            let type_id = match ticket_type {
                Some(name) => Some(resolve_type(app, name).await?),
                None => None,
            };
            let priority_id = if *clear_priority {
                Some(None)
            } else {
                match priority {
                    Some(name) => Some(Some(resolve_priority(app, name).await?)),
                    None => None,
                }
            };

            let update = TicketUpdate {
                project_id,
                type_id,
                priority_id,
                state: state.as_deref().map(StateRef::parse),
                what: what.clone(),
                why: why.clone(),
                acceptance_criteria: acceptance.clone(),
                test_steps: test_steps.clone(),
            };
            let ticket = app
                .storage_mut()
                .update_ticket(TicketId(*id), update)
                .await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&ticket)?,
                OutputMode::Text => output::print_message(&format!("Updated ticket #{}", ticket.id))?,
            }
        }
        TicketAction::Move { id, state } => {
            let ticket = app
                .storage_mut()
                .transition_ticket(TicketId(*id), StateRef::parse(state))
                .await?;
            app.commit().await?;
            let states = app.storage().states().await?;
            let state_name = states
                .iter()
                .find(|s| s.id == ticket.state_id)
                .map_or("?", |s| s.name.as_str());
            match mode {
                OutputMode::Json => output::print_json(&ticket)?,
                OutputMode::Text => output::print_message(&format!(
                    "Moved ticket #{} to '{state_name}'",
                    ticket.id
                ))?,
            }
        }
        TicketAction::Delete { id } => {
            app.storage_mut().delete_ticket(TicketId(*id)).await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&serde_json::json!({ "deleted": id }))?,
                OutputMode::Text => output::print_message(&format!("Deleted ticket #{id}"))?,
            }
        }
        TicketAction::Archived => {
            let tickets = app.storage().archived_tickets().await?;
            let states = app.storage().states().await?;
            output::print_tickets(&tickets, &states, mode)?;
        }
    }
    Ok(())
}

async fn run_dep(app: &mut App, action: &DepAction, mode: OutputMode) -> Result<()> {
    match action {
        DepAction::Add { ticket, depends_on } => {
            app.storage_mut()
                .add_dependency(TicketId(*ticket), TicketId(*depends_on))
                .await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&serde_json::json!({
                    "dependent": ticket,
                    "dependency": depends_on,
                }))?,
                OutputMode::Text => output::print_message(&format!(
                    "Ticket #{ticket} now depends on #{depends_on}"
                ))?,
            }
        }
        DepAction::Remove { ticket, depends_on } => {
            app.storage_mut()
                .remove_dependency(TicketId(*ticket), TicketId(*depends_on))
                .await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&serde_json::json!({
                    "removed": { "dependent": ticket, "dependency": depends_on },
                }))?,
                OutputMode::Text => output::print_message(&format!(
                    "Removed dependency of #{ticket} on #{depends_on}"
                ))?,
            }
        }
        DepAction::List { ticket, reverse } => {
            let tickets = if *reverse {
                app.storage().dependents_of(TicketId(*ticket)).await?
            } else {
                app.storage().dependencies_of(TicketId(*ticket)).await?
            };
            let states = app.storage().states().await?;
            output::print_tickets(&tickets, &states, mode)?;
        }
    }
    Ok(())
}

async fn run_comment(app: &mut App, action: &CommentAction, mode: OutputMode) -> Result<()> {
    match action {
        CommentAction::Add { ticket, content } => {
            let comment = app
                .storage_mut()
                .add_comment(TicketId(*ticket), content.clone())
                .await?;
            app.commit().await?;
            match mode {
                OutputMode::Json => output::print_json(&comment)?,
                OutputMode::Text => output::print_message(&format!(
                    "Added comment {} to ticket #{ticket}",
                    comment.id
                ))?,
            }
        }
        CommentAction::List { ticket } => {
            let comments = app.storage().comments_for(TicketId(*ticket)).await?;
            match mode {
                OutputMode::Json => output::print_json(&comments)?,
                OutputMode::Text => {
                    if comments.is_empty() {
                        output::print_message("No comments.")?;
                    } else {
                        for comment in &comments {
                            output::print_message(&format!(
                                "[{}] {}",
                                comment.created_date.format("%Y-%m-%d %H:%M"),
                                comment.content
                            ))?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// Registry Resolution
// ============================================================================

/// Resolve a project by name, falling back to the configured default.
async fn resolve_project(app: &App, name: Option<&str>) -> Result<Project> {
    let name = name.unwrap_or_else(|| app.default_project());
    let projects = app.storage().list_projects().await?;
    projects
        .into_iter()
        .find(|p| p.name == name)
        .with_context(|| format!("No project named '{name}'"))
}

async fn resolve_type(app: &App, name: &str) -> Result<TypeId> {
    let types = app.storage().types().await?;
    let Some(ticket_type) = types.iter().find(|t| t.name == name) else {
        let known: Vec<&str> = types.iter().map(|t| t.name.as_str()).collect();
        bail!(
            "Unknown ticket type '{name}' (known types: {})",
            known.join(", ")
        );
    };
    Ok(ticket_type.id)
}

async fn resolve_priority(app: &App, name: &str) -> Result<PriorityId> {
    let priorities = app.storage().priorities().await?;
    let Some(priority) = priorities.iter().find(|p| p.name == name) else {
        let known: Vec<&str> = priorities.iter().map(|p| p.name.as_str()).collect();
        bail!(
            "Unknown priority '{name}' (known priorities: {})",
            known.join(", ")
        );
    };
    Ok(priority.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_no_command() {
        let cli = Cli::try_parse_from(["pegboard"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn parse_global_json_flag() {
        let cli = Cli::try_parse_from(["pegboard", "--json", "status"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::Status)));
    }

    #[test]
    fn parse_init_with_project() {
        let cli = Cli::try_parse_from(["pegboard", "init", "--project", "api"]).unwrap();
        match cli.command {
            Some(Commands::Init(args)) => {
                assert_eq!(args.project.as_deref(), Some("api"));
                assert!(!args.quiet);
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn parse_ticket_create_defaults() {
        let cli = Cli::try_parse_from(["pegboard", "ticket", "create", "Fix the build"]).unwrap();
        match cli.command {
            Some(Commands::Ticket {
                action:
                    TicketAction::Create {
                        what,
                        ticket_type,
                        priority,
                        state,
                        ..
                    },
            }) => {
                assert_eq!(what, "Fix the build");
                assert_eq!(ticket_type, "task");
                assert!(priority.is_none());
                assert!(state.is_none());
            }
            _ => panic!("Expected ticket create"),
        }
    }

    #[test]
    fn parse_ticket_create_full() {
        let cli = Cli::try_parse_from([
            "pegboard",
            "ticket",
            "create",
            "Fix login redirect",
            "--type",
            "bug",
            "--priority",
            "critical",
            "--state",
            "in progress",
            "--why",
            "Users bounce off the login page",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ticket {
                action:
                    TicketAction::Create {
                        ticket_type,
                        priority,
                        state,
                        why,
                        ..
                    },
            }) => {
                assert_eq!(ticket_type, "bug");
                assert_eq!(priority.as_deref(), Some("critical"));
                assert_eq!(state.as_deref(), Some("in progress"));
                assert!(why.is_some());
            }
            _ => panic!("Expected ticket create"),
        }
    }

    #[test]
    fn parse_ticket_move() {
        let cli = Cli::try_parse_from(["pegboard", "ticket", "move", "3", "done"]).unwrap();
        match cli.command {
            Some(Commands::Ticket {
                action: TicketAction::Move { id, state },
            }) => {
                assert_eq!(id, 3);
                assert_eq!(state, "done");
            }
            _ => panic!("Expected ticket move"),
        }
    }

    #[test]
    fn parse_ticket_update_clear_priority_conflicts() {
        let result = Cli::try_parse_from([
            "pegboard",
            "ticket",
            "update",
            "3",
            "--priority",
            "high",
            "--clear-priority",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_dep_add() {
        let cli = Cli::try_parse_from(["pegboard", "dep", "add", "5", "--on", "3"]).unwrap();
        match cli.command {
            Some(Commands::Dep {
                action: DepAction::Add { ticket, depends_on },
            }) => {
                assert_eq!(ticket, 5);
                assert_eq!(depends_on, 3);
            }
            _ => panic!("Expected dep add"),
        }
    }

    #[test]
    fn parse_dep_list_reverse() {
        let cli = Cli::try_parse_from(["pegboard", "dep", "list", "5", "--reverse"]).unwrap();
        match cli.command {
            Some(Commands::Dep {
                action: DepAction::List { ticket, reverse },
            }) => {
                assert_eq!(ticket, 5);
                assert!(reverse);
            }
            _ => panic!("Expected dep list"),
        }
    }

    #[test]
    fn parse_comment_add() {
        let cli =
            Cli::try_parse_from(["pegboard", "comment", "add", "3", "Blocked on the API team"])
                .unwrap();
        match cli.command {
            Some(Commands::Comment {
                action: CommentAction::Add { ticket, content },
            }) => {
                assert_eq!(ticket, 3);
                assert_eq!(content, "Blocked on the API team");
            }
            _ => panic!("Expected comment add"),
        }
    }

    #[test]
    fn parse_project_update_clear_description_conflicts() {
        let result = Cli::try_parse_from([
            "pegboard",
            "project",
            "update",
            "1",
            "--description",
            "new",
            "--clear-description",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_metrics() {
        let cli = Cli::try_parse_from(["pegboard", "metrics"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Metrics)));
    }
}
