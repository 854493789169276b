//! Output formatting for CLI commands.
//!
//! This module provides utilities for formatting command output in both
//! human-readable text format and JSON format for programmatic use.

use crate::domain::{BoardStatus, Comment, Project, Ticket, TicketState, TicketView};
use crate::metrics::MetricsReport;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

/// Content width for wrapped text sections.
const CONTENT_WIDTH: usize = 80;

// ============================================================================
// Color Helpers
// ============================================================================

/// Apply color to a state name.
fn colorize_state(name: &str) -> String {
    match name {
        "backlog" => name.white().to_string(),
        "in progress" => name.yellow().to_string(),
        "review" => name.cyan().to_string(),
        "done" => name.green().to_string(),
        "archived" => name.dimmed().to_string(),
        other => other.to_string(),
    }
}

/// Apply color to a priority name.
fn colorize_priority(name: &str) -> String {
    match name {
        "critical" => name.red().bold().to_string(),
        "high" => name.yellow().to_string(),
        other => other.to_string(),
    }
}

/// Colorize a ticket id (cyan).
fn colorize_id(id: impl std::fmt::Display) -> String {
    format!("#{id}").cyan().to_string()
}

/// Get a state icon.
fn state_icon(name: &str) -> String {
    match name {
        "backlog" => "○".white().to_string(),
        "in progress" => "▶".yellow().to_string(),
        "review" => "◈".cyan().to_string(),
        "done" => "✓".green().to_string(),
        "archived" => "□".dimmed().to_string(),
        _ => "·".to_string(),
    }
}

/// Get a type icon for ticket types.
fn type_icon(name: &str) -> &'static str {
    match name {
        "bug" => "●",
        "story" => "★",
        "task" => "◇",
        "spike" => "◆",
        _ => "·",
    }
}

/// Output format mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format.
    Text,
    /// JSON format for programmatic use.
    Json,
}

/// Look up a state name by id, falling back to a placeholder.
fn state_name(states: &[TicketState], id: crate::domain::StateId) -> String {
    states
        .iter()
        .find(|s| s.id == id)
        .map_or_else(|| "?".to_string(), |s| s.name.clone())
}

// ============================================================================
// Entry Points
// ============================================================================

/// Print a list of tickets in the specified format.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_tickets(tickets: &[Ticket], states: &[TicketState], mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match mode {
        OutputMode::Text => print_tickets_text(&mut handle, tickets, states),
        OutputMode::Json => print_json_to(&mut handle, &tickets),
    }
}

/// Print a ticket with full details (for the show command).
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_ticket_details(
    view: &TicketView,
    comments: &[Comment],
    mode: OutputMode,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match mode {
        OutputMode::Text => print_ticket_details_text(&mut handle, view, comments),
        OutputMode::Json => {
            #[derive(Serialize)]
            struct Details<'a> {
                #[serde(flatten)]
                ticket: &'a TicketView,
                comments: &'a [Comment],
            }
            print_json_to(&mut handle, &Details { ticket: view, comments })
        }
    }
}

/// Print the project list in the specified format.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_projects(projects: &[Project], mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match mode {
        OutputMode::Text => print_projects_text(&mut handle, projects),
        OutputMode::Json => print_json_to(&mut handle, &projects),
    }
}

/// Print the board summary in the specified format.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_status(status: &BoardStatus, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match mode {
        OutputMode::Text => print_status_text(&mut handle, status),
        OutputMode::Json => print_json_to(&mut handle, status),
    }
}

/// Print the metrics report in the specified format.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_metrics(report: &MetricsReport, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match mode {
        OutputMode::Text => print_metrics_text(&mut handle, report),
        OutputMode::Json => print_json_to(&mut handle, report),
    }
}

/// Print a simple message.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn print_message(msg: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{msg}")
}

/// Print a JSON-formatted result for any serializable value.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    print_json_to(&mut handle, value)
}

fn print_json_to<W: Write, T: Serialize>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(w, "{json}")
}

// ============================================================================
// Text Formatting
// ============================================================================

fn print_tickets_text<W: Write>(
    w: &mut W,
    tickets: &[Ticket],
    states: &[TicketState],
) -> io::Result<()> {
    if tickets.is_empty() {
        writeln!(w, "No tickets found.")?;
        return Ok(());
    }

    writeln!(w, "Found {} ticket(s):", tickets.len())?;
    writeln!(w)?;

    for ticket in tickets {
        let state = state_name(states, ticket.state_id);
        writeln!(
            w,
            "{} {}  [{}]  {}",
            state_icon(&state),
            colorize_id(ticket.id),
            colorize_state(&state),
            ticket.what
        )?;
    }

    Ok(())
}

fn print_ticket_details_text<W: Write>(
    w: &mut W,
    view: &TicketView,
    comments: &[Comment],
) -> io::Result<()> {
    let state = view.state_name.as_deref().unwrap_or("?");
    writeln!(w, "{} {}: {}", state_icon(state), colorize_id(view.id), view.what)?;

    let type_name = view.type_name.as_deref().unwrap_or("?");
    write!(
        w,
        "{}  {} {}    {}  {}",
        "Type:".dimmed(),
        type_icon(type_name),
        type_name,
        "State:".dimmed(),
        colorize_state(state),
    )?;
    if let Some(ref priority) = view.priority_name {
        write!(w, "    {}  {}", "Priority:".dimmed(), colorize_priority(priority))?;
    }
    writeln!(w)?;

    if let Some(created) = view.created_date {
        write!(w, "{} {}", "Created:".dimmed(), created.format("%Y-%m-%d %H:%M"))?;
        if let Some(completed) = view.completed_date {
            write!(
                w,
                "    {} {}",
                "Completed:".dimmed(),
                completed.format("%Y-%m-%d %H:%M")
            )?;
        }
        writeln!(w)?;
    }

    for (label, text) in [
        ("Why", view.why.as_deref()),
        ("Acceptance Criteria", view.acceptance_criteria.as_deref()),
        ("Test Steps", view.test_steps.as_deref()),
    ] {
        if let Some(text) = text {
            writeln!(w)?;
            writeln!(w, "{}:", label.bold())?;
            for line in textwrap::wrap(text, CONTENT_WIDTH.saturating_sub(2)) {
                writeln!(w, "  {line}")?;
            }
        }
    }

    if !view.dependencies.is_empty() {
        writeln!(w)?;
        writeln!(w, "{} ({}):", "Dependencies".bold(), view.dependencies.len())?;
        for dep in &view.dependencies {
            writeln!(
                w,
                "  {} {} [{}] {}",
                "→".cyan(),
                colorize_id(dep.id),
                colorize_state(dep.state_name.as_deref().unwrap_or("?")),
                dep.what
            )?;
        }
        let resolved = if view.all_dependencies_resolved {
            "all resolved".green().to_string()
        } else {
            "unresolved".yellow().to_string()
        };
        writeln!(w, "  {} {}", "Status:".dimmed(), resolved)?;
    }

    if !view.dependents.is_empty() {
        writeln!(w)?;
        writeln!(w, "{} ({}):", "Dependents".bold(), view.dependents.len())?;
        for dep in &view.dependents {
            writeln!(
                w,
                "  {} {} [{}] {}",
                "←".yellow(),
                colorize_id(dep.id),
                colorize_state(dep.state_name.as_deref().unwrap_or("?")),
                dep.what
            )?;
        }
    }

    if !view.attachments.is_empty() {
        writeln!(w)?;
        writeln!(w, "{} ({}):", "Attachments".bold(), view.attachments.len())?;
        for attachment in &view.attachments {
            writeln!(
                w,
                "  {} ({} bytes, {})",
                attachment.filename, attachment.file_size, attachment.file_type
            )?;
        }
    }

    if !comments.is_empty() {
        writeln!(w)?;
        writeln!(w, "{} ({}):", "Comments".bold(), comments.len())?;
        for comment in comments {
            writeln!(
                w,
                "  {} {}",
                comment.created_date.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                comment.content
            )?;
        }
    }

    Ok(())
}

fn print_projects_text<W: Write>(w: &mut W, projects: &[Project]) -> io::Result<()> {
    if projects.is_empty() {
        writeln!(w, "No projects found.")?;
        return Ok(());
    }

    for project in projects {
        write!(w, "{} {}", colorize_id(project.id), project.name.bold())?;
        if let Some(ref description) = project.description {
            write!(w, " — {description}")?;
        }
        writeln!(w)?;
    }

    Ok(())
}

fn print_status_text<W: Write>(w: &mut W, status: &BoardStatus) -> io::Result<()> {
    writeln!(w, "{} {}", "Total tickets:".bold(), status.total_tickets)?;

    writeln!(w)?;
    writeln!(w, "{}", "By state:".bold())?;
    for entry in &status.by_state {
        writeln!(w, "  {:<12} {}", colorize_state(&entry.state), entry.count)?;
    }

    if !status.by_project.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", "By project:".bold())?;
        for entry in &status.by_project {
            writeln!(w, "  {:<12} {}", entry.name, entry.count)?;
        }
    }

    Ok(())
}

fn print_metrics_text<W: Write>(w: &mut W, report: &MetricsReport) -> io::Result<()> {
    writeln!(w, "{}", "Lead time (minutes):".bold())?;
    writeln!(
        w,
        "  mean {}  median {}  p90 {}  (n={})",
        report.lead_time.mean,
        report.lead_time.median,
        report.lead_time.p90,
        report.lead_time.sample_size
    )?;

    writeln!(w)?;
    writeln!(w, "{}", "Deployment frequency:".bold())?;
    writeln!(
        w,
        "  last day {}  last week {}  last month {}",
        report.deployment_frequency.daily,
        report.deployment_frequency.weekly,
        report.deployment_frequency.monthly
    )?;

    writeln!(w)?;
    writeln!(w, "{}", "Change failure rate:".bold())?;
    writeln!(
        w,
        "  {}% ({} of {} deployments)",
        report.change_failure_rate.failure_rate_percentage,
        report.change_failure_rate.failures,
        report.change_failure_rate.total_deployments
    )?;

    writeln!(w)?;
    writeln!(w, "{}", "Time to restore (minutes):".bold())?;
    writeln!(
        w,
        "  mean {}  median {}  p90 {}  (n={})",
        report.time_to_restore.mean,
        report.time_to_restore.median,
        report.time_to_restore.p90,
        report.time_to_restore.sample_size
    )?;

    writeln!(w)?;
    writeln!(w, "{}", "Completion:".bold())?;
    writeln!(
        w,
        "  {}% ({} of {} tickets done)",
        report.completion_rate.completion_rate_percentage,
        report.completion_rate.completed_tickets,
        report.completion_rate.total_tickets
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectId, StateId, TicketId, TypeId};
    use chrono::Utc;

    fn test_ticket() -> Ticket {
        Ticket {
            id: TicketId(3),
            project_id: ProjectId(1),
            type_id: TypeId(2),
            priority_id: None,
            state_id: StateId(1),
            what: "Wire up the parser".to_string(),
            why: None,
            acceptance_criteria: None,
            test_steps: None,
            created_date: Utc::now(),
            completed_date: None,
        }
    }

    fn test_states() -> Vec<TicketState> {
        vec![
            TicketState {
                id: StateId(1),
                name: "backlog".to_string(),
            },
            TicketState {
                id: StateId(4),
                name: "done".to_string(),
            },
        ]
    }

    #[test]
    fn tickets_text_lists_each_ticket() {
        let mut buffer = Vec::new();
        print_tickets_text(&mut buffer, &[test_ticket()], &test_states()).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("Found 1 ticket"));
        assert!(output.contains("#3"));
        assert!(output.contains("Wire up the parser"));
        assert!(output.contains("backlog"));
    }

    #[test]
    fn tickets_text_empty() {
        let mut buffer = Vec::new();
        print_tickets_text(&mut buffer, &[], &test_states()).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("No tickets found."));
    }

    #[test]
    fn ticket_details_text_includes_dependencies() {
        let view = TicketView {
            id: TicketId(3),
            project_id: ProjectId(1),
            type_id: TypeId(2),
            type_name: Some("story".to_string()),
            priority: None,
            priority_name: None,
            state: StateId(1),
            state_name: Some("backlog".to_string()),
            what: "Wire up the parser".to_string(),
            why: Some("Unblocks the importer".to_string()),
            acceptance_criteria: None,
            test_steps: None,
            created_date: Some(Utc::now()),
            completed_date: None,
            attachments: vec![],
            dependencies: vec![crate::domain::TicketRef {
                id: TicketId(2),
                what: "Define the grammar".to_string(),
                state: StateId(4),
                state_name: Some("done".to_string()),
            }],
            dependents: vec![],
            all_dependencies_resolved: true,
        };

        let mut buffer = Vec::new();
        print_ticket_details_text(&mut buffer, &view, &[]).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("Dependencies"));
        assert!(output.contains("#2"));
        assert!(output.contains("Unblocks the importer"));
        assert!(output.contains("all resolved"));
    }

    #[test]
    fn json_output_is_valid() {
        let mut buffer = Vec::new();
        print_json_to(&mut buffer, &[test_ticket()]).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["what"], "Wire up the parser");
    }
}
