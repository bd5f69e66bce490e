//! Plain-text rendering of controller state. Every function here is pure.

use std::fmt::Write as _;
use std::time::Duration;

use pipeline_monitor::{
    truncate_display, ChatMessage, ControllerSnapshot, PipelineView, Role, StageView,
    ValidationPanel,
};
use pipeline_protocol::{
    CheckStatus, HealthStatus, Scenario, StepEvent, StepName, StepStatus, ToolResult,
};

/// Widest cell shown in a result preview.
const CELL_WIDTH: usize = 24;
/// Rows shown per tool result.
const PREVIEW_ROWS: usize = 5;

pub fn status_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "○",
        StepStatus::Processing => "◉",
        StepStatus::Success => "✅",
        StepStatus::Failed => "❌",
        StepStatus::Retry => "🔄",
        StepStatus::Skipped => "⊘",
    }
}

fn check_icon(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Passed => "✓",
        CheckStatus::Failed => "✗",
        CheckStatus::Warning => "⚠",
    }
}

pub fn banner(endpoint: &str) -> String {
    format!("pipeline-console: streaming from {endpoint}\nType a message, or /help for commands.")
}

pub fn connection(connected: bool) -> String {
    if connected {
        "● connected".to_string()
    } else {
        "○ disconnected, reconnecting…".to_string()
    }
}

fn stage_line(stage: &StageView) -> String {
    let mut line = format!("  {} {}", status_icon(stage.status), stage.label());
    if !stage.detail.is_empty() {
        let _ = write!(line, ": {}", stage.detail);
    }
    if !stage.tools.is_empty() {
        let _ = write!(line, " [{}]", stage.tools.join(", "));
    }
    line
}

pub fn pipeline(view: &PipelineView) -> String {
    let mut out = String::from("Agent Pipeline");
    for stage in view.stages() {
        out.push('\n');
        out.push_str(&stage_line(&stage));
    }
    out
}

pub fn validation(panel: &ValidationPanel) -> String {
    let mut out = String::from("Schema Validation");
    for tool in &panel.tools {
        let verdict = if tool.valid { "valid" } else { "invalid" };
        let _ = write!(out, "\n  {} ({verdict})", tool.tool_name);
        for check in &tool.checks {
            let _ = write!(
                out,
                "\n    {} {} = {}",
                check_icon(check.outcome),
                check.parameter,
                check.value
            );
            if !check.detail.is_empty() {
                let _ = write!(out, " ({})", check.detail);
            }
        }
        for error in &tool.errors {
            let _ = write!(out, "\n    ! {error}");
        }
    }
    out
}

/// One line per step event, oldest first.
pub fn activity(events: &[StepEvent]) -> String {
    if events.is_empty() {
        return "No activity for the current request.".to_string();
    }
    events
        .iter()
        .map(activity_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn activity_line(event: &StepEvent) -> String {
    let marker = if event.step_name == StepName::Retry {
        "↻"
    } else {
        status_icon(event.status)
    };
    let mut line = format!("  {marker} {} {}", event.step_name, event.status);
    if !event.detail.is_empty() {
        let _ = write!(line, ": {}", event.detail);
    }
    line
}

fn latency(latency: Option<Duration>) -> String {
    match latency {
        Some(latency) => format!(" ({:.1}s)", latency.as_secs_f64()),
        None => String::new(),
    }
}

pub fn message(message: &ChatMessage) -> String {
    match message.role {
        Role::User => format!("you> {}", message.content),
        Role::Agent => {
            let mut out = format!("agent{}> {}", latency(message.latency), message.content);
            if let Some(result) = &message.result {
                if let Some(sql) = result.sql() {
                    let _ = write!(out, "\n  sql: {sql}");
                }
                for tool in &result.tool_results {
                    out.push('\n');
                    out.push_str(&tool_result(tool));
                }
            }
            out
        }
    }
}

pub fn tool_result(tool: &ToolResult) -> String {
    let output = &tool.result;
    if let Some(error) = output.error.as_deref().filter(|error| !error.is_empty()) {
        return format!("  [{}] error: {error}", tool.tool);
    }

    let mut out = format!("  [{}] {} row(s)", tool.tool, output.row_count());
    if output.simulated {
        out.push_str(" (simulated)");
    }
    if let Some(note) = output.note.as_deref() {
        let _ = write!(out, ": {note}");
    }

    let columns = output.display_columns();
    if columns.is_empty() || output.rows.is_empty() {
        return out;
    }
    let _ = write!(out, "\n    {}", columns.join(" | "));
    for row in output.rows.iter().take(PREVIEW_ROWS) {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| {
                let text = match row.get(column) {
                    Some(serde_json::Value::String(text)) => text.clone(),
                    Some(serde_json::Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                truncate_display(&text, CELL_WIDTH)
            })
            .collect();
        let _ = write!(out, "\n    {}", cells.join(" | "));
    }
    if output.rows.len() > PREVIEW_ROWS {
        let _ = write!(out, "\n    … {} more", output.rows.len() - PREVIEW_ROWS);
    }
    out
}

pub fn scenarios(scenarios: &[Scenario]) -> String {
    if scenarios.is_empty() {
        return "No scenarios available.".to_string();
    }
    let mut out = String::from("Scenarios (use /run <n>)");
    for (index, scenario) in scenarios.iter().enumerate() {
        let _ = write!(out, "\n  {}. {}", index + 1, scenario.title);
        if !scenario.subtitle.is_empty() {
            let _ = write!(out, " - {}", scenario.subtitle);
        }
    }
    out
}

pub fn health(health: &HealthStatus) -> String {
    let database = if health.database.connected {
        format!("{} tables", health.table_count())
    } else {
        "database offline".to_string()
    };
    format!(
        "backend {} | {database} | {} tools | v{}",
        health.status, health.mcp_tools, health.version
    )
}

pub fn status(snapshot: &ControllerSnapshot, endpoint: &str) -> String {
    format!(
        "{} | {} | session {} | {} message(s){}\nstream: {endpoint}",
        connection(snapshot.connected),
        if snapshot.busy { "busy" } else { "idle" },
        snapshot.session_id.as_deref().unwrap_or("(none)"),
        snapshot.transcript_len,
        latency(snapshot.last_latency),
    )
}
