use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::step::StepEvent;

/// Terminal success payload for one request cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    pub session_id: String,
    pub agent_response: String,
    #[serde(default)]
    pub sql_used: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub events: Vec<StepEvent>,
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
    #[serde(default)]
    pub had_retry: bool,
}

impl ChatResult {
    /// SQL text used by the backend, if any was recorded.
    pub fn sql(&self) -> Option<&str> {
        non_empty(&self.sql_used)
    }

    pub fn intent(&self) -> Option<&str> {
        non_empty(&self.intent)
    }
}

/// Output of one executed tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub result: ToolOutput,
}

/// Tabular rows/columns on success, or an error message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Tool-specific fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolOutput {
    /// Row count reported by the backend, falling back to the rows received.
    pub fn row_count(&self) -> u64 {
        self.row_count.unwrap_or(self.rows.len() as u64)
    }

    /// Column order for display: explicit `columns`, else keys of the first row.
    pub fn display_columns(&self) -> Vec<String> {
        if !self.columns.is_empty() {
            return self.columns.clone();
        }
        self.rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
