use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Fixed pipeline stages in display order. `retry` is deliberately absent.
pub const PIPELINE_STEPS: [StepName; 5] = [
    StepName::Intent,
    StepName::ToolSelection,
    StepName::SchemaValidation,
    StepName::Execution,
    StepName::Response,
];

/// Pipeline stage a [`StepEvent`] reports on.
///
/// Unknown names coming off the wire are preserved as [`StepName::Other`] so
/// they still land in the chronological log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepName {
    Intent,
    ToolSelection,
    SchemaValidation,
    Execution,
    Response,
    Retry,
    Other(String),
}

impl StepName {
    pub fn parse(value: &str) -> Self {
        match value {
            "intent" => Self::Intent,
            "tool_selection" => Self::ToolSelection,
            "schema_validation" => Self::SchemaValidation,
            "execution" => Self::Execution,
            "response" => Self::Response,
            "retry" => Self::Retry,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Intent => "intent",
            Self::ToolSelection => "tool_selection",
            Self::SchemaValidation => "schema_validation",
            Self::Execution => "execution",
            Self::Response => "response",
            Self::Retry => "retry",
            Self::Other(value) => value,
        }
    }

    /// Returns true for the five fixed stages of [`PIPELINE_STEPS`].
    #[must_use]
    pub fn is_pipeline_step(&self) -> bool {
        !matches!(self, Self::Retry | Self::Other(_))
    }

    /// Human-facing stage label.
    pub fn label(&self) -> &str {
        match self {
            Self::Intent => "Intent Recognition",
            Self::ToolSelection => "Tool Selection",
            Self::SchemaValidation => "Schema Validation",
            Self::Execution => "Execution",
            Self::Response => "Response Generation",
            Self::Retry => "Auto-Retry",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for StepName {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<StepName> for String {
    fn from(value: StepName) -> Self {
        match value {
            StepName::Other(value) => value,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failed,
    Retry,
    Skipped,
}

impl StepStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "success" => Self::Success,
            "failed" => Self::Failed,
            "retry" => Self::Retry,
            "skipped" => Self::Skipped,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Retry => "retry",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation about a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_name: StepName,
    pub status: StepStatus,
    #[serde(default)]
    pub detail: String,
    #[serde(default, deserialize_with = "object_or_empty")]
    pub data: Map<String, Value>,
}

impl StepEvent {
    #[must_use]
    pub fn new(step_name: StepName, status: StepStatus, detail: impl Into<String>) -> Self {
        Self {
            step_name,
            status,
            detail: detail.into(),
            data: Map::new(),
        }
    }

    /// Attaches a payload. Non-object values are stored under `"value"`.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_owned(), other);
                map
            }
        };
        self
    }

    /// Tools announced by a `tool_selection` event (`data.tools`).
    pub fn selected_tools(&self) -> Vec<SelectedTool> {
        self.data
            .get("tools")
            .and_then(|tools| Vec::<SelectedTool>::deserialize(tools).ok())
            .unwrap_or_default()
    }

    /// Per-tool validation reports carried by a `schema_validation` event
    /// (`data.validation`). `None` when the payload has no usable report.
    pub fn validation_reports(&self) -> Option<Vec<ValidationReport>> {
        let reports = self.data.get("validation")?;
        Vec::<ValidationReport>::deserialize(reports).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedTool {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Backend-reported schema check for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tool_name: String,
    pub valid: bool,
    #[serde(default)]
    pub checks: Vec<ValidationCheck>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub parameter: String,
    #[serde(default, deserialize_with = "value_as_text")]
    pub value: String,
    pub status: CheckStatus,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Warning => "warning",
        }
    }
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn value_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
