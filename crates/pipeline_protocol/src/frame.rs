use serde::{Deserialize, Serialize};

use crate::result::ChatResult;
use crate::step::StepEvent;

/// Fallback text for error frames that carry no message.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Server-to-client streaming frame, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Assigns or confirms the conversation session id.
    Session { session_id: String },
    /// One pipeline step observation.
    Event(StepEvent),
    /// Terminal success for the current cycle.
    Result(ChatResult),
    /// Terminal failure for the current cycle.
    Error {
        #[serde(default)]
        error: Option<String>,
        /// Backend traceback, diagnostic only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl InboundFrame {
    /// Parses one JSON frame.
    ///
    /// Returns `None` for anything that is not a well-formed, known frame:
    /// invalid JSON, a missing or unknown `type`, or a malformed body.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Returns true when this frame ends a request cycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_) | Self::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::Event(_) => "event",
            Self::Result(_) => "result",
            Self::Error { .. } => "error",
        }
    }

    /// Error text of an error frame, with the unknown-error fallback applied.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error, .. } => Some(
                error
                    .as_deref()
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or(UNKNOWN_ERROR),
            ),
            _ => None,
        }
    }
}

/// Client-to-server streaming frame. `session_id` is always serialized,
/// as `null` when the server should assign one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: String,
    pub session_id: Option<String>,
}

impl OutboundFrame {
    #[must_use]
    pub fn new(message: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            session_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
