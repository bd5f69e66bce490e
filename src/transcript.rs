use std::time::Duration;

use pipeline_protocol::ChatResult;
use time::OffsetDateTime;

/// Prefix that sets backend failures apart from normal agent responses.
pub const ERROR_MESSAGE_PREFIX: &str = "❌ Error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: OffsetDateTime,
    /// Wall-clock time from dispatch to the terminal frame; agent turns only.
    pub latency: Option<Duration>,
    pub result: Option<ChatResult>,
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            latency: None,
            result: None,
            is_error: false,
        }
    }

    pub fn agent(result: ChatResult, latency: Option<Duration>) -> Self {
        Self {
            role: Role::Agent,
            content: result.agent_response.clone(),
            timestamp: OffsetDateTime::now_utc(),
            latency,
            result: Some(result),
            is_error: false,
        }
    }

    pub fn agent_error(message: &str, latency: Option<Duration>) -> Self {
        Self {
            role: Role::Agent,
            content: format!("{ERROR_MESSAGE_PREFIX}{message}"),
            timestamp: OffsetDateTime::now_utc(),
            latency,
            result: None,
            is_error: true,
        }
    }
}
