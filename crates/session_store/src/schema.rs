use serde::{Deserialize, Serialize};

pub const SESSION_RECORD_VERSION: u32 = 1;

/// On-disk form of a persisted session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionRecord {
    pub version: u32,
    pub session_id: String,
    pub saved_at: String,
}

impl SessionRecord {
    #[must_use]
    pub fn v1(session_id: impl Into<String>, saved_at: impl Into<String>) -> Self {
        Self {
            version: SESSION_RECORD_VERSION,
            session_id: session_id.into(),
            saved_at: saved_at.into(),
        }
    }
}
