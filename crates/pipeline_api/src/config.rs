use std::time::Duration;

use crate::retry::RECONNECT_DELAY;
use crate::url::DEFAULT_API_BASE_URL;

/// Endpoint and timing configuration for the REST client and stream channel.
#[derive(Debug, Clone)]
pub struct PipelineApiConfig {
    /// Base URL for REST endpoints.
    pub api_base_url: String,
    /// Optional base URL for the streaming endpoint; derived from
    /// `api_base_url` when unset.
    pub stream_base_url: Option<String>,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Optional REST request timeout. Stream cycles never time out.
    pub timeout: Option<Duration>,
    /// Optional `User-Agent` override for REST requests.
    pub user_agent: Option<String>,
}

impl Default for PipelineApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            stream_base_url: None,
            reconnect_delay: RECONNECT_DELAY,
            timeout: None,
            user_agent: None,
        }
    }
}

impl PipelineApiConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_stream_base_url(mut self, stream_base_url: impl Into<String>) -> Self {
        self.stream_base_url = Some(stream_base_url.into());
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
