//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use pipeline_api::retry::RECONNECT_DELAY;
use pipeline_api::url::DEFAULT_API_BASE_URL;
use pipeline_api::PipelineApiConfig;

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub api_url: String,
    pub ws_url: Option<String>,
    pub reconnect_delay: Duration,
    pub request_timeout: Option<Duration>,
    pub session_file: Option<PathBuf>,
    pub log_filter: String,
    pub log_file: Option<String>,
    pub debug: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_BASE_URL.to_string(),
            ws_url: None,
            reconnect_delay: RECONNECT_DELAY,
            request_timeout: None,
            session_file: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_file: None,
            debug: false,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env_string_opt("PIPELINE_API_URL").unwrap_or(defaults.api_url),
            ws_url: env_string_opt("PIPELINE_WS_URL"),
            reconnect_delay: env_u64("PIPELINE_RECONNECT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_delay),
            request_timeout: env_u64("PIPELINE_REQUEST_TIMEOUT_SEC")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            session_file: session_file_from_env(),
            log_filter: env_string_opt("PIPELINE_LOG").unwrap_or(defaults.log_filter),
            log_file: env_string_opt("PIPELINE_LOG_FILE"),
            debug: env_flag("PIPELINE_DEBUG"),
        }
    }

    /// Transport settings derived from this configuration.
    pub fn api_config(&self) -> PipelineApiConfig {
        let mut config =
            PipelineApiConfig::new(&self.api_url).with_reconnect_delay(self.reconnect_delay);
        if let Some(ws_url) = &self.ws_url {
            config = config.with_stream_base_url(ws_url);
        }
        if let Some(timeout) = self.request_timeout {
            config = config.with_timeout(timeout);
        }
        config
    }

    /// Filter directive handed to the log subscriber.
    pub fn log_directive(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_filter
        }
    }
}

/// `PIPELINE_SESSION_FILE` wins; `PIPELINE_SESSION_PERSIST=1` alone selects
/// the default file under the working directory.
fn session_file_from_env() -> Option<PathBuf> {
    if let Some(path) = env_string_opt("PIPELINE_SESSION_FILE") {
        return Some(PathBuf::from(path));
    }
    if !env_flag("PIPELINE_SESSION_PERSIST") {
        return None;
    }
    env::current_dir()
        .ok()
        .map(|cwd| session_store::default_session_file(&cwd))
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        }
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_string_opt(key).and_then(|value| value.parse().ok())
}
