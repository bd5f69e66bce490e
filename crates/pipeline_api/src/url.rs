use url::Url;

use crate::error::PipelineApiError;

/// Default base URL for REST requests.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
/// Path of the streaming endpoint, relative to the stream base.
pub const STREAM_PATH: &str = "/api/chat/stream";

/// Trim a base URL, falling back to [`DEFAULT_API_BASE_URL`] when blank.
pub fn normalize_api_base(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_API_BASE_URL
    } else {
        input.trim()
    };
    base.trim_end_matches('/').to_string()
}

/// Join a REST path onto a base URL.
pub fn api_endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        normalize_api_base(base),
        path.trim_start_matches('/')
    )
}

/// Resolve the streaming endpoint URL.
///
/// Rules:
/// 1) an explicit stream base wins over the API base
/// 2) `http`/`https` bases map to `ws`/`wss`
/// 3) [`STREAM_PATH`] is appended unless already present
pub fn stream_endpoint(
    api_base: &str,
    stream_base: Option<&str>,
) -> Result<String, PipelineApiError> {
    let base = match stream_base.map(str::trim).filter(|value| !value.is_empty()) {
        Some(explicit) => explicit.trim_end_matches('/').to_string(),
        None => normalize_api_base(api_base),
    };

    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base
    };

    let endpoint = if base.ends_with(STREAM_PATH) {
        base
    } else {
        format!("{base}{STREAM_PATH}")
    };

    let parsed = Url::parse(&endpoint)
        .map_err(|error| PipelineApiError::InvalidBaseUrl(format!("{endpoint}: {error}")))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(PipelineApiError::InvalidBaseUrl(format!(
            "{endpoint}: unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    Ok(endpoint)
}
