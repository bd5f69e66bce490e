use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use pipeline_protocol::{ChatResult, HealthStatus, OutboundFrame, ResetRequest, ResetResponse, Scenario};

use crate::config::PipelineApiConfig;
use crate::error::{parse_error_message, PipelineApiError};
use crate::retry::{is_retryable_http_error, retry_delay, MAX_RETRIES};
use crate::url::api_endpoint;

pub const SCENARIOS_PATH: &str = "/api/scenarios";
pub const HEALTH_PATH: &str = "/api/health";
pub const CHAT_PATH: &str = "/api/chat";
pub const SESSION_RESET_PATH: &str = "/api/session/reset";

/// Request/response client for the backend's REST surface.
///
/// Reads are retried on transient failures; writes are sent exactly once.
#[derive(Debug, Clone)]
pub struct PipelineApiClient {
    http: Client,
    config: PipelineApiConfig,
}

impl PipelineApiClient {
    pub fn new(config: PipelineApiConfig) -> Result<Self, PipelineApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = config.user_agent.as_deref() {
            builder = builder.user_agent(user_agent.to_owned());
        }
        let http = builder.build().map_err(PipelineApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &PipelineApiConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> String {
        api_endpoint(&self.config.api_base_url, path)
    }

    pub async fn scenarios(&self) -> Result<Vec<Scenario>, PipelineApiError> {
        let response = self.get_with_retry(SCENARIOS_PATH).await?;
        decode_json(response).await
    }

    pub async fn health(&self) -> Result<HealthStatus, PipelineApiError> {
        let response = self.get_with_retry(HEALTH_PATH).await?;
        decode_json(response).await
    }

    /// Run one request without streaming and return the final result.
    pub async fn chat(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatResult, PipelineApiError> {
        let body = OutboundFrame::new(message, session_id.map(ToOwned::to_owned));
        let response = self
            .http
            .post(self.endpoint(CHAT_PATH))
            .json(&body)
            .send()
            .await?;
        decode_json(ensure_success(response).await?).await
    }

    pub async fn reset_session(&self, session_id: &str) -> Result<ResetResponse, PipelineApiError> {
        let body = ResetRequest {
            session_id: session_id.to_owned(),
        };
        let response = self
            .http
            .post(self.endpoint(SESSION_RESET_PATH))
            .json(&body)
            .send()
            .await?;
        decode_json(ensure_success(response).await?).await
    }

    async fn get_with_retry(&self, path: &str) -> Result<Response, PipelineApiError> {
        let url = self.endpoint(path);
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status);
                    let body = response.text().await.unwrap_or_default();
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        debug!(%url, attempt, %status, "retrying REST read");
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }
                    return Err(PipelineApiError::Status(status, message));
                }
                Err(error) => {
                    let message = error.to_string();
                    let transient = error.is_connect()
                        || error.is_timeout()
                        || is_retryable_http_error(0, &message);
                    last_error = Some(message);

                    if attempt < MAX_RETRIES && transient {
                        debug!(%url, attempt, %error, "retrying REST read after transport error");
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }
                    if !transient {
                        return Err(PipelineApiError::Request(error));
                    }
                    warn!(%url, attempts = attempt + 1, "REST read retries exhausted");
                    return Err(PipelineApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(PipelineApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }
}

async fn ensure_success(response: Response) -> Result<Response, PipelineApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineApiError::Status(
        status,
        parse_error_message(status, &body),
    ))
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, PipelineApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(PipelineApiError::from)
}
