// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated transport to the hosted messages endpoint.
//!
//! Rate-limit (429) and overload (503, 529) replies are retried here with backoff;
//! everything else surfaces to the adapter as a [`TollgateError`].

use std::time::Duration;

use reqwest::header::HeaderValue;
use tollgate_config::model::AnthropicConfig;
use tollgate_core::TollgateError;
use tracing::{debug, warn};

use crate::retry::{RetryKind, RetryPolicy};
use crate::sse::{self, EventStream};
use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

pub(crate) const PROVIDER: &str = "anthropic";
pub(crate) const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Cloneable handle; the underlying connection pool is shared.
#[derive(Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: Option<String>,
    api_version: String,
    base_url: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}

impl AnthropicClient {
    /// Creates a client. A `None` key is accepted here and reported as
    /// [`TollgateError::MissingCredential`] on the first call.
    pub fn new(config: &AnthropicConfig, api_key: Option<String>) -> Result<Self, TollgateError> {
        HeaderValue::from_str(&config.api_version).map_err(|e| {
            TollgateError::Config(format!("invalid API version header value: {e}"))
        })?;
        if let Some(key) = &api_key {
            HeaderValue::from_str(key).map_err(|e| {
                TollgateError::Config(format!("invalid API key header value: {e}"))
            })?;
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TollgateError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            api_key,
            api_version: config.api_version.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from_config(config),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sends a non-streaming request and returns the full response.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, TollgateError> {
        let mut req = request.clone();
        req.stream = false;

        let response = self.send_with_retry(&req).await?;
        let body = response.text().await.map_err(connection_error)?;
        serde_json::from_str(&body).map_err(|e| TollgateError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Sends a streaming request and returns a stream of SSE events.
    ///
    /// Retries apply only until the stream is established.
    pub async fn stream_message(
        &self,
        request: &MessageRequest,
    ) -> Result<EventStream, TollgateError> {
        let mut req = request.clone();
        req.stream = true;

        let response = self.send_with_retry(&req).await?;
        Ok(sse::parse_sse_stream(response))
    }

    /// Cheap authenticated probe against `GET /v1/models`.
    pub async fn probe(&self) -> Result<(), TollgateError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(format!("{}/v1/models?limit=1", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status.as_u16(), &body))
        }
    }

    async fn send_with_retry(
        &self,
        request: &MessageRequest,
    ) -> Result<reqwest::Response, TollgateError> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1/messages", self.base_url);

        for attempt in 0..=self.retry.max_retries {
            // Transport failures have no status to classify; they are not retried.
            let response = self
                .client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", &self.api_version)
                .json(request)
                .send()
                .await
                .map_err(connection_error)?;

            let status = response.status();
            debug!(status = %status, attempt, model = %request.model, "messages response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            match RetryKind::classify(status.as_u16()) {
                Some(kind) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(kind, attempt);
                    warn!(
                        status = %status,
                        retry = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retryable status from Anthropic, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(status_error(status.as_u16(), &body)),
            }
        }

        Err(TollgateError::Internal(
            "retry loop ended without a response".into(),
        ))
    }

    fn api_key(&self) -> Result<&str, TollgateError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| TollgateError::MissingCredential {
                provider: PROVIDER.into(),
                env_var: API_KEY_ENV.into(),
            })
    }
}

/// Builds the status error, preferring the API's structured error message.
fn status_error(status: u16, body: &str) -> TollgateError {
    let body = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!("{}: {}", api_err.error.kind, api_err.error.message),
        Err(_) => body.to_string(),
    };
    TollgateError::BackendStatus {
        provider: PROVIDER.into(),
        status,
        body,
    }
}

fn connection_error(e: reqwest::Error) -> TollgateError {
    TollgateError::Connection {
        provider: PROVIDER.into(),
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}
