// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Ollama REST API.
//!
//! One attempt per call: the local backend has no retry policy, a failure is
//! handed straight back so the router can escalate.

use std::time::Duration;

use futures::StreamExt;
use tollgate_core::{ChunkSink, TollgateError};
use tracing::debug;

use crate::stream::StreamAggregate;
use crate::types::{ChatRequest, ChatResponse, ModelList};

pub(crate) const PROVIDER: &str = "ollama";

/// HTTP client for a single Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Creates a client for `base_url` with a whole-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TollgateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TollgateError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TollgateError> {
        let mut req = request.clone();
        req.stream = false;

        let response = self.post_chat(&req).await?;
        let body = response.text().await.map_err(connection_error)?;
        serde_json::from_str(&body).map_err(|e| TollgateError::Provider {
            message: format!("failed to parse ollama response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Streaming chat completion. Content is forwarded to `on_chunk` as it
    /// arrives; the aggregated response is returned once the stream is done.
    pub async fn chat_stream(
        &self,
        request: &ChatRequest,
        on_chunk: &ChunkSink,
    ) -> Result<ChatResponse, TollgateError> {
        let mut req = request.clone();
        req.stream = true;

        let response = self.post_chat(&req).await?;
        let mut bytes = response.bytes_stream();
        let mut aggregate = StreamAggregate::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(connection_error)?;
            aggregate.push_bytes(&chunk, on_chunk)?;
        }
        aggregate.finish(on_chunk)
    }

    /// Installed models (`GET /api/tags`).
    pub async fn tags(&self) -> Result<ModelList, TollgateError> {
        self.get_json("/api/tags").await
    }

    /// Models currently loaded in memory (`GET /api/ps`).
    pub async fn running(&self) -> Result<ModelList, TollgateError> {
        self.get_json("/api/ps").await
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<reqwest::Response, TollgateError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        debug!(status = %status, model = %request.model, "ollama chat response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TollgateError::BackendStatus {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_json(&self, path: &str) -> Result<ModelList, TollgateError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TollgateError::BackendStatus {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }
        response.json().await.map_err(|e| TollgateError::Provider {
            message: format!("failed to parse ollama {path} response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

fn connection_error(e: reqwest::Error) -> TollgateError {
    TollgateError::Connection {
        provider: PROVIDER.into(),
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}
