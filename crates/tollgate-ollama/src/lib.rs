// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama local provider adapter for Tollgate.
//!
//! Implements [`ProviderAdapter`] against Ollama's native `/api/chat`
//! endpoint. System text travels in-band as a `system` message, tool results
//! as `tool` messages, and tool-call arguments are normalized whether the
//! model emitted an object or a JSON string.

pub mod client;
pub mod stream;
pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tollgate_config::model::OllamaConfig;
use tollgate_core::{
    ChunkSink, Completion, CompletionRequest, FinishReason, Message, ProviderAdapter,
    ProviderKind, Role, TokenUsage, TollgateError, ToolCall, normalize_arguments,
};
use tracing::{debug, info};

use crate::client::{OllamaClient, PROVIDER};
use crate::types::{
    ChatMessage, ChatOptions, ChatRequest, ChatResponse, FunctionDefinition, ToolDefinition,
    WireFunction, WireToolCall,
};

/// Local backend provider backed by an Ollama server.
pub struct OllamaProvider {
    client: OllamaClient,
}

impl OllamaProvider {
    /// Creates a provider from the `[ollama]` config section.
    pub fn new(config: &OllamaConfig) -> Result<Self, TollgateError> {
        let client = OllamaClient::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
        info!(base_url = %client.base_url(), "Ollama provider initialized");
        Ok(Self { client })
    }

    /// Creates a provider with an existing client.
    pub fn with_client(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn generate(
        &self,
        request: CompletionRequest,
        on_chunk: Option<ChunkSink>,
    ) -> Result<Completion, TollgateError> {
        let chat = to_chat_request(&request);
        let response = match on_chunk {
            Some(sink) if request.stream => self.client.chat_stream(&chat, &sink).await?,
            _ => self.client.chat(&chat).await?,
        };
        let completion = from_chat_response(response, &request.model);
        debug!(
            model = %completion.model,
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            finish_reason = %completion.finish_reason,
            "ollama completion"
        );
        Ok(completion)
    }

    async fn available(&self) -> bool {
        match self.client.tags().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "ollama liveness probe failed");
                false
            }
        }
    }

    async fn loaded_models(&self) -> Result<Vec<String>, TollgateError> {
        let list = self.client.running().await?;
        Ok(list.models.into_iter().map(|m| m.name).collect())
    }
}

/// Translate the normalized request into Ollama's chat shape.
fn to_chat_request(request: &CompletionRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        messages.push(ChatMessage {
            role: "system".into(),
            content: system.to_string(),
            ..Default::default()
        });
    }

    // Ollama names tool results by tool name rather than call id.
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    for message in &request.messages {
        for call in &message.tool_calls {
            call_names.insert(call.id.as_str(), call.name.as_str());
        }
        messages.push(to_chat_message(message, &call_names));
    }

    let tools = request
        .tools
        .iter()
        .map(|t| ToolDefinition {
            tool_type: "function",
            function: FunctionDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect();

    ChatRequest {
        model: request.model.clone(),
        messages,
        stream: request.stream,
        options: ChatOptions {
            temperature: request.temperature,
            num_ctx: request.context_window,
            num_predict: request.max_tokens,
        },
        tools,
    }
}

fn to_chat_message(message: &Message, call_names: &HashMap<&str, &str>) -> ChatMessage {
    let content = message.text().to_string();
    match message.role {
        Role::System => ChatMessage {
            role: "system".into(),
            content,
            ..Default::default()
        },
        Role::User => ChatMessage {
            role: "user".into(),
            content,
            ..Default::default()
        },
        Role::Assistant => ChatMessage {
            role: "assistant".into(),
            content,
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: serde_json::Value::Object(call.arguments.clone()),
                    },
                })
                .collect(),
            tool_name: None,
        },
        Role::Tool => ChatMessage {
            role: "tool".into(),
            content,
            tool_calls: Vec::new(),
            tool_name: message
                .tool_call_id
                .as_deref()
                .and_then(|id| call_names.get(id))
                .map(|name| name.to_string()),
        },
    }
}

/// Translate Ollama's response into the normalized completion.
fn from_chat_response(response: ChatResponse, requested_model: &str) -> Completion {
    let tool_calls: Vec<ToolCall> = response
        .message
        .tool_calls
        .into_iter()
        .map(|call| ToolCall {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: call.function.name,
            arguments: normalize_arguments(&call.function.arguments),
        })
        .collect();

    let finish_reason = if !tool_calls.is_empty() {
        FinishReason::ToolUse
    } else if response.done_reason.as_deref() == Some("length") {
        FinishReason::Length
    } else {
        FinishReason::Stop
    };

    let content = response.message.content;
    let model = if response.model.is_empty() {
        requested_model.to_string()
    } else {
        response.model
    };

    Completion {
        model,
        content: (!content.is_empty()).then_some(content),
        tool_calls,
        usage: TokenUsage::new(
            response.prompt_eval_count.unwrap_or(0),
            response.eval_count.unwrap_or(0),
        ),
        finish_reason,
    }
}
