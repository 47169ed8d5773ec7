// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic cloud provider adapter for Tollgate.
//!
//! This crate implements [`ProviderAdapter`] for the Anthropic Messages API,
//! providing both single-shot completion and streaming SSE responses.

pub mod client;
pub mod retry;
pub mod sse;
pub mod types;

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use tollgate_config::model::AnthropicConfig;
use tollgate_core::{
    ChunkSink, Completion, CompletionRequest, FinishReason, Message, ProviderAdapter,
    ProviderKind, Role, TokenUsage, TollgateError, ToolCall, normalize_arguments,
};
use tracing::{debug, info, warn};

use crate::client::{API_KEY_ENV, AnthropicClient, PROVIDER};
use crate::sse::{EventStream, StreamEvent};
use crate::types::{
    ApiContent, ApiContentBlock, ApiMessage, ApiRole, MessageRequest, MessageResponse,
    ResponseContentBlock, SseDelta, ToolDefinition,
};

/// Cloud backend provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `ANTHROPIC_API_KEY` env var -> none.
/// A missing key only fails when a call is actually made.
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    /// Creates a provider from the `[anthropic]` config section.
    pub fn new(config: &AnthropicConfig) -> Result<Self, TollgateError> {
        let api_key = resolve_api_key(&config.api_key);
        if api_key.is_none() {
            warn!("no Anthropic API key configured; cloud tiers will fail with a credential error");
        }
        let client = AnthropicClient::new(config, api_key)?;
        info!(base_url = %config.base_url, "Anthropic provider initialized");
        Ok(Self { client })
    }

    /// Creates a provider with an existing client.
    pub fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    async fn generate(
        &self,
        request: CompletionRequest,
        on_chunk: Option<ChunkSink>,
    ) -> Result<Completion, TollgateError> {
        let api_request = to_message_request(&request);
        let completion = match on_chunk {
            Some(sink) if request.stream => {
                let events = self.client.stream_message(&api_request).await?;
                collect_stream(events, &sink, &request.model).await?
            }
            _ => {
                let response = self.client.complete_message(&api_request).await?;
                from_message_response(response, &request.model)
            }
        };
        debug!(
            model = %completion.model,
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            finish_reason = %completion.finish_reason,
            "anthropic completion"
        );
        Ok(completion)
    }

    async fn available(&self) -> bool {
        match self.client.probe().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "anthropic liveness probe failed");
                false
            }
        }
    }
}

/// Resolves the API key from config, then the environment.
fn resolve_api_key(config_key: &Option<String>) -> Option<String> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Some(key.clone());
    }
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// Converts the normalized request to a Messages API request.
///
/// System messages are lifted into the top-level `system` field. Consecutive
/// tool results are merged into a single user turn.
fn to_message_request(request: &CompletionRequest) -> MessageRequest {
    let mut system_parts: Vec<&str> = Vec::new();
    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        system_parts.push(system);
    }

    let mut messages: Vec<ApiMessage> = Vec::new();
    let mut pending_results: Vec<ApiContentBlock> = Vec::new();

    for message in &request.messages {
        if message.role == Role::Tool {
            pending_results.push(ApiContentBlock::ToolResult {
                tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                content: message.text().to_string(),
            });
            continue;
        }
        flush_tool_results(&mut messages, &mut pending_results);

        match message.role {
            Role::System => {
                if !message.text().is_empty() {
                    system_parts.push(message.text());
                }
            }
            Role::User => messages.push(ApiMessage {
                role: ApiRole::User,
                content: ApiContent::Text(message.text().to_string()),
            }),
            Role::Assistant => messages.push(assistant_message(message)),
            Role::Tool => {}
        }
    }
    flush_tool_results(&mut messages, &mut pending_results);

    let tools: Vec<ToolDefinition> = request
        .tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.parameters.clone(),
        })
        .collect();

    MessageRequest {
        model: request.model.clone(),
        messages,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream: request.stream,
        tools: (!tools.is_empty()).then_some(tools),
    }
}

fn flush_tool_results(messages: &mut Vec<ApiMessage>, pending: &mut Vec<ApiContentBlock>) {
    if pending.is_empty() {
        return;
    }
    messages.push(ApiMessage {
        role: ApiRole::User,
        content: ApiContent::Blocks(std::mem::take(pending)),
    });
}

fn assistant_message(message: &Message) -> ApiMessage {
    if message.tool_calls.is_empty() {
        return ApiMessage {
            role: ApiRole::Assistant,
            content: ApiContent::Text(message.text().to_string()),
        };
    }

    let mut blocks = Vec::with_capacity(message.tool_calls.len() + 1);
    if !message.text().is_empty() {
        blocks.push(ApiContentBlock::Text {
            text: message.text().to_string(),
        });
    }
    blocks.extend(message.tool_calls.iter().map(|call| ApiContentBlock::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: serde_json::Value::Object(call.arguments.clone()),
    }));

    ApiMessage {
        role: ApiRole::Assistant,
        content: ApiContent::Blocks(blocks),
    }
}

/// Collapses the API's stop vocabulary into [`FinishReason`].
fn map_stop_reason(stop_reason: Option<&str>, has_tool_calls: bool) -> FinishReason {
    match stop_reason {
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolUse,
        Some("end_turn" | "stop_sequence" | "stop") => FinishReason::Stop,
        _ if has_tool_calls => FinishReason::ToolUse,
        _ => FinishReason::Stop,
    }
}

fn from_message_response(response: MessageResponse, requested_model: &str) -> Completion {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ResponseContentBlock::Text { text: t } => text.push_str(&t),
            ResponseContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                arguments: normalize_arguments(&input),
            }),
            ResponseContentBlock::Other => {}
        }
    }

    Completion {
        model: if response.model.is_empty() {
            requested_model.to_string()
        } else {
            response.model
        },
        finish_reason: map_stop_reason(response.stop_reason.as_deref(), !tool_calls.is_empty()),
        content: (!text.is_empty()).then_some(text),
        tool_calls,
        usage: TokenUsage::new(response.usage.input_tokens, response.usage.output_tokens),
    }
}

/// A tool_use block being assembled from JSON deltas.
struct PendingToolUse {
    id: String,
    name: String,
    json: String,
}

/// Drains an SSE stream into a completion, forwarding text deltas to `sink`.
async fn collect_stream(
    mut events: EventStream,
    sink: &ChunkSink,
    requested_model: &str,
) -> Result<Completion, TollgateError> {
    let mut model = requested_model.to_string();
    let mut text = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    let mut pending: BTreeMap<usize, PendingToolUse> = BTreeMap::new();
    let mut input_tokens = 0;
    let mut output_tokens = 0;
    let mut stop_reason: Option<String> = None;
    let mut finished = false;

    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::MessageStart(start) => {
                if !start.message.model.is_empty() {
                    model = start.message.model;
                }
                input_tokens = start.message.usage.input_tokens;
                output_tokens = start.message.usage.output_tokens;
            }
            StreamEvent::ContentBlockStart(block) => {
                if let ResponseContentBlock::ToolUse { id, name, .. } = block.content_block {
                    pending.insert(
                        block.index,
                        PendingToolUse {
                            id,
                            name,
                            json: String::new(),
                        },
                    );
                }
            }
            StreamEvent::ContentBlockDelta(delta) => match delta.delta {
                SseDelta::TextDelta { text: t } => {
                    sink(&t);
                    text.push_str(&t);
                }
                SseDelta::InputJsonDelta { partial_json } => {
                    if let Some(tool) = pending.get_mut(&delta.index) {
                        tool.json.push_str(&partial_json);
                    }
                }
                SseDelta::Other => {}
            },
            StreamEvent::ContentBlockStop(stop) => {
                if let Some(tool) = pending.remove(&stop.index) {
                    tool_calls.push(ToolCall {
                        id: tool.id,
                        name: tool.name,
                        arguments: normalize_arguments(&serde_json::Value::String(tool.json)),
                    });
                }
            }
            StreamEvent::MessageDelta(delta) => {
                if delta.delta.stop_reason.is_some() {
                    stop_reason = delta.delta.stop_reason;
                }
                if let Some(usage) = delta.usage {
                    output_tokens = usage.output_tokens;
                    if usage.input_tokens > 0 {
                        input_tokens = usage.input_tokens;
                    }
                }
            }
            StreamEvent::MessageStop => {
                finished = true;
                break;
            }
            StreamEvent::Ping => {}
            StreamEvent::Error(err) => {
                return Err(TollgateError::Provider {
                    message: format!(
                        "Anthropic stream error ({}): {}",
                        err.error.kind, err.error.message
                    ),
                    source: None,
                });
            }
        }
    }

    if !finished {
        return Err(TollgateError::Provider {
            message: "Anthropic stream ended before message_stop".into(),
            source: None,
        });
    }

    Ok(Completion {
        model,
        finish_reason: map_stop_reason(stop_reason.as_deref(), !tool_calls.is_empty()),
        content: (!text.is_empty()).then_some(text),
        tool_calls,
        usage: TokenUsage::new(input_tokens, output_tokens),
    })
}
