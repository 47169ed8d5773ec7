// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes for the hosted messages endpoint.
//!
//! Request-side types only serialize; response and stream-event types only
//! deserialize, except where tests need both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker of a wire message. The endpoint has no system or tool role:
/// system text travels in [`MessageRequest::system`] and tool results ride in
/// user turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRole {
    User,
    Assistant,
}

/// Tool offered to the model; `input_schema` is the arguments JSON Schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: ApiRole,
    pub content: ApiContent,
}

/// Plain text turns serialize as a bare string, tool traffic as blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiContentBlock {
    Text {
        text: String,
    },
    /// Replayed from an earlier assistant turn.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// Non-streamed reply body, also embedded in the `message_start` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Vec<ResponseContentBlock>,
    #[serde(default)]
    pub model: String,
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: ApiUsage,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    /// Thinking and any block kinds added later.
    #[serde(other)]
    Other,
}

/// Token counts. Stream deltas report only `output_tokens`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageStart {
    pub message: MessageResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockStart {
    pub index: usize,
    pub content_block: ResponseContentBlock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockDelta {
    pub index: usize,
    pub delta: SseDelta,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseDelta {
    TextDelta {
        text: String,
    },
    /// Fragment of tool arguments; only valid JSON once the block stops.
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockStop {
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageDelta {
    pub delta: SseStopInfo,
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseStopInfo {
    pub stop_reason: Option<String>,
}

/// Body of non-2xx replies and of in-stream `error` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_system_and_tools() {
        let req = MessageRequest {
            model: "claude-haiku".into(),
            messages: vec![ApiMessage {
                role: ApiRole::User,
                content: ApiContent::Text("route me".into()),
            }],
            system: None,
            max_tokens: 512,
            temperature: 0.2,
            stream: true,
            tools: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("system").is_none());
        assert!(value.get("tools").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "route me");
    }

    #[test]
    fn tool_definition_uses_input_schema_key() {
        let tool = ToolDefinition {
            name: "lookup_invoice".into(),
            description: "Find an invoice by number".into(),
            input_schema: json!({"type": "object", "required": ["number"]}),
        };
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["input_schema"]["required"][0], "number");
        assert!(value.get("parameters").is_none());
    }

    #[test]
    fn tool_result_block_is_tagged() {
        let msg = ApiMessage {
            role: ApiRole::User,
            content: ApiContent::Blocks(vec![ApiContentBlock::ToolResult {
                tool_use_id: "toolu_7".into(),
                content: "paid".into(),
            }]),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["content"][0]["type"], "tool_result");
        assert_eq!(value["content"][0]["tool_use_id"], "toolu_7");
    }

    #[test]
    fn unknown_response_blocks_become_other() {
        let resp: MessageResponse = serde_json::from_value(json!({
            "id": "msg_9",
            "content": [
                {"type": "redacted_thinking", "data": "..."},
                {"type": "tool_use", "id": "toolu_1", "name": "lookup_invoice", "input": {"number": 4}}
            ],
            "model": "claude-haiku",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 11, "output_tokens": 6}
        }))
        .unwrap();
        assert!(matches!(resp.content[0], ResponseContentBlock::Other));
        assert!(matches!(
            &resp.content[1],
            ResponseContentBlock::ToolUse { name, .. } if name == "lookup_invoice"
        ));
        assert_eq!(resp.usage.input_tokens, 11);
    }

    #[test]
    fn delta_usage_defaults_missing_input() {
        let usage: ApiUsage = serde_json::from_str(r#"{"output_tokens": 15}"#).unwrap();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 15);
    }

    #[test]
    fn error_detail_reads_type_field() {
        let body: ApiErrorResponse = serde_json::from_value(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "busy"}
        }))
        .unwrap();
        assert_eq!(body.error.kind, "overloaded_error");
    }
}
