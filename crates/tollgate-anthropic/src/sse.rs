// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decodes a streamed reply body into [`StreamEvent`]s.
//!
//! Framing is left to `eventsource-stream`; this module only maps event
//! names onto the payload types in [`crate::types`].

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tollgate_core::TollgateError;

use crate::types::{
    ApiErrorResponse, SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop,
    SseMessageDelta, SseMessageStart,
};

/// Boxed stream of parsed events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TollgateError>> + Send>>;

/// Typed SSE events from the streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageStart(SseMessageStart),
    ContentBlockStart(SseContentBlockStart),
    ContentBlockDelta(SseContentBlockDelta),
    ContentBlockStop(SseContentBlockStop),
    MessageDelta(SseMessageDelta),
    MessageStop,
    Ping,
    /// API error reported mid-stream.
    Error(ApiErrorResponse),
}

/// Parses a streaming response into typed [`StreamEvent`]s.
///
/// Unknown event names are skipped so newer API versions do not break parsing.
pub fn parse_sse_stream(response: reqwest::Response) -> EventStream {
    let mapped = response
        .bytes_stream()
        .eventsource()
        .filter_map(|result| async move {
            match result {
                Ok(event) => parse_event(&event.event, &event.data),
                Err(e) => Some(Err(TollgateError::Connection {
                    provider: "anthropic".into(),
                    message: format!("SSE stream error: {e}"),
                    source: None,
                })),
            }
        });

    Box::pin(mapped)
}

fn parse_event(name: &str, data: &str) -> Option<Result<StreamEvent, TollgateError>> {
    let parsed = match name {
        "message_start" => decode(name, data).map(StreamEvent::MessageStart),
        "content_block_start" => decode(name, data).map(StreamEvent::ContentBlockStart),
        "content_block_delta" => decode(name, data).map(StreamEvent::ContentBlockDelta),
        "content_block_stop" => decode(name, data).map(StreamEvent::ContentBlockStop),
        "message_delta" => decode(name, data).map(StreamEvent::MessageDelta),
        "message_stop" => Ok(StreamEvent::MessageStop),
        "ping" => Ok(StreamEvent::Ping),
        "error" => decode(name, data).map(StreamEvent::Error),
        _ => return None,
    };
    Some(parsed)
}

fn decode<T: DeserializeOwned>(name: &str, data: &str) -> Result<T, TollgateError> {
    serde_json::from_str(data).map_err(|e| TollgateError::Provider {
        message: format!("failed to parse {name}: {e}"),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SseDelta;

    /// Serves raw SSE text through wiremock to get a real `reqwest::Response`.
    async fn mock_sse_response(sse_text: &str) -> reqwest::Response {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_text.to_string()),
            )
            .mount(&server)
            .await;

        reqwest::get(&server.uri()).await.unwrap()
    }

    #[tokio::test]
    async fn parse_text_delta() {
        let sse = "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);

        match stream.next().await.unwrap().unwrap() {
            StreamEvent::ContentBlockDelta(delta) => {
                assert_eq!(delta.index, 0);
                assert!(matches!(delta.delta, SseDelta::TextDelta { ref text } if text == "Hello"));
            }
            other => panic!("expected ContentBlockDelta, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_events_are_skipped() {
        let sse = "event: future_event\ndata: {\"foo\":\"bar\"}\n\nevent: message_stop\ndata: {}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);
        assert!(matches!(
            stream.next().await.unwrap().unwrap(),
            StreamEvent::MessageStop
        ));
    }

    #[tokio::test]
    async fn parse_message_delta_with_output_usage() {
        let sse = "event: message_delta\ndata: {\"delta\":{\"stop_reason\":\"tool_use\"},\"usage\":{\"output_tokens\":25}}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);

        match stream.next().await.unwrap().unwrap() {
            StreamEvent::MessageDelta(md) => {
                assert_eq!(md.delta.stop_reason.as_deref(), Some("tool_use"));
                assert_eq!(md.usage.unwrap().output_tokens, 25);
            }
            other => panic!("expected MessageDelta, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn parse_error_event() {
        let sse = "event: error\ndata: {\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);

        match stream.next().await.unwrap().unwrap() {
            StreamEvent::Error(err) => assert_eq!(err.error.kind, "overloaded_error"),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_provider_error() {
        let sse = "event: message_delta\ndata: not-json\n\n";
        let mut stream = parse_sse_stream(mock_sse_response(sse).await);
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(TollgateError::Provider { .. })
        ));
    }
}
