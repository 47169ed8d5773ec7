// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! NDJSON aggregation for streamed `/api/chat` responses.
//!
//! Ollama streams one JSON object per line. Content fragments are forwarded
//! to the caller's chunk sink as they arrive; the final `done: true` line
//! carries token counts and the stop reason.

use bytes::BytesMut;
use tollgate_core::{ChunkSink, TollgateError};

use crate::types::ChatResponse;

/// Accumulates streamed lines into a single [`ChatResponse`].
#[derive(Default)]
pub struct StreamAggregate {
    buffer: BytesMut,
    response: ChatResponse,
    finished: bool,
}

impl StreamAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes. Complete lines are parsed immediately.
    pub fn push_bytes(&mut self, bytes: &[u8], on_chunk: &ChunkSink) -> Result<(), TollgateError> {
        self.buffer.extend_from_slice(bytes);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            self.push_line(&line[..pos], on_chunk)?;
        }
        Ok(())
    }

    /// Flush any trailing partial line and return the aggregated response.
    pub fn finish(mut self, on_chunk: &ChunkSink) -> Result<ChatResponse, TollgateError> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            self.push_line(&rest, on_chunk)?;
        }
        if !self.finished {
            return Err(TollgateError::Provider {
                message: "ollama stream ended before the final message".into(),
                source: None,
            });
        }
        Ok(self.response)
    }

    fn push_line(&mut self, line: &[u8], on_chunk: &ChunkSink) -> Result<(), TollgateError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let part: ChatResponse =
            serde_json::from_slice(line).map_err(|e| TollgateError::Provider {
                message: format!("failed to parse ollama stream line: {e}"),
                source: Some(Box::new(e)),
            })?;

        if let Some(error) = part.error {
            return Err(TollgateError::Provider {
                message: format!("ollama stream error: {error}"),
                source: None,
            });
        }

        if !part.message.content.is_empty() {
            on_chunk(&part.message.content);
            self.response.message.content.push_str(&part.message.content);
        }
        self.response
            .message
            .tool_calls
            .extend(part.message.tool_calls);

        if part.done {
            self.finished = true;
            self.response.model = part.model;
            self.response.done = true;
            self.response.done_reason = part.done_reason;
            self.response.prompt_eval_count = part.prompt_eval_count;
            self.response.eval_count = part.eval_count;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collecting_sink() -> (ChunkSink, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ChunkSink = Arc::new(move |s: &str| sink_seen.lock().unwrap().push(s.to_string()));
        (sink, seen)
    }

    #[test]
    fn aggregates_lines_split_across_chunks() {
        let (sink, seen) = collecting_sink();
        let mut agg = StreamAggregate::new();
        agg.push_bytes(
            br#"{"model":"m","message":{"role":"assistant","content":"Hel"},"done":false}
{"model":"m","message":{"role":"assis"#,
            &sink,
        )
        .unwrap();
        agg.push_bytes(
            br#"tant","content":"lo"},"done":false}
{"model":"m","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","prompt_eval_count":7,"eval_count":2}"#,
            &sink,
        )
        .unwrap();

        let resp = agg.finish(&sink).unwrap();
        assert_eq!(resp.message.content, "Hello");
        assert_eq!(resp.prompt_eval_count, Some(7));
        assert_eq!(resp.eval_count, Some(2));
        assert_eq!(resp.done_reason.as_deref(), Some("stop"));
        assert_eq!(*seen.lock().unwrap(), vec!["Hel", "lo"]);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let (sink, _) = collecting_sink();
        let mut agg = StreamAggregate::new();
        agg.push_bytes(
            b"{\"model\":\"m\",\"message\":{\"role\":\"assistant\",\"content\":\"x\"},\"done\":false}\n",
            &sink,
        )
        .unwrap();
        assert!(matches!(
            agg.finish(&sink),
            Err(TollgateError::Provider { .. })
        ));
    }

    #[test]
    fn server_error_line_aborts() {
        let (sink, _) = collecting_sink();
        let mut agg = StreamAggregate::new();
        let err = agg
            .push_bytes(b"{\"error\":\"model crashed\"}\n", &sink)
            .unwrap_err();
        assert!(err.to_string().contains("model crashed"));
    }
}
