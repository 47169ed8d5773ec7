// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate ask` command implementation.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tollgate_config::TollgateConfig;
use tollgate_core::{ChunkSink, Message, Response, TollgateError};
use tollgate_router::GenerateRequest;
use tracing::debug;

use crate::app;

#[derive(Debug)]
pub struct AskArgs {
    pub prompt: String,
    pub tier: Option<String>,
    pub skill: Option<String>,
    pub system: Option<String>,
    pub stream: bool,
}

/// Route one prompt. The answer goes to stdout, the routing summary to stderr.
pub async fn run_ask(config: TollgateConfig, args: AskArgs) -> Result<(), TollgateError> {
    let router = app::build_router(config).await?;
    let request = build_request(&args);
    let streamed = request.stream;

    let response = router.generate(request).await?;
    if streamed {
        println!();
    } else {
        println!("{}", response_body(&response));
    }
    eprintln!("{}", route_summary(&response));
    Ok(())
}

fn build_request(args: &AskArgs) -> GenerateRequest {
    let mut request = GenerateRequest::new(vec![Message::user(args.prompt.clone())])
        .with_user_message(args.prompt.clone());
    if let Some(tier) = &args.tier {
        request = request.with_tier(tier.clone());
    }
    if let Some(skill) = &args.skill {
        request = request.with_skill(skill.clone());
    }
    if let Some(system) = &args.system {
        request = request.with_system(system.clone());
    }
    if args.stream {
        request = request.streaming(chunk_writer(std::io::stdout()));
    }
    request
}

/// Writes each chunk to `out` as it arrives. After the first failed write
/// (a closed pipe, usually) the rest of the stream is dropped.
fn chunk_writer<W: Write + Send + 'static>(out: W) -> ChunkSink {
    let out = Mutex::new(out);
    let closed = AtomicBool::new(false);
    Arc::new(move |chunk: &str| {
        if closed.load(Ordering::Relaxed) {
            return;
        }
        let Ok(mut out) = out.lock() else {
            return;
        };
        if let Err(e) = out.write_all(chunk.as_bytes()).and_then(|()| out.flush()) {
            closed.store(true, Ordering::Relaxed);
            debug!(error = %e, "stream output closed, dropping remaining chunks");
        }
    })
}

/// Text content, or a rendering of the tool calls when there is none.
fn response_body(response: &Response) -> String {
    if response.content.is_some() || response.tool_calls.is_empty() {
        return response.text().to_string();
    }
    response
        .tool_calls
        .iter()
        .map(|call| {
            format!(
                "[tool call] {}({})",
                call.name,
                serde_json::Value::Object(call.arguments.clone())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn route_summary(response: &Response) -> String {
    let mut summary = format!("-- {response}");
    if let Some(from) = &response.escalated_from {
        let route = response
            .metadata
            .get("route")
            .and_then(|v| v.as_str())
            .unwrap_or("escalated");
        let cause = response
            .metadata
            .get("escalation_cause")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        summary.push_str(&format!(" [{route} from {from}: {cause}]"));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tollgate_core::{FinishReason, ProviderKind, TokenUsage, ToolCall};

    fn response() -> Response {
        Response {
            content: Some("hello".into()),
            tool_calls: vec![],
            usage: TokenUsage::new(3, 4),
            provider: ProviderKind::Local,
            tier: "workhorse".into(),
            model: "qwen2.5:14b".into(),
            finish_reason: FinishReason::Stop,
            cost_usd: 0.0,
            escalated_from: None,
            latency_ms: 42,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn request_carries_hints() {
        let request = build_request(&AskArgs {
            prompt: "debug this".into(),
            tier: None,
            skill: Some("debugging".into()),
            system: Some("be brief".into()),
            stream: true,
        });
        assert_eq!(request.user_message.as_deref(), Some("debug this"));
        assert_eq!(request.skill.as_deref(), Some("debugging"));
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert!(request.stream);
        assert!(request.on_chunk.is_some());
    }

    #[test]
    fn body_renders_tool_calls_without_text() {
        let mut r = response();
        r.content = None;
        let mut arguments = serde_json::Map::new();
        arguments.insert("city".into(), "Oslo".into());
        r.tool_calls.push(ToolCall {
            id: "call_1".into(),
            name: "get_weather".into(),
            arguments,
        });
        assert_eq!(response_body(&r), r#"[tool call] get_weather({"city":"Oslo"})"#);
        assert_eq!(response_body(&response()), "hello");
    }

    #[test]
    fn summary_mentions_escalation() {
        let mut r = response();
        assert_eq!(
            route_summary(&r),
            "-- workhorse via local (qwen2.5:14b, 7 tokens, $0.0000, 42ms)"
        );
        r.escalated_from = Some("whisper".into());
        r.metadata.insert("route".into(), "budget_substitute".into());
        r.metadata.insert("escalation_cause".into(), "empty_output".into());
        assert!(route_summary(&r).ends_with("[budget_substitute from whisper: empty_output]"));
    }

    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ClosedPipe(Arc<std::sync::atomic::AtomicUsize>);

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn chunks_are_written_in_order() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = chunk_writer(Shared(buf.clone()));
        sink("Hello");
        sink(", world");
        assert_eq!(buf.lock().unwrap().as_slice(), b"Hello, world");
    }

    #[test]
    fn closed_output_stops_further_writes() {
        let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let sink = chunk_writer(ClosedPipe(attempts.clone()));
        sink("one");
        sink("two");
        sink("three");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
