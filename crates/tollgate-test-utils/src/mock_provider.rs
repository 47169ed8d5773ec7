// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted provider adapter for deterministic routing tests.
//!
//! `MockProvider` pops one [`MockReply`] per `generate()` call. When the
//! script runs out it answers with the text "mock response". Every request
//! is recorded so tests can assert which tiers and models were called.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use tollgate_core::{
    ChunkSink, Completion, CompletionRequest, FinishReason, ProviderAdapter, ProviderKind,
    TokenUsage, TollgateError, ToolCall,
};

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful text completion.
    Text(String),
    /// Successful tool invocation with no prose.
    ToolCall { name: String, arguments: Value },
    /// Transport failure with no HTTP status.
    ConnectionError,
    /// Non-success HTTP status.
    Status(u16),
    /// Unparseable backend payload.
    Malformed,
    /// No credentials configured.
    MissingCredential,
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }
}

/// A provider adapter that replays scripted replies.
pub struct MockProvider {
    name: String,
    kind: ProviderKind,
    replies: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<CompletionRequest>>,
    available: AtomicBool,
    loaded_models: Vec<String>,
}

impl MockProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self::with_replies(kind, Vec::new())
    }

    /// Create a mock provider pre-loaded with the given script.
    pub fn with_replies(kind: ProviderKind, replies: Vec<MockReply>) -> Self {
        let name = match kind {
            ProviderKind::Local => "mock-local",
            ProviderKind::Cloud => "mock-cloud",
        };
        Self {
            name: name.to_string(),
            kind,
            replies: Mutex::new(VecDeque::from(replies)),
            calls: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            loaded_models: Vec::new(),
        }
    }

    pub fn local(replies: Vec<MockReply>) -> Arc<Self> {
        Arc::new(Self::with_replies(ProviderKind::Local, replies))
    }

    pub fn cloud(replies: Vec<MockReply>) -> Arc<Self> {
        Arc::new(Self::with_replies(ProviderKind::Cloud, replies))
    }

    /// Models reported by `loaded_models()`.
    pub fn with_loaded_models(mut self, models: Vec<String>) -> Self {
        self.loaded_models = models;
        self
    }

    /// Append a reply to the end of the script.
    pub async fn push_reply(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Flip the result of `available()`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Requests received so far, in order.
    pub async fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Models requested so far, in order.
    pub async fn called_models(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|r| r.model.clone())
            .collect()
    }

    async fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::text("mock response"))
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(
        &self,
        request: CompletionRequest,
        on_chunk: Option<ChunkSink>,
    ) -> Result<Completion, TollgateError> {
        let model = request.model.clone();
        let stream = request.stream;
        self.calls.lock().await.push(request);

        match self.next_reply().await {
            MockReply::Text(text) => {
                if let (true, Some(sink)) = (stream, on_chunk.as_ref()) {
                    for word in text.split_inclusive(' ') {
                        sink(word);
                    }
                }
                let content = if text.is_empty() { None } else { Some(text) };
                Ok(Completion {
                    model,
                    content,
                    tool_calls: Vec::new(),
                    usage: TokenUsage::new(10, 20),
                    finish_reason: FinishReason::Stop,
                })
            }
            MockReply::ToolCall { name, arguments } => Ok(Completion {
                model,
                content: None,
                tool_calls: vec![ToolCall {
                    id: format!("call_{}", self.call_count().await),
                    name,
                    arguments: match arguments {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    },
                }],
                usage: TokenUsage::new(10, 5),
                finish_reason: FinishReason::ToolUse,
            }),
            MockReply::ConnectionError => Err(TollgateError::Connection {
                provider: self.name.clone(),
                message: "connection refused".into(),
                source: None,
            }),
            MockReply::Status(status) => Err(TollgateError::BackendStatus {
                provider: self.name.clone(),
                status,
                body: "scripted failure".into(),
            }),
            MockReply::Malformed => Err(TollgateError::Provider {
                message: "unparseable response body".into(),
                source: None,
            }),
            MockReply::MissingCredential => Err(TollgateError::MissingCredential {
                provider: self.name.clone(),
                env_var: "ANTHROPIC_API_KEY".into(),
            }),
        }
    }

    async fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn loaded_models(&self) -> Result<Vec<String>, TollgateError> {
        Ok(self.loaded_models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn request(model: &str, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: model.into(),
            messages: vec![tollgate_core::Message::user("hi")],
            tools: vec![],
            system: None,
            max_tokens: 100,
            temperature: 0.7,
            context_window: None,
            stream,
        }
    }

    #[tokio::test]
    async fn default_reply_when_script_empty() {
        let provider = MockProvider::new(ProviderKind::Local);
        let completion = provider.generate(request("m", false), None).await.unwrap();
        assert_eq!(completion.text(), "mock response");
        assert_eq!(provider.call_count().await, 1);
    }

    #[tokio::test]
    async fn replies_in_order_and_records_models() {
        let provider = MockProvider::with_replies(
            ProviderKind::Cloud,
            vec![MockReply::Status(500), MockReply::text("second")],
        );
        let err = provider.generate(request("a", false), None).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        let ok = provider.generate(request("b", false), None).await.unwrap();
        assert_eq!(ok.text(), "second");
        assert_eq!(provider.called_models().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn empty_text_yields_no_content() {
        let provider = MockProvider::with_replies(ProviderKind::Local, vec![MockReply::text("")]);
        let completion = provider.generate(request("m", false), None).await.unwrap();
        assert!(completion.content.is_none());
    }

    #[tokio::test]
    async fn streams_words_to_sink() {
        let provider =
            MockProvider::with_replies(ProviderKind::Local, vec![MockReply::text("one two")]);
        let seen = Arc::new(StdMutex::new(String::new()));
        let sink_seen = seen.clone();
        let sink: ChunkSink = Arc::new(move |chunk: &str| {
            sink_seen.lock().unwrap().push_str(chunk);
        });
        provider.generate(request("m", true), Some(sink)).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_str(), "one two");
    }

    #[tokio::test]
    async fn availability_toggles() {
        let provider = MockProvider::new(ProviderKind::Local);
        assert!(provider.available().await);
        provider.set_available(false);
        assert!(!provider.available().await);
    }
}
