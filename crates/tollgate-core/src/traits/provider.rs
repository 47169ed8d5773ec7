// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for model backends (Ollama, Anthropic, ...).

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::types::{ChunkSink, Completion, CompletionRequest, ProviderKind};

/// Adapter isolating one backend's wire protocol.
///
/// Implementations own their retry policy and error classification. The
/// router only depends on this contract, so adding a backend never touches
/// routing code.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// Short backend name used in logs and errors (e.g. "ollama").
    fn name(&self) -> &str;

    /// Whether this backend is local (free) or cloud (budget-gated).
    fn kind(&self) -> ProviderKind;

    /// Sends one request. When `on_chunk` is given and the request asks for
    /// streaming, text deltas are delivered to it before the aggregated
    /// completion is returned.
    async fn generate(
        &self,
        request: CompletionRequest,
        on_chunk: Option<ChunkSink>,
    ) -> Result<Completion, TollgateError>;

    /// Cheap liveness probe. Never errors; network failure means `false`.
    async fn available(&self) -> bool;

    /// Models currently loaded in memory. Backends without the notion
    /// return an empty list.
    async fn loaded_models(&self) -> Result<Vec<String>, TollgateError> {
        Ok(Vec::new())
    }
}
