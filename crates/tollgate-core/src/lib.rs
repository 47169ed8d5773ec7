// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Tollgate, the model routing and admission-control layer.
//!
//! This crate provides the error type, the normalized conversation and
//! response types, the [`ProviderAdapter`] trait every backend implements,
//! and the tool-argument normalizer shared by all adapters.

pub mod error;
pub mod tool_args;
pub mod traits;
pub mod types;

pub use error::TollgateError;
pub use tool_args::normalize_arguments;
pub use traits::ProviderAdapter;
pub use types::{
    ChunkSink, Completion, CompletionRequest, FinishReason, Message, ProviderKind, Response, Role,
    TokenUsage, ToolCall, ToolSchema,
};
