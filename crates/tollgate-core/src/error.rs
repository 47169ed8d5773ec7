// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every Tollgate crate.

use thiserror::Error;

/// The primary error type used across provider adapters, the usage ledger,
/// and the router.
#[derive(Debug, Error)]
pub enum TollgateError {
    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A tier name that does not exist in the tier table.
    #[error("configuration error: unknown tier `{tier}`{}", suggestion_suffix(.suggestion.as_deref()))]
    UnknownTier {
        tier: String,
        suggestion: Option<String>,
    },

    /// A cloud call was attempted without credentials.
    #[error("missing credential for {provider}: set {env_var} or configure an API key")]
    MissingCredential { provider: String, env_var: String },

    /// Transport failure with no HTTP status (refused, reset, DNS, timeout).
    #[error("connection error ({provider}): {message}")]
    Connection {
        provider: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend answered with a non-success HTTP status.
    #[error("{provider} returned HTTP {status}: {body}")]
    BackendStatus {
        provider: String,
        status: u16,
        body: String,
    },

    /// The backend answered successfully but the payload could not be understood.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Usage ledger failures.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

fn suggestion_suffix(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean `{s}`?)"),
        None => String::new(),
    }
}

impl TollgateError {
    /// Errors that routing must never recover from: they are caller or
    /// operator mistakes and propagate straight to the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TollgateError::Config(_)
                | TollgateError::UnknownTier { .. }
                | TollgateError::MissingCredential { .. }
        )
    }

    /// Backend failures that make a tier eligible for escalation.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            TollgateError::Connection { .. }
                | TollgateError::BackendStatus { .. }
                | TollgateError::Provider { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TollgateError::BackendStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
