// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backoff policy for rate-limited and overloaded Messages API responses.
//!
//! Only two status families are retried. Everything else fails on the first
//! response, and transport errors are never retried.

use std::time::Duration;

use rand::Rng;
use tollgate_config::model::AnthropicConfig;

/// Fraction of the computed delay added as random jitter (upper bound).
const JITTER_FRACTION: f64 = 0.25;

/// Which backoff schedule a retryable status uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// HTTP 429.
    RateLimited,
    /// HTTP 529, or 503 from an intermediary.
    Overloaded,
}

impl RetryKind {
    pub fn classify(status: u16) -> Option<Self> {
        match status {
            429 => Some(Self::RateLimited),
            503 | 529 => Some(Self::Overloaded),
            _ => None,
        }
    }
}

/// Exponential backoff with jitter, capped per delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub rate_limit_base: Duration,
    pub overload_base: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AnthropicConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_base: Duration::from_millis(config.rate_limit_backoff_ms),
            overload_base: Duration::from_millis(config.overload_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// `min(base * 2^attempt, max_backoff)` for a 0-indexed retry.
    pub fn base_delay(&self, kind: RetryKind, attempt: u32) -> Duration {
        let base = match kind {
            RetryKind::RateLimited => self.rate_limit_base,
            RetryKind::Overloaded => self.overload_base,
        };
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let cap_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        let raw_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(raw_ms.min(cap_ms))
    }

    /// Base delay plus up to 25% random jitter.
    pub fn delay(&self, kind: RetryKind, attempt: u32) -> Duration {
        let base = self.base_delay(kind, attempt);
        let jitter_max_ms = (base.as_millis() as f64 * JITTER_FRACTION) as u64;
        let jitter_ms = if jitter_max_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_max_ms)
        } else {
            0
        };
        base + Duration::from_millis(jitter_ms)
    }
}
