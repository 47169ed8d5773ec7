// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost calculation from the tier price table.
//!
//! Prices live on each cloud tier (`[tiers.<name>.pricing]`, USD per million
//! tokens). Local tiers have no price table and always cost zero.

use tollgate_config::TierPricing;
use tollgate_core::{Message, TokenUsage};

/// Rough characters-per-token ratio used for pre-call estimates.
const CHARS_PER_TOKEN: usize = 4;

/// Cost in USD of a completed call.
pub fn calculate_cost(usage: &TokenUsage, pricing: Option<&TierPricing>) -> f64 {
    match pricing {
        Some(p) => token_cost(usage.prompt_tokens, usage.completion_tokens, p),
        None => 0.0,
    }
}

/// Upper-bound estimate of a call's cost: the prompt (from its character
/// count) plus a full `max_tokens` completion.
pub fn estimate_cost(prompt_tokens: u32, max_tokens: u32, pricing: Option<&TierPricing>) -> f64 {
    match pricing {
        Some(p) => token_cost(prompt_tokens, max_tokens, p),
        None => 0.0,
    }
}

/// Approximate prompt size in tokens for a conversation plus system text.
pub fn estimate_prompt_tokens(messages: &[Message], system: Option<&str>) -> u32 {
    let chars: usize = messages
        .iter()
        .map(|m| {
            m.text().len()
                + m.tool_calls
                    .iter()
                    .map(|c| {
                        c.name.len()
                            + c.arguments
                                .iter()
                                .map(|(k, v)| k.len() + v.to_string().len())
                                .sum::<usize>()
                    })
                    .sum::<usize>()
        })
        .sum::<usize>()
        + system.map_or(0, str::len);
    u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

fn token_cost(input: u32, output: u32, pricing: &TierPricing) -> f64 {
    (f64::from(input) / 1_000_000.0) * pricing.input_per_mtok
        + (f64::from(output) / 1_000_000.0) * pricing.output_per_mtok
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONNET: TierPricing = TierPricing {
        input_per_mtok: 3.0,
        output_per_mtok: 15.0,
    };

    #[test]
    fn local_tiers_cost_nothing() {
        let usage = TokenUsage::new(1_000_000, 1_000_000);
        assert_eq!(calculate_cost(&usage, None), 0.0);
    }

    #[test]
    fn cloud_cost_from_price_table() {
        let usage = TokenUsage::new(1000, 500);
        // 1000 * 3/1M + 500 * 15/1M = 0.003 + 0.0075
        let cost = calculate_cost(&usage, Some(&SONNET));
        assert!((cost - 0.0105).abs() < 1e-12);
    }

    #[test]
    fn estimate_assumes_full_completion() {
        let cost = estimate_cost(100, 4096, Some(&SONNET));
        let expected = 100.0 * 3.0 / 1e6 + 4096.0 * 15.0 / 1e6;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn prompt_token_estimate_rounds_up() {
        let messages = vec![Message::user("hello")];
        assert_eq!(estimate_prompt_tokens(&messages, None), 2);
        assert_eq!(estimate_prompt_tokens(&messages, Some("abc")), 2);
        assert_eq!(estimate_prompt_tokens(&[], None), 0);
    }
}
