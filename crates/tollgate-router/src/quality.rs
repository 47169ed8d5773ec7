// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Degenerate-output heuristic for local responses.

use std::collections::HashSet;

use tollgate_config::model::QualityConfig;
use tollgate_core::{Completion, FinishReason};

/// Judgment on one local completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityVerdict {
    Acceptable,
    /// No text and no tool calls.
    Empty,
    /// A few word n-grams dominate the output.
    Repetitive { distinct_ratio: f64 },
}

impl QualityVerdict {
    pub fn is_acceptable(&self) -> bool {
        matches!(self, QualityVerdict::Acceptable)
    }
}

/// Word n-gram repetition check.
#[derive(Debug, Clone)]
pub struct QualityCheck {
    config: QualityConfig,
}

impl QualityCheck {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, completion: &Completion) -> QualityVerdict {
        if !self.config.enabled
            || completion.finish_reason == FinishReason::ToolUse
            || !completion.tool_calls.is_empty()
        {
            return QualityVerdict::Acceptable;
        }

        let text = completion.text().trim();
        if text.is_empty() {
            return QualityVerdict::Empty;
        }

        match self.distinct_ratio(text) {
            Some(ratio) if ratio < self.config.min_distinct_ratio => {
                QualityVerdict::Repetitive {
                    distinct_ratio: ratio,
                }
            }
            _ => QualityVerdict::Acceptable,
        }
    }

    /// Distinct/total word n-gram ratio, or `None` when the text is too
    /// short to judge.
    fn distinct_ratio(&self, text: &str) -> Option<f64> {
        let n = self.config.ngram_size.max(1);
        let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        if words.len() < n {
            return None;
        }
        let total = words.len() - n + 1;
        if total < self.config.min_ngrams {
            return None;
        }
        let distinct: HashSet<&[String]> = words.windows(n).collect();
        Some(distinct.len() as f64 / total as f64)
    }
}
