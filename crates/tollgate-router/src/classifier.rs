// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tier resolution from routing hints.
//!
//! Rules are tried highest priority first and the first match wins:
//! explicit tier, skill map, code keywords, reasoning keywords, default tier.
//! Everything is a pure function of the hints and the static configuration.

use std::sync::Arc;

use serde::Serialize;
use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;

/// Which rule picked the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TierSource {
    Explicit,
    Skill,
    CodeKeyword,
    ReasoningKeyword,
    Default,
}

/// A resolved tier and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierResolution {
    pub tier: String,
    pub source: TierSource,
}

impl TierResolution {
    fn new(tier: &str, source: TierSource) -> Self {
        Self {
            tier: tier.to_string(),
            source,
        }
    }
}

/// Keyword and lookup based tier classifier.
pub struct TierClassifier {
    config: Arc<TollgateConfig>,
    code_keywords: Vec<String>,
    reasoning_keywords: Vec<String>,
}

impl TierClassifier {
    pub fn new(config: Arc<TollgateConfig>) -> Self {
        let code_keywords = config.routing.code_keywords.iter().map(|k| padded(k)).collect();
        let reasoning_keywords = config
            .routing
            .reasoning_keywords
            .iter()
            .map(|k| padded(k))
            .collect();
        Self {
            config,
            code_keywords,
            reasoning_keywords,
        }
    }

    /// Resolve a tier from the routing hints.
    ///
    /// An explicit tier is honored verbatim but must exist. Unknown skill
    /// names fall through to the keyword rules.
    pub fn resolve(
        &self,
        explicit_tier: Option<&str>,
        skill: Option<&str>,
        message: Option<&str>,
    ) -> Result<TierResolution, TollgateError> {
        if let Some(tier) = explicit_tier {
            self.config.tier(tier)?;
            return Ok(TierResolution::new(tier, TierSource::Explicit));
        }

        if let Some(tier) = skill.and_then(|s| self.config.skill_tier(s)) {
            return Ok(TierResolution::new(tier, TierSource::Skill));
        }

        let routing = &self.config.routing;
        if let Some(text) = message.map(padded).filter(|t| !t.trim().is_empty()) {
            if matches_any(&text, &self.code_keywords) {
                return Ok(TierResolution::new(&routing.code_tier, TierSource::CodeKeyword));
            }
            if matches_any(&text, &self.reasoning_keywords) {
                return Ok(TierResolution::new(
                    &routing.reasoning_tier,
                    TierSource::ReasoningKeyword,
                ));
            }
        }

        Ok(TierResolution::new(&routing.default_tier, TierSource::Default))
    }
}

/// Lowercase, replace punctuation with spaces, and pad with spaces so
/// whole-word and phrase matches become plain substring checks.
fn padded(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

fn matches_any(text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| !k.trim().is_empty() && text.contains(k.as_str()))
}
