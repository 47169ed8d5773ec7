// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Tollgate.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tollgate_core::{ProviderKind, TollgateError};

use crate::diagnostic::suggest_key;

/// Top-level Tollgate configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// The tier table, escalation map, and skill map ship with a complete default
/// layout; user files override individual entries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TollgateConfig {
    /// Process-level settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Named routing targets.
    #[serde(default = "default_tiers")]
    pub tiers: BTreeMap<String, TierConfig>,

    /// Local tier -> cloud tier used when the local tier fails.
    #[serde(default = "default_escalation")]
    pub escalation: BTreeMap<String, String>,

    /// Skill name -> tier.
    #[serde(default = "default_skills")]
    pub skills: BTreeMap<String, String>,

    /// Tier resolution rules.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Local output quality heuristic thresholds.
    #[serde(default)]
    pub quality: QualityConfig,

    /// Cloud budget settings.
    #[serde(default)]
    pub cost: CostConfig,

    /// Local backend (Ollama) settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Cloud backend (Anthropic) settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Health monitor settings.
    #[serde(default)]
    pub health: HealthConfig,

    /// Usage ledger storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for TollgateConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            tiers: default_tiers(),
            escalation: default_escalation(),
            skills: default_skills(),
            routing: RoutingConfig::default(),
            quality: QualityConfig::default(),
            cost: CostConfig::default(),
            ollama: OllamaConfig::default(),
            anthropic: AnthropicConfig::default(),
            health: HealthConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl TollgateConfig {
    /// Look up a tier, failing with a configuration error for unknown names.
    pub fn tier(&self, name: &str) -> Result<&TierConfig, TollgateError> {
        self.tiers.get(name).ok_or_else(|| {
            let names: Vec<&str> = self.tiers.keys().map(String::as_str).collect();
            TollgateError::UnknownTier {
                tier: name.to_string(),
                suggestion: suggest_key(name, &names),
            }
        })
    }

    /// Cloud tier a local tier escalates to.
    pub fn escalation_target(&self, tier: &str) -> Option<&str> {
        self.escalation.get(tier).map(String::as_str)
    }

    /// Tier mapped to a skill name, if the skill is known.
    pub fn skill_tier(&self, skill: &str) -> Option<&str> {
        self.skills.get(skill).map(String::as_str)
    }

    /// Names of all tiers served by the given backend kind.
    pub fn tiers_of_kind(&self, kind: ProviderKind) -> impl Iterator<Item = &str> {
        self.tiers
            .iter()
            .filter(move |(_, t)| t.backend == kind)
            .map(|(name, _)| name.as_str())
    }
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One routing target.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Which backend serves this tier.
    pub backend: ProviderKind,

    /// Concrete model identifier passed to the backend.
    pub model: String,

    /// Context window in tokens.
    #[serde(default = "default_context_window")]
    pub context_window: u32,

    /// Default sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// USD price table. Required for cloud tiers, ignored for local ones.
    #[serde(default)]
    pub pricing: Option<TierPricing>,
}

/// Cloud price per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TierPricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

fn default_context_window() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn local_tier(model: &str, context_window: u32, temperature: f32) -> TierConfig {
    TierConfig {
        backend: ProviderKind::Local,
        model: model.to_string(),
        context_window,
        temperature,
        max_tokens: default_max_tokens(),
        pricing: None,
    }
}

fn cloud_tier(model: &str, input_per_mtok: f64, output_per_mtok: f64) -> TierConfig {
    TierConfig {
        backend: ProviderKind::Cloud,
        model: model.to_string(),
        context_window: 200_000,
        temperature: default_temperature(),
        max_tokens: 4096,
        pricing: Some(TierPricing {
            input_per_mtok,
            output_per_mtok,
        }),
    }
}

fn default_tiers() -> BTreeMap<String, TierConfig> {
    BTreeMap::from([
        ("whisper".to_string(), local_tier("qwen2.5:3b", 4096, 0.7)),
        ("workhorse".to_string(), local_tier("qwen2.5:14b", 16384, 0.7)),
        ("coder".to_string(), local_tier("qwen2.5-coder:14b", 16384, 0.2)),
        ("thinker".to_string(), local_tier("deepseek-r1:14b", 16384, 0.6)),
        (
            "cloud_fast".to_string(),
            cloud_tier("claude-haiku-4-5-20251001", 0.80, 4.0),
        ),
        (
            "cloud_standard".to_string(),
            cloud_tier("claude-sonnet-4-20250514", 3.0, 15.0),
        ),
    ])
}

fn default_escalation() -> BTreeMap<String, String> {
    [
        ("whisper", "cloud_fast"),
        ("workhorse", "cloud_standard"),
        ("coder", "cloud_standard"),
        ("thinker", "cloud_standard"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_skills() -> BTreeMap<String, String> {
    [
        ("code_review", "coder"),
        ("code_generation", "coder"),
        ("debugging", "coder"),
        ("shell_command", "coder"),
        ("architecture_review", "thinker"),
        ("research", "thinker"),
        ("planning", "thinker"),
        ("summarize", "whisper"),
        ("classify", "whisper"),
        ("daily_briefing", "workhorse"),
        ("email_draft", "workhorse"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Tier resolution rules applied after explicit overrides and skill lookups.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Tier used when no other rule matches.
    #[serde(default = "default_default_tier")]
    pub default_tier: String,

    /// Tier for messages that look code-related.
    #[serde(default = "default_code_tier")]
    pub code_tier: String,

    /// Tier for messages that ask for analysis or architecture work.
    #[serde(default = "default_reasoning_tier")]
    pub reasoning_tier: String,

    /// Code-signal keywords (case-insensitive, whole words or phrases).
    #[serde(default = "default_code_keywords")]
    pub code_keywords: Vec<String>,

    /// Reasoning-signal keywords (case-insensitive, whole words or phrases).
    #[serde(default = "default_reasoning_keywords")]
    pub reasoning_keywords: Vec<String>,

    /// Local tiers tried, in order, when a cloud call is refused or fails.
    /// The tier that originally failed is skipped.
    #[serde(default = "default_budget_fallback_tiers")]
    pub budget_fallback_tiers: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_tier: default_default_tier(),
            code_tier: default_code_tier(),
            reasoning_tier: default_reasoning_tier(),
            code_keywords: default_code_keywords(),
            reasoning_keywords: default_reasoning_keywords(),
            budget_fallback_tiers: default_budget_fallback_tiers(),
        }
    }
}

fn default_default_tier() -> String {
    "workhorse".to_string()
}

fn default_code_tier() -> String {
    "coder".to_string()
}

fn default_reasoning_tier() -> String {
    "thinker".to_string()
}

fn default_code_keywords() -> Vec<String> {
    [
        "code", "debug", "bug", "function", "compile", "compiler", "refactor", "stack trace",
        "traceback", "exception", "script", "regex", "sql", "rust", "python", "javascript",
        "typescript", "unit test", "syntax", "implement",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_reasoning_keywords() -> Vec<String> {
    [
        "analyze", "analysis", "architecture", "design", "trade-off", "tradeoff", "compare",
        "evaluate", "strategy", "reason", "pros and cons", "step by step", "in depth",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_budget_fallback_tiers() -> Vec<String> {
    vec!["thinker".to_string(), "workhorse".to_string()]
}

/// Thresholds for the degenerate-output heuristic on local responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QualityConfig {
    /// Disable to trust every non-erroring local response.
    #[serde(default = "default_quality_enabled")]
    pub enabled: bool,

    /// Word n-gram size used for repetition detection.
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,

    /// Outputs with fewer n-grams than this are never judged repetitive.
    #[serde(default = "default_min_ngrams")]
    pub min_ngrams: usize,

    /// Distinct/total n-gram ratio below which output counts as repetitive.
    #[serde(default = "default_min_distinct_ratio")]
    pub min_distinct_ratio: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enabled: default_quality_enabled(),
            ngram_size: default_ngram_size(),
            min_ngrams: default_min_ngrams(),
            min_distinct_ratio: default_min_distinct_ratio(),
        }
    }
}

fn default_quality_enabled() -> bool {
    true
}

fn default_ngram_size() -> usize {
    3
}

fn default_min_ngrams() -> usize {
    12
}

fn default_min_distinct_ratio() -> f64 {
    0.35
}

/// Cloud spend limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CostConfig {
    /// Monthly cloud spending limit in USD. Zero refuses every cloud call.
    #[serde(default = "default_monthly_budget_usd")]
    pub monthly_budget_usd: f64,

    /// Fraction of the limit at which a warning is logged.
    #[serde(default = "default_warn_fraction")]
    pub warn_fraction: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            monthly_budget_usd: default_monthly_budget_usd(),
            warn_fraction: default_warn_fraction(),
        }
    }
}

fn default_monthly_budget_usd() -> f64 {
    30.0
}

fn default_warn_fraction() -> f64 {
    0.8
}

/// Ollama configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds.
    #[serde(default = "default_ollama_timeout")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            timeout_secs: default_ollama_timeout(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_timeout() -> u64 {
    300
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` falls back to the `ANTHROPIC_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Anthropic API version header value.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// API base URL (without the `/v1/...` path).
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds.
    #[serde(default = "default_anthropic_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for rate-limited/overloaded responses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff for HTTP 429, doubled per retry.
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Base backoff for overloaded responses (529/503), doubled per retry.
    #[serde(default = "default_overload_backoff_ms")]
    pub overload_backoff_ms: u64,

    /// Upper bound on a single backoff delay, before jitter.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_version: default_api_version(),
            base_url: default_anthropic_url(),
            timeout_secs: default_anthropic_timeout(),
            max_retries: default_max_retries(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            overload_backoff_ms: default_overload_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_rate_limit_backoff_ms() -> u64 {
    1_000
}

fn default_overload_backoff_ms() -> u64 {
    4_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

/// Health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Minimum seconds between two probe rounds.
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval(),
        }
    }
}

fn default_health_interval() -> u64 {
    60
}

/// Usage ledger storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite usage ledger.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tollgate").join("usage.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("usage.db"))
        .to_string_lossy()
        .into_owned()
}
