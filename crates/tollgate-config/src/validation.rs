// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the cross-references between the tier table, the escalation map,
//! the skill map and the routing rules, plus numeric ranges serde cannot
//! express. All errors are collected; validation never stops at the first.

use tollgate_core::ProviderKind;

use crate::diagnostic::{ConfigError, suggest_key};
use crate::model::TollgateConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &TollgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_tiers(config, &mut errors);
    validate_escalation(config, &mut errors);
    validate_references(config, &mut errors);
    validate_thresholds(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_tiers(config: &TollgateConfig, errors: &mut Vec<ConfigError>) {
    if config.tiers.is_empty() {
        errors.push(ConfigError::Validation {
            message: "at least one tier must be configured under [tiers]".to_string(),
        });
    }

    for (name, tier) in &config.tiers {
        if tier.model.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("tiers.{name}.model must not be empty"),
            });
        }
        if tier.context_window == 0 {
            errors.push(ConfigError::Validation {
                message: format!("tiers.{name}.context_window must be greater than 0"),
            });
        }
        if tier.max_tokens == 0 {
            errors.push(ConfigError::Validation {
                message: format!("tiers.{name}.max_tokens must be greater than 0"),
            });
        }
        if !(0.0..=2.0).contains(&tier.temperature) {
            errors.push(ConfigError::Validation {
                message: format!(
                    "tiers.{name}.temperature must be between 0.0 and 2.0, got {}",
                    tier.temperature
                ),
            });
        }
        match (tier.backend, &tier.pricing) {
            (ProviderKind::Cloud, None) => errors.push(ConfigError::Validation {
                message: format!("cloud tier `{name}` must define [tiers.{name}.pricing]"),
            }),
            (_, Some(p)) if p.input_per_mtok < 0.0 || p.output_per_mtok < 0.0 => {
                errors.push(ConfigError::Validation {
                    message: format!("tiers.{name}.pricing must be non-negative"),
                })
            }
            _ => {}
        }
    }
}

fn validate_escalation(config: &TollgateConfig, errors: &mut Vec<ConfigError>) {
    for (source, target) in &config.escalation {
        let location = format!("escalation.{source}");
        match config.tiers.get(source) {
            None => errors.push(unknown_tier(config, "escalation", source)),
            Some(t) if t.backend == ProviderKind::Cloud => {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "cloud tier `{source}` cannot escalate; only local tiers appear in [escalation]"
                    ),
                })
            }
            Some(_) => {}
        }
        match config.tiers.get(target) {
            None => errors.push(unknown_tier(config, &location, target)),
            Some(t) if t.backend != ProviderKind::Cloud => errors.push(ConfigError::Validation {
                message: format!("{location} must target a cloud tier, `{target}` is local"),
            }),
            Some(_) => {}
        }
    }

    for name in config.tiers_of_kind(ProviderKind::Local) {
        if !config.escalation.contains_key(name) {
            errors.push(ConfigError::Validation {
                message: format!("local tier `{name}` has no escalation target in [escalation]"),
            });
        }
    }
}

fn validate_references(config: &TollgateConfig, errors: &mut Vec<ConfigError>) {
    for (skill, tier) in &config.skills {
        if !config.tiers.contains_key(tier) {
            errors.push(unknown_tier(config, &format!("skills.{skill}"), tier));
        }
    }

    let routing = &config.routing;
    for (key, tier) in [
        ("routing.default_tier", &routing.default_tier),
        ("routing.code_tier", &routing.code_tier),
        ("routing.reasoning_tier", &routing.reasoning_tier),
    ] {
        if !config.tiers.contains_key(tier) {
            errors.push(unknown_tier(config, key, tier));
        }
    }

    for tier in &routing.budget_fallback_tiers {
        match config.tiers.get(tier) {
            None => errors.push(unknown_tier(config, "routing.budget_fallback_tiers", tier)),
            Some(t) if t.backend != ProviderKind::Local => errors.push(ConfigError::Validation {
                message: format!("routing.budget_fallback_tiers must list local tiers, `{tier}` is cloud"),
            }),
            Some(_) => {}
        }
    }
}

fn validate_thresholds(config: &TollgateConfig, errors: &mut Vec<ConfigError>) {
    let quality = &config.quality;
    if quality.ngram_size == 0 {
        errors.push(ConfigError::Validation {
            message: "quality.ngram_size must be at least 1".to_string(),
        });
    }
    if !(0.0..=1.0).contains(&quality.min_distinct_ratio) {
        errors.push(ConfigError::Validation {
            message: format!(
                "quality.min_distinct_ratio must be between 0.0 and 1.0, got {}",
                quality.min_distinct_ratio
            ),
        });
    }

    // NaN fails both comparisons, so test for the valid range instead.
    if !(config.cost.monthly_budget_usd >= 0.0) {
        errors.push(ConfigError::Validation {
            message: format!(
                "cost.monthly_budget_usd must be non-negative, got {}",
                config.cost.monthly_budget_usd
            ),
        });
    }
    if !(config.cost.warn_fraction > 0.0 && config.cost.warn_fraction <= 1.0) {
        errors.push(ConfigError::Validation {
            message: format!(
                "cost.warn_fraction must be in (0.0, 1.0], got {}",
                config.cost.warn_fraction
            ),
        });
    }

    if config.health.interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "health.interval_secs must be greater than 0".to_string(),
        });
    }
    if config.ollama.base_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "ollama.base_url must not be empty".to_string(),
        });
    }
    if config.anthropic.base_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "anthropic.base_url must not be empty".to_string(),
        });
    }
    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }
}

fn unknown_tier(config: &TollgateConfig, location: &str, tier: &str) -> ConfigError {
    let names: Vec<&str> = config.tiers.keys().map(String::as_str).collect();
    ConfigError::UnknownTier {
        location: location.to_string(),
        tier: tier.to_string(),
        suggestion: suggest_key(tier, &names),
        valid_tiers: names.join(", "),
    }
}
