// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tollgate configuration system.

use tollgate_config::diagnostic::ConfigError;
use tollgate_config::model::TollgateConfig;
use tollgate_config::{load_and_validate_str, load_config_from_str};
use tollgate_core::ProviderKind;

#[test]
fn valid_toml_overrides_defaults() {
    let toml = r#"
[agent]
log_level = "debug"

[tiers.tiny]
backend = "local"
model = "llama3.2:1b"
context_window = 2048
temperature = 0.3

[escalation]
tiny = "cloud_fast"

[skills]
quick_answer = "tiny"

[cost]
monthly_budget_usd = 12.5

[anthropic]
api_key = "sk-ant-test"
max_retries = 5

[storage]
database_path = "/tmp/tollgate-test.db"
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.tiers.len(), 7, "user tier merges with the defaults");
    let tiny = config.tier("tiny").unwrap();
    assert_eq!(tiny.backend, ProviderKind::Local);
    assert_eq!(tiny.context_window, 2048);
    assert_eq!(tiny.max_tokens, 2048);
    assert_eq!(config.escalation_target("tiny"), Some("cloud_fast"));
    assert_eq!(config.escalation_target("coder"), Some("cloud_standard"));
    assert_eq!(config.skill_tier("quick_answer"), Some("tiny"));
    assert_eq!(config.cost.monthly_budget_usd, 12.5);
    assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-ant-test"));
    assert_eq!(config.anthropic.max_retries, 5);
    assert_eq!(config.storage.database_path, "/tmp/tollgate-test.db");
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config is fine");
    let defaults = TollgateConfig::default();
    assert_eq!(config.tiers, defaults.tiers);
    assert_eq!(config.routing.default_tier, "workhorse");
    assert_eq!(config.cost.monthly_budget_usd, 30.0);
    assert_eq!(config.quality.ngram_size, 3);
}

#[test]
fn unknown_field_in_tier_is_reported_with_suggestion() {
    let toml = r#"
[tiers.tiny]
backend = "local"
modle = "llama3.2:1b"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    let unknown = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => Some((key.clone(), suggestion.clone())),
        _ => None,
    });
    let (key, suggestion) = unknown.expect("expected an UnknownKey error");
    assert_eq!(key, "modle");
    assert_eq!(suggestion.as_deref(), Some("model"));
}

#[test]
fn unknown_section_key_rejected() {
    let toml = r#"
[cost]
monthly_budget = 10.0
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn invalid_backend_kind_rejected() {
    let toml = r#"
[tiers.tiny]
backend = "edge"
model = "x"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn misspelled_escalation_target_suggests_tier() {
    let toml = r#"
[escalation]
coder = "cloud_standrd"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown tier must be rejected");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownTier { tier, suggestion, .. }
                if tier == "cloud_standrd" && suggestion.as_deref() == Some("cloud_standard")
        )
    });
    assert!(found, "got: {errors:?}");
}

#[test]
fn escalation_to_local_tier_rejected() {
    let toml = r#"
[escalation]
whisper = "workhorse"
"#;
    let errors = load_and_validate_str(toml).expect_err("local target must be rejected");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("must target a cloud tier"))
    );
}

#[test]
fn local_tier_without_escalation_rejected() {
    let toml = r#"
[tiers.orphan]
backend = "local"
model = "phi3"
"#;
    let errors = load_and_validate_str(toml).expect_err("orphan local tier must be rejected");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("`orphan` has no escalation target"))
    );
}

#[test]
fn cloud_tier_without_pricing_rejected() {
    let toml = r#"
[tiers.cloud_big]
backend = "cloud"
model = "claude-opus-4-20250514"
"#;
    let errors = load_and_validate_str(toml).expect_err("pricing is required");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("cloud_big") && e.to_string().contains("pricing"))
    );
}

#[test]
fn cloud_tier_pricing_parses() {
    let toml = r#"
[tiers.cloud_big]
backend = "cloud"
model = "claude-opus-4-20250514"
max_tokens = 8192

[tiers.cloud_big.pricing]
input_per_mtok = 15.0
output_per_mtok = 75.0
"#;
    let config = load_and_validate_str(toml).expect("valid cloud tier");
    let pricing = config.tier("cloud_big").unwrap().pricing.unwrap();
    assert_eq!(pricing.input_per_mtok, 15.0);
    assert_eq!(pricing.output_per_mtok, 75.0);
}

#[test]
fn fallback_tiers_must_be_local() {
    let toml = r#"
[routing]
budget_fallback_tiers = ["cloud_fast"]
"#;
    let errors = load_and_validate_str(toml).expect_err("cloud fallback must be rejected");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("budget_fallback_tiers"))
    );
}
