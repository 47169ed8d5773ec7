// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the usage ledger and budget gate.

use std::collections::BTreeMap;

use tollgate_config::model::CostConfig;
use tollgate_core::{FinishReason, ProviderKind, Response, TokenUsage};
use tollgate_usage::{BudgetGate, StatsPeriod, UsageLedger};

fn response(provider: ProviderKind, tier: &str, cost: f64) -> Response {
    Response {
        content: Some("done".into()),
        tool_calls: vec![],
        usage: TokenUsage::new(200, 80),
        provider,
        tier: tier.into(),
        model: format!("{tier}-model"),
        finish_reason: FinishReason::Stop,
        cost_usd: cost,
        escalated_from: None,
        latency_ms: 250,
        metadata: BTreeMap::new(),
    }
}

#[tokio::test]
async fn concurrent_appends_are_all_recorded() {
    let ledger = UsageLedger::open_in_memory().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let kind = if i % 2 == 0 {
                ProviderKind::Local
            } else {
                ProviderKind::Cloud
            };
            let cost = if kind == ProviderKind::Cloud { 0.5 } else { 0.0 };
            ledger.record(&response(kind, "workhorse", cost), None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(ledger.count().await.unwrap(), 32);
    let summary = ledger.daily_summary(None).await.unwrap();
    assert_eq!(summary.calls, 32);
    assert_eq!(summary.total_tokens, 32 * 280);
    assert_eq!(summary.calls_by_provider.get("local"), Some(&16));
    assert_eq!(summary.calls_by_provider.get("cloud"), Some(&16));
    assert!((ledger.monthly_cloud_spend_usd().await.unwrap() - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn budget_status_reports_half_spent() {
    let ledger = UsageLedger::open_in_memory().await.unwrap();
    ledger
        .record(&response(ProviderKind::Cloud, "cloud_standard", 10.0), None)
        .await
        .unwrap();
    ledger
        .record(&response(ProviderKind::Cloud, "cloud_fast", 5.0), Some("research"))
        .await
        .unwrap();

    let status = ledger.budget_status(30.0).await.unwrap();
    assert!((status.spent_usd - 15.0).abs() < 1e-9);
    assert!((status.remaining_usd - 15.0).abs() < 1e-9);
    assert!((status.percent_used - 50.0).abs() < 1e-9);

    let again = ledger.budget_status(30.0).await.unwrap();
    assert_eq!(status, again);
}

#[tokio::test]
async fn overage_reports_negative_remaining() {
    let ledger = UsageLedger::open_in_memory().await.unwrap();
    ledger
        .record(&response(ProviderKind::Cloud, "cloud_standard", 12.0), None)
        .await
        .unwrap();
    let status = ledger.budget_status(10.0).await.unwrap();
    assert!((status.remaining_usd + 2.0).abs() < 1e-9);
    assert!(status.percent_used > 100.0);
}

#[tokio::test]
async fn on_disk_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("usage.db");

    {
        let ledger = UsageLedger::open(&path).await.unwrap();
        ledger
            .record(&response(ProviderKind::Cloud, "cloud_fast", 2.5), None)
            .await
            .unwrap();
        ledger
            .record(&response(ProviderKind::Local, "whisper", 0.0), Some("summarize"))
            .await
            .unwrap();
    }

    let reopened = UsageLedger::open(&path).await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 2);
    assert!((reopened.monthly_cloud_spend_usd().await.unwrap() - 2.5).abs() < 1e-9);
    let stats = reopened.model_stats(StatsPeriod::Month).await.unwrap();
    assert_eq!(stats.len(), 2);

    let gate = BudgetGate::new(
        &CostConfig {
            monthly_budget_usd: 3.0,
            warn_fraction: 0.8,
        },
        reopened,
    );
    assert!(gate.admit(0.25).await.is_admitted());
    assert!(!gate.admit(0.5).await.is_admitted());
}

#[tokio::test]
async fn summary_serializes_for_reporting() {
    let ledger = UsageLedger::open_in_memory().await.unwrap();
    let summary = ledger.monthly_summary().await.unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["calls"], 0);
    assert_eq!(json["cost_usd"], 0.0);
}
