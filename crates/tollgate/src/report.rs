// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate usage`, `tollgate budget`, and `tollgate models`.
//!
//! Read-only views over the usage ledger. `--json` prints structured output
//! for scripting.

use chrono::NaiveDate;
use serde::Serialize;
use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;
use tollgate_usage::{BudgetStatus, ModelStats, StatsPeriod, UsageSummary};

use crate::app;

#[derive(Debug, Serialize)]
struct UsageReport {
    daily: UsageSummary,
    monthly: UsageSummary,
}

pub async fn run_usage(
    config: &TollgateConfig,
    date: Option<NaiveDate>,
    json: bool,
) -> Result<(), TollgateError> {
    let ledger = app::open_ledger(config).await?;
    let report = UsageReport {
        daily: ledger.daily_summary(date).await?,
        monthly: ledger.monthly_summary().await?,
    };

    if json {
        print_json(&report);
    } else {
        println!();
        print_summary("today", &report.daily);
        print_summary("this month", &report.monthly);
    }
    Ok(())
}

pub async fn run_budget(
    config: &TollgateConfig,
    json: bool,
    use_color: bool,
) -> Result<(), TollgateError> {
    let ledger = app::open_ledger(config).await?;
    let status = ledger.budget_status(config.cost.monthly_budget_usd).await?;

    if json {
        print_json(&status);
        return Ok(());
    }

    println!();
    println!("  tollgate budget");
    println!("  {}", "-".repeat(35));
    println!("    Spent:     ${:.4}", status.spent_usd);
    println!("    Limit:     ${:.2}", status.limit_usd);
    println!("    Remaining: ${:.4}", status.remaining_usd);
    let level = budget_level(&status, config.cost.warn_fraction);
    let used = format!("{:.1}%", status.percent_used);
    if use_color {
        use colored::Colorize;
        let used = match level {
            BudgetLevel::Ok => used.green(),
            BudgetLevel::Warn => used.yellow(),
            BudgetLevel::Exhausted => used.red(),
        };
        println!("    Used:      {used}");
    } else {
        println!("    Used:      {used} [{}]", level.label());
    }
    println!();
    Ok(())
}

pub async fn run_models(
    config: &TollgateConfig,
    period: StatsPeriod,
    json: bool,
) -> Result<(), TollgateError> {
    let ledger = app::open_ledger(config).await?;
    let stats = ledger.model_stats(period).await?;

    if json {
        print_json(&stats);
    } else {
        println!();
        println!("  models ({period})");
        println!("  {}", "-".repeat(60));
        if stats.is_empty() {
            println!("    no calls recorded");
        }
        for line in model_lines(&stats) {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BudgetLevel {
    Ok,
    Warn,
    Exhausted,
}

impl BudgetLevel {
    fn label(self) -> &'static str {
        match self {
            BudgetLevel::Ok => "OK",
            BudgetLevel::Warn => "WARN",
            BudgetLevel::Exhausted => "EXHAUSTED",
        }
    }
}

fn budget_level(status: &BudgetStatus, warn_fraction: f64) -> BudgetLevel {
    if status.is_exhausted() {
        BudgetLevel::Exhausted
    } else if status.spent_usd >= status.limit_usd * warn_fraction {
        BudgetLevel::Warn
    } else {
        BudgetLevel::Ok
    }
}

fn print_summary(label: &str, summary: &UsageSummary) {
    println!("  {label} ({})", summary.period);
    println!("  {}", "-".repeat(35));
    println!("    Calls:   {}", summary.calls);
    for (provider, calls) in &summary.calls_by_provider {
        println!("      {provider:<6} {calls}");
    }
    println!(
        "    Tokens:  {} ({} prompt / {} completion)",
        summary.total_tokens, summary.prompt_tokens, summary.completion_tokens
    );
    println!("    Cost:    ${:.4}", summary.cost_usd);
    println!();
}

fn model_lines(stats: &[ModelStats]) -> Vec<String> {
    stats
        .iter()
        .map(|s| {
            format!(
                "{:<32} {:>6} calls {:>9.0}ms avg {:>10} tokens",
                s.model, s.calls, s.avg_latency_ms, s.total_tokens
            )
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_levels() {
        assert_eq!(budget_level(&BudgetStatus::new(10.0, 30.0), 0.8), BudgetLevel::Ok);
        assert_eq!(budget_level(&BudgetStatus::new(25.0, 30.0), 0.8), BudgetLevel::Warn);
        assert_eq!(
            budget_level(&BudgetStatus::new(30.0, 30.0), 0.8),
            BudgetLevel::Exhausted
        );
    }

    #[test]
    fn model_line_layout() {
        let lines = model_lines(&[ModelStats {
            model: "qwen2.5:14b".into(),
            calls: 3,
            avg_latency_ms: 812.4,
            total_tokens: 1500,
        }]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("qwen2.5:14b"));
        assert!(lines[0].contains("3 calls"));
        assert!(lines[0].contains("812ms avg"));
        assert!(lines[0].ends_with("1500 tokens"));
    }

    #[test]
    fn usage_report_serializes() {
        let report = UsageReport {
            daily: UsageSummary::default(),
            monthly: UsageSummary::default(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["daily"]["calls"], 0);
        assert!(json["monthly"]["calls_by_provider"].as_object().unwrap().is_empty());
    }
}
