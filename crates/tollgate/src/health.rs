// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate health` command implementation.

use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;
use tollgate_health::HealthSnapshot;

use crate::app;

pub async fn run_health(
    config: &TollgateConfig,
    json: bool,
    use_color: bool,
) -> Result<(), TollgateError> {
    let providers = app::build_providers(config)?;
    let monitor = app::build_health_monitor(config, providers);
    let snapshot = monitor.status_report().await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print_snapshot(&snapshot, use_color);
    }
    Ok(())
}

fn print_snapshot(snapshot: &HealthSnapshot, use_color: bool) {
    println!();
    println!("  tollgate health ({})", snapshot.checked_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  {}", "-".repeat(35));
    for provider in &snapshot.providers {
        let state = if use_color {
            use colored::Colorize;
            if provider.available {
                format!("{} reachable", "✓".green())
            } else {
                format!("{} unreachable", "✗".red())
            }
        } else if provider.available {
            "[OK] reachable".to_string()
        } else {
            "[FAIL] unreachable".to_string()
        };
        println!("    {:<10} ({:<5}) {state}", provider.name, provider.kind.to_string());
    }
    if !snapshot.loaded_models.is_empty() {
        println!("    Loaded:   {}", snapshot.loaded_models.join(", "));
    }
    println!();
}
