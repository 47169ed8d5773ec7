// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate tiers`: the tier table and escalation map.

use tollgate_config::{TierConfig, TollgateConfig};

pub fn print_tiers(config: &TollgateConfig, use_color: bool) {
    println!();
    println!("  tiers");
    println!("  {}", "-".repeat(70));
    for line in tier_lines(config) {
        println!("    {line}");
    }
    println!();
    println!("  escalation");
    println!("  {}", "-".repeat(35));
    for (from, to) in &config.escalation {
        if use_color {
            use colored::Colorize;
            println!("    {:<12} {} {}", from, "->".cyan(), to);
        } else {
            println!("    {from:<12} -> {to}");
        }
    }
    println!();
}

fn tier_lines(config: &TollgateConfig) -> Vec<String> {
    config
        .tiers
        .iter()
        .map(|(name, tier)| {
            format!(
                "{:<16} {:<5} {:<28} ctx {:>6}  temp {:.1}  {}",
                name,
                tier.backend.to_string(),
                tier.model,
                tier.context_window,
                tier.temperature,
                price_label(tier)
            )
        })
        .collect()
}

fn price_label(tier: &TierConfig) -> String {
    match &tier.pricing {
        Some(p) => format!("${:.2}/${:.2} per Mtok", p.input_per_mtok, p.output_per_mtok),
        None => "free".to_string(),
    }
}
