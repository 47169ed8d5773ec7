// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use tollgate_config::TollgateConfig;
use tollgate_usage::UsageLedger;

/// Built-in configuration with the given monthly cloud budget.
pub fn test_config(monthly_budget_usd: f64) -> TollgateConfig {
    let mut config = TollgateConfig::default();
    config.cost.monthly_budget_usd = monthly_budget_usd;
    config
}

/// Empty in-memory usage ledger.
pub async fn in_memory_ledger() -> UsageLedger {
    UsageLedger::open_in_memory()
        .await
        .expect("in-memory ledger should open")
}
