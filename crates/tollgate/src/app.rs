// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by the subcommands.

use std::io::IsTerminal;
use std::sync::Arc;

use tollgate_anthropic::AnthropicProvider;
use tollgate_config::TollgateConfig;
use tollgate_core::{ProviderAdapter, TollgateError};
use tollgate_health::HealthMonitor;
use tollgate_ollama::OllamaProvider;
use tollgate_router::Router;
use tollgate_usage::UsageLedger;

/// Colors only when allowed and stdout is a terminal.
pub fn use_color(plain: bool) -> bool {
    !plain && std::io::stdout().is_terminal()
}

pub async fn open_ledger(config: &TollgateConfig) -> Result<UsageLedger, TollgateError> {
    UsageLedger::open(&config.storage.database_path).await
}

/// One adapter per backend kind: local first, then cloud.
pub fn build_providers(
    config: &TollgateConfig,
) -> Result<Vec<Arc<dyn ProviderAdapter>>, TollgateError> {
    let local: Arc<dyn ProviderAdapter> = Arc::new(OllamaProvider::new(&config.ollama)?);
    let cloud: Arc<dyn ProviderAdapter> = Arc::new(AnthropicProvider::new(&config.anthropic)?);
    Ok(vec![local, cloud])
}

pub fn build_health_monitor(
    config: &TollgateConfig,
    providers: Vec<Arc<dyn ProviderAdapter>>,
) -> HealthMonitor {
    HealthMonitor::from_config(providers, &config.health)
}

/// Fully wired router over the configured backends and ledger, with a
/// health snapshot already taken.
pub async fn build_router(config: TollgateConfig) -> Result<Router, TollgateError> {
    let ledger = open_ledger(&config).await?;
    let providers = build_providers(&config)?;
    let monitor = Arc::new(build_health_monitor(&config, providers.clone()));
    // Seed the cache so the first request can already skip a dead local backend.
    monitor.check_all().await;

    let mut router = Router::new(Arc::new(config), ledger).with_health_monitor(monitor);
    for provider in providers {
        router = router.with_provider(provider);
    }
    Ok(router)
}
