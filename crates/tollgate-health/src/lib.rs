// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-staleness view of backend reachability.
//!
//! [`HealthMonitor`] probes every provider's `available()` and, for local
//! backends, the list of loaded models. Results are cached behind a
//! `tokio::sync::RwLock` and refreshed at most once per configured interval.
//! Probes run without holding the lock, so readers never wait on the network.
//! On the request path the router only uses [`HealthMonitor::cached_local_healthy`]
//! and [`HealthMonitor::spawn_refresh_if_due`], neither of which awaits a probe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tollgate_config::model::HealthConfig;
use tollgate_core::{ProviderAdapter, ProviderKind};
use tracing::{debug, warn};

/// Probe result for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub kind: ProviderKind,
    pub available: bool,
}

/// Result of one probe round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub checked_at: DateTime<Utc>,
    pub providers: Vec<ProviderHealth>,
    /// Models loaded on local backends at probe time.
    pub loaded_models: Vec<String>,
}

impl HealthSnapshot {
    /// True when at least one provider of `kind` answered its probe.
    pub fn kind_healthy(&self, kind: ProviderKind) -> bool {
        self.providers
            .iter()
            .any(|p| p.kind == kind && p.available)
    }

    pub fn local_healthy(&self) -> bool {
        self.kind_healthy(ProviderKind::Local)
    }

    pub fn cloud_healthy(&self) -> bool {
        self.kind_healthy(ProviderKind::Cloud)
    }
}

struct Cached {
    at: Instant,
    snapshot: HealthSnapshot,
}

/// TTL-cached health monitor shared by the router and status commands.
pub struct HealthMonitor {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    interval: Duration,
    state: RwLock<Option<Cached>>,
    refreshing: AtomicBool,
}

impl HealthMonitor {
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>, interval: Duration) -> Self {
        Self {
            providers,
            interval,
            state: RwLock::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn from_config(providers: Vec<Arc<dyn ProviderAdapter>>, config: &HealthConfig) -> Self {
        Self::new(providers, Duration::from_secs(config.interval_secs))
    }

    /// Probe every provider now and replace the cached snapshot.
    pub async fn check_all(&self) -> HealthSnapshot {
        let probes = self.providers.iter().map(|provider| async move {
            let available = provider.available().await;
            let models = if provider.kind() == ProviderKind::Local && available {
                match provider.loaded_models().await {
                    Ok(models) => models,
                    Err(e) => {
                        warn!(provider = provider.name(), error = %e, "listing loaded models failed");
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };
            if !available {
                warn!(provider = provider.name(), kind = %provider.kind(), "backend unreachable");
            }
            (
                ProviderHealth {
                    name: provider.name().to_string(),
                    kind: provider.kind(),
                    available,
                },
                models,
            )
        });

        let mut providers = Vec::with_capacity(self.providers.len());
        let mut loaded_models = Vec::new();
        for (health, models) in join_all(probes).await {
            providers.push(health);
            loaded_models.extend(models);
        }

        let snapshot = HealthSnapshot {
            checked_at: Utc::now(),
            providers,
            loaded_models,
        };
        debug!(
            local = snapshot.local_healthy(),
            cloud = snapshot.cloud_healthy(),
            "health check complete"
        );

        *self.state.write().await = Some(Cached {
            at: Instant::now(),
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    /// True if no check has run yet or the interval has elapsed since the last.
    pub async fn check_due(&self) -> bool {
        match self.state.read().await.as_ref() {
            Some(cached) => cached.at.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Cached snapshot, running the first check lazily.
    pub async fn status_report(&self) -> HealthSnapshot {
        if let Some(cached) = self.state.read().await.as_ref() {
            return cached.snapshot.clone();
        }
        self.check_all().await
    }

    /// Refresh only when the interval has elapsed, then return the snapshot.
    pub async fn refresh_if_due(&self) -> HealthSnapshot {
        if self.check_due().await {
            self.check_all().await
        } else {
            self.status_report().await
        }
    }

    pub async fn local_healthy(&self) -> bool {
        self.status_report().await.local_healthy()
    }

    pub async fn cloud_healthy(&self) -> bool {
        self.status_report().await.cloud_healthy()
    }

    /// Local health from the cache only. `None` when no check has run, the
    /// last one is older than the interval, or a check is writing the cache.
    pub fn cached_local_healthy(&self) -> Option<bool> {
        let state = self.state.try_read().ok()?;
        let cached = state.as_ref()?;
        (cached.at.elapsed() < self.interval).then(|| cached.snapshot.local_healthy())
    }

    /// Start a background [`check_all`](Self::check_all) if the cache is
    /// missing or stale, without waiting for it. At most one refresh runs at
    /// a time. Returns whether a refresh was started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_refresh_if_due(self: &Arc<Self>) -> bool {
        let due = match self.state.try_read() {
            Ok(state) => state
                .as_ref()
                .is_none_or(|cached| cached.at.elapsed() >= self.interval),
            // A check is writing the cache right now.
            Err(_) => false,
        };
        if !due || self.refreshing.swap(true, Ordering::AcqRel) {
            return false;
        }

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor.check_all().await;
            monitor.refreshing.store(false, Ordering::Release);
        });
        debug!("background health refresh started");
        true
    }

    /// When the cached snapshot was taken, if any.
    pub async fn last_check_at(&self) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|cached| cached.snapshot.checked_at)
    }
}
