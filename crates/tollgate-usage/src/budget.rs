// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission control for cloud calls.
//!
//! The gate reads incurred cloud spend for the current month from the ledger
//! on every check, so enforcement survives restarts without any in-memory
//! running total. It never returns an error: a ledger failure denies the call.
//!
//! Calls admitted through [`BudgetGate::reserve`] hold their estimate until
//! the returned [`Reservation`] is dropped. Reservations are granted one at a
//! time, so concurrent callers see each other's holds and cannot jointly
//! overshoot the limit by more than the error in their estimates.

use std::sync::{Arc, Mutex, PoisonError};

use tollgate_config::model::CostConfig;
use tracing::{debug, error, info, warn};

use crate::ledger::UsageLedger;

/// Why a cloud call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DenyReason {
    /// Incurred, held and estimated spend meets or exceeds the monthly limit.
    BudgetExhausted,
    /// Spend could not be read from the ledger.
    LedgerUnavailable,
}

/// Outcome of a budget check. `projected_usd` includes estimates held by
/// calls still in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Admit {
        spent_usd: f64,
        projected_usd: f64,
    },
    Deny {
        reason: DenyReason,
        spent_usd: f64,
        projected_usd: f64,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit { .. })
    }
}

/// Budget held for one admitted cloud call. Keep it until the call's cost
/// is in the ledger; dropping it releases the hold.
#[must_use = "the hold is released as soon as the reservation is dropped"]
#[derive(Debug)]
pub struct Reservation {
    held_usd: Arc<Mutex<f64>>,
    amount_usd: f64,
}

impl Reservation {
    pub fn amount_usd(&self) -> f64 {
        self.amount_usd
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut held = self.held_usd.lock().unwrap_or_else(PoisonError::into_inner);
        *held = (*held - self.amount_usd).max(0.0);
    }
}

/// Monthly cloud budget gate backed by the usage ledger.
///
/// Clones share their in-flight holds.
#[derive(Clone)]
pub struct BudgetGate {
    ledger: UsageLedger,
    monthly_limit_usd: f64,
    warn_fraction: f64,
    held_usd: Arc<Mutex<f64>>,
    admissions: Arc<tokio::sync::Mutex<()>>,
}

impl BudgetGate {
    pub fn new(config: &CostConfig, ledger: UsageLedger) -> Self {
        Self {
            ledger,
            monthly_limit_usd: config.monthly_budget_usd,
            warn_fraction: config.warn_fraction,
            held_usd: Arc::new(Mutex::new(0.0)),
            admissions: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn monthly_limit_usd(&self) -> f64 {
        self.monthly_limit_usd
    }

    /// Estimated spend of admitted calls whose reservations are still alive.
    pub fn held_usd(&self) -> f64 {
        *self.held_usd.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a cloud call estimated at `estimated_cost_usd` may run,
    /// without holding anything for it.
    pub async fn admit(&self, estimated_cost_usd: f64) -> Admission {
        self.check(estimated_cost_usd).await
    }

    /// Admit and hold `estimated_cost_usd` until the reservation drops.
    /// A refusal comes back as the `Deny` admission.
    pub async fn reserve(&self, estimated_cost_usd: f64) -> Result<Reservation, Admission> {
        let _turn = self.admissions.lock().await;
        let admission = self.check(estimated_cost_usd).await;
        if !admission.is_admitted() {
            return Err(admission);
        }

        let amount_usd = estimated_cost_usd.max(0.0);
        *self.held_usd.lock().unwrap_or_else(PoisonError::into_inner) += amount_usd;
        debug!(amount_usd, "cloud budget reserved");
        Ok(Reservation {
            held_usd: Arc::clone(&self.held_usd),
            amount_usd,
        })
    }

    async fn check(&self, estimated_cost_usd: f64) -> Admission {
        let spent_usd = match self.ledger.monthly_cloud_spend_usd().await {
            Ok(spent) => spent,
            Err(e) => {
                error!(error = %e, "cannot read cloud spend, denying cloud call");
                return Admission::Deny {
                    reason: DenyReason::LedgerUnavailable,
                    spent_usd: 0.0,
                    projected_usd: estimated_cost_usd,
                };
            }
        };
        let projected_usd = spent_usd + self.held_usd() + estimated_cost_usd.max(0.0);

        if spent_usd >= self.monthly_limit_usd || projected_usd >= self.monthly_limit_usd {
            info!(
                spent_usd,
                projected_usd,
                limit_usd = self.monthly_limit_usd,
                "monthly cloud budget exhausted"
            );
            return Admission::Deny {
                reason: DenyReason::BudgetExhausted,
                spent_usd,
                projected_usd,
            };
        }

        if projected_usd >= self.monthly_limit_usd * self.warn_fraction {
            warn!(
                spent_usd,
                projected_usd,
                limit_usd = self.monthly_limit_usd,
                "approaching monthly cloud budget ({:.0}%+)",
                self.warn_fraction * 100.0
            );
        }

        Admission::Admit {
            spent_usd,
            projected_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tollgate_core::{FinishReason, ProviderKind, Response, TokenUsage};

    fn cost_config(limit: f64) -> CostConfig {
        CostConfig {
            monthly_budget_usd: limit,
            warn_fraction: 0.8,
        }
    }

    fn cloud_response(cost: f64) -> Response {
        Response {
            content: Some("ok".into()),
            tool_calls: vec![],
            usage: TokenUsage::new(1000, 500),
            provider: ProviderKind::Cloud,
            tier: "cloud_standard".into(),
            model: "claude-sonnet-4-20250514".into(),
            finish_reason: FinishReason::Stop,
            cost_usd: cost,
            escalated_from: None,
            latency_ms: 900,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn admits_under_limit() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        ledger.record(&cloud_response(10.0), None).await.unwrap();
        let gate = BudgetGate::new(&cost_config(30.0), ledger);
        let admission = gate.admit(1.0).await;
        assert_eq!(
            admission,
            Admission::Admit {
                spent_usd: 10.0,
                projected_usd: 11.0
            }
        );
    }

    #[tokio::test]
    async fn denies_when_spend_meets_limit() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        ledger.record(&cloud_response(30.0), None).await.unwrap();
        let gate = BudgetGate::new(&cost_config(30.0), ledger);
        let admission = gate.admit(0.0).await;
        assert!(matches!(
            admission,
            Admission::Deny {
                reason: DenyReason::BudgetExhausted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn denies_when_projection_crosses_limit() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        ledger.record(&cloud_response(29.5), None).await.unwrap();
        let gate = BudgetGate::new(&cost_config(30.0), ledger);
        assert!(!gate.admit(0.6).await.is_admitted());
        assert!(gate.admit(0.1).await.is_admitted());
    }

    #[tokio::test]
    async fn zero_limit_denies_every_cloud_call() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        let gate = BudgetGate::new(&cost_config(0.0), ledger);
        assert!(!gate.admit(0.0).await.is_admitted());
    }

    #[test]
    fn deny_reason_display() {
        assert_eq!(DenyReason::BudgetExhausted.to_string(), "budget_exhausted");
        assert_eq!(DenyReason::LedgerUnavailable.to_string(), "ledger_unavailable");
    }

    #[tokio::test]
    async fn held_estimates_count_against_the_limit() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        let gate = BudgetGate::new(&cost_config(1.0), ledger);

        let first = gate.reserve(0.4).await.unwrap();
        let second = gate.reserve(0.4).await.unwrap();
        assert!((gate.held_usd() - 0.8).abs() < 1e-9);

        let refused = gate.reserve(0.4).await.unwrap_err();
        assert!(matches!(
            refused,
            Admission::Deny {
                reason: DenyReason::BudgetExhausted,
                ..
            }
        ));

        drop(first);
        assert!((gate.held_usd() - 0.4).abs() < 1e-9);
        let third = gate.reserve(0.4).await.unwrap();
        assert_eq!(third.amount_usd(), 0.4);
        drop((second, third));
        assert!(gate.held_usd().abs() < 1e-9);
    }

    #[tokio::test]
    async fn concurrent_reservations_never_exceed_the_limit() {
        let ledger = UsageLedger::open_in_memory().await.unwrap();
        let gate = BudgetGate::new(&cost_config(1.0), ledger);

        let attempts = (0..8).map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.reserve(0.3).await })
        });
        let mut held = Vec::new();
        for attempt in attempts.collect::<Vec<_>>() {
            if let Ok(reservation) = attempt.await.unwrap() {
                held.push(reservation);
            }
        }

        assert_eq!(held.len(), 3);
        assert!(gate.held_usd() < 1.0);
    }
}
