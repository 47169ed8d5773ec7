// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage tracking, pricing, and the cloud budget gate for Tollgate.
//!
//! This crate provides:
//! - **Usage ledger**: append-only SQLite record of every routed call, with
//!   daily/monthly aggregates and per-model statistics
//! - **Pricing**: tier-table cost calculation and pre-call cost estimates
//! - **Budget gate**: admission control for cloud calls against the monthly limit

pub mod budget;
pub mod ledger;
pub mod pricing;

pub use budget::{Admission, BudgetGate, DenyReason, Reservation};
pub use ledger::{BudgetStatus, ModelStats, StatsPeriod, UsageLedger, UsageRecord, UsageSummary};
