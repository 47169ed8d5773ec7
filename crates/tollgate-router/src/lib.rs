// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tier resolution and escalation-aware routing for Tollgate.
//!
//! This crate provides:
//! - [`TierClassifier`]: explicit tier > skill map > keyword signals > default
//! - [`QualityCheck`]: empty/repetitive output detection for local responses
//! - [`Router`]: calls the resolved tier, escalates local failures to the
//!   mapped cloud tier through the budget gate, substitutes local fallback
//!   tiers when the cloud is refused or fails, and records every answer

pub mod classifier;
pub mod quality;
pub mod router;

pub use classifier::{TierClassifier, TierResolution, TierSource};
pub use quality::{QualityCheck, QualityVerdict};
pub use router::{EscalationCause, GenerateRequest, Route, Router};
