// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tollgate integration tests.
//!
//! Provides a scripted provider adapter and fixtures for fast,
//! deterministic tests without a model server or API key.
//!
//! # Components
//!
//! - [`MockProvider`] - Provider adapter replaying a FIFO script of replies
//! - [`fixtures`] - Default configuration and in-memory ledger helpers

pub mod fixtures;
pub mod mock_provider;

pub use fixtures::{in_memory_ledger, test_config};
pub use mock_provider::{MockProvider, MockReply};
