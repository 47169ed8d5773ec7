// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams between the router and its backends.

pub mod provider;

pub use provider::ProviderAdapter;
