// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered `tollgate.toml` loading for the model router.
//!
//! Files merge system, then user, then local, and `TOLLGATE_*` variables win
//! over all of them. Every table denies unknown fields; failures come back as
//! miette diagnostics that suggest the nearest valid key or tier name.
//!
//! ```no_run
//! let config = tollgate_config::load_and_validate().expect("config errors");
//! println!("default tier: {}", config.routing.default_tier);
//! ```

use std::path::{Path, PathBuf};

use crate::loader::{LOCAL_CONFIG, SYSTEM_CONFIG};

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{TierConfig, TierPricing, TollgateConfig};

/// Load from the standard file hierarchy and validate.
pub fn load_and_validate() -> Result<TollgateConfig, Vec<ConfigError>> {
    checked(loader::load_config(), hierarchy_sources)
}

/// Load one file (plus env overrides) and validate.
pub fn load_and_validate_path(path: &Path) -> Result<TollgateConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_sources([path.to_path_buf()])
    })
}

pub fn load_and_validate_str(toml_content: &str) -> Result<TollgateConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Sources are only read back when extraction failed and spans are needed.
fn checked(
    loaded: Result<TollgateConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<TollgateConfig, Vec<ConfigError>> {
    let config =
        loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn hierarchy_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|dir| dir.join(LOCAL_CONFIG))
        .unwrap_or_else(|_| PathBuf::from(LOCAL_CONFIG));
    let candidates = [Some(local), loader::user_config_path(), Some(SYSTEM_CONFIG.into())];
    read_sources(candidates.into_iter().flatten())
}

fn read_sources(paths: impl IntoIterator<Item = PathBuf>) -> Vec<(String, String)> {
    paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect()
}
