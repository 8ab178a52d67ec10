#![allow(clippy::module_name_repetitions)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the client stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub suggestions: SuggestionConfig,
    /// Description shown for an optimistic item nobody could resolve a
    /// name for.
    #[serde(default = "default_placeholder_description")]
    pub placeholder_description: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            suggestions: SuggestionConfig::default(),
            placeholder_description: default_placeholder_description(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    /// How many suggestions the entry form shows at once.
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
    /// How many usage rows one ranking query fetches.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            display_limit: default_display_limit(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

/// Load store config from a TOML file. A missing file yields defaults.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_store_config(path: &Path) -> Result<StoreConfig> {
    if !path.exists() {
        return Ok(StoreConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<StoreConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

const fn default_display_limit() -> usize {
    8
}

const fn default_fetch_limit() -> usize {
    100
}

fn default_placeholder_description() -> String {
    "(unnamed item)".to_string()
}
