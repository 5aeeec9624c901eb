//! CLI configuration
//!
//! An optional TOML file supplies defaults; command-line flags win over it.
//!
//! ```toml
//! store_path = ".countkun"
//! actor = "operator@example.com"
//!
//! [store]
//! low_stock_threshold = 2
//!
//! [store.retry]
//! max_attempts = 8
//! strategy = "exponential"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use countkun_sync::StoreConfig;
use serde::{Deserialize, Serialize};

/// Directory used for the document store when nothing else is configured
pub const DEFAULT_STORE_PATH: &str = ".countkun";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Directory holding the JSON document files
    pub store_path: PathBuf,
    /// Actor signed in for this invocation
    pub actor: Option<String>,
    /// Store settings
    pub store: StoreConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            actor: None,
            store: StoreConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse TOML text and validate the store section.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.store.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, store_path: Option<PathBuf>, actor: Option<String>) -> Self {
        if let Some(store_path) = store_path {
            self.store_path = store_path;
        }
        if actor.is_some() {
            self.actor = actor;
        }
        self
    }
}
