//! Index group configuration
//!
//! Loaded from a JSON file:
//!
//! ```json
//! {
//!   "namespace": "app",
//!   "indexes": ["tasks", "devices"],
//!   "scan_page_size": 500,
//!   "key_discovery": "scan"
//! }
//! ```
//!
//! Only `namespace` is required.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::validate_name;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How an index's physical keys are found for removal and flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDiscovery {
    /// Glob scan over the index prefix
    #[default]
    Scan,
    /// Side set of every key ever written for the index
    Catalog,
}

/// Configuration of one index group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexGroupConfig {
    /// Key namespace shared by every index of the group (required)
    pub namespace: String,

    /// Indexes registered at construction (default: none)
    #[serde(default)]
    pub indexes: Vec<String>,

    /// Members fetched per call when enumerating a global set (default 500)
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,

    /// Key discovery mode (default "scan")
    #[serde(default)]
    pub key_discovery: KeyDiscovery,
}

fn default_scan_page_size() -> usize {
    500
}

impl IndexGroupConfig {
    /// Config with defaults for everything but the namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            indexes: Vec::new(),
            scan_page_size: default_scan_page_size(),
            key_discovery: KeyDiscovery::default(),
        }
    }

    pub fn with_indexes<I>(mut self, indexes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.indexes = indexes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scan_page_size(mut self, scan_page_size: usize) -> Self {
        self.scan_page_size = scan_page_size;
        self
    }

    pub fn with_key_discovery(mut self, key_discovery: KeyDiscovery) -> Self {
        self.key_discovery = key_discovery;
        self
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: IndexGroupConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_name(&self.namespace).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for index in &self.indexes {
            validate_name(index).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        if self.scan_page_size == 0 {
            return Err(ConfigError::Invalid("scan_page_size must be > 0".to_string()));
        }

        Ok(())
    }
}
