//! Server configuration file

use std::path::Path;

use anyhow::{Context, Result};
use lb_core::SessionSettings;
use lb_data::DatasetConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Everything the server reads at startup. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind: String,

    pub dataset: DatasetConfig,

    pub session: SessionSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            dataset: DatasetConfig::default(),
            session: SessionSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}
