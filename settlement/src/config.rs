//! Settlement engine configuration

use crate::{Result, SettlementError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Per-session event channel capacity for the fan-out hub the
    /// engine owns
    pub session_capacity: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            session_capacity: 256,
        }
    }
}

impl SettlementConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SettlementError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| SettlementError::Config(format!("Cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.session_capacity == 0 {
            return Err(SettlementError::Config(
                "session_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
