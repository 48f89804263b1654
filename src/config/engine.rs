use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Fan-out engine parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    /// Data center this engine serves; used for initial pushes to new
    /// watchers and for empty pushes
    #[serde(default = "default_data_center")]
    pub data_center: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_center: default_data_center(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.data_center.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "engine.data_center must not be empty".into(),
            )));
        }
        Ok(())
    }
}

fn default_data_center() -> String {
    "DefaultDataCenter".to_string()
}
