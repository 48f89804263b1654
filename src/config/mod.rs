//! Configuration for the push fan-out engine.
//!
//! Loading priority:
//! 1. Default values (hardcoded)
//! 2. Optional TOML config file
//! 3. Environment variables with the `PUSH` prefix (highest priority)

mod engine;
mod sequencer;
pub use engine::*;
pub use sequencer::*;


use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Fan-out engine parameters
    #[serde(default)]
    pub engine: EngineConfig,
    /// Keyed sequencer sizing
    #[serde(default)]
    pub sequencer: SequencerConfig,
}

impl Settings {
    /// Load configuration from an optional TOML file, then merge
    /// `PUSH`-prefixed environment variables on top
    /// (e.g. `PUSH__SEQUENCER__LANES=16`).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("PUSH").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.sequencer.validate()?;
        Ok(())
    }
}
