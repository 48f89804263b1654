use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Keyed sequencer sizing
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SequencerConfig {
    /// Number of lanes; one worker drains each lane. More lanes raise
    /// cross-key parallelism, never per-key concurrency
    #[serde(default = "default_lanes")]
    pub lanes: usize,

    /// Queue capacity per lane; submissions to a full lane are rejected
    #[serde(default = "default_lane_buffer_size")]
    pub lane_buffer_size: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            lanes: default_lanes(),
            lane_buffer_size: default_lane_buffer_size(),
        }
    }
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lanes == 0 {
            return Err(Error::Config(ConfigError::Message(
                "sequencer.lanes must be greater than 0".into(),
            )));
        }
        if self.lane_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "sequencer.lane_buffer_size must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_lanes() -> usize {
    8
}

fn default_lane_buffer_size() -> usize {
    10_000
}
