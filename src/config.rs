//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::events::EventQueue;

/// Settings fixed for an engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sample rate in Hz passed to every unit's `init`.
    pub sample_rate: f32,
    /// Frames per `compute` call.
    pub block_size: usize,
    /// Output (bargraph) values are reported once every this many blocks.
    pub output_poll_interval: u32,
    /// Events kept per block for the plot handler.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 128,
            output_poll_interval: 5,
            event_capacity: EventQueue::DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.block_size == 0 {
            return Err(EngineError::InvalidConfig("block size must be at least 1".to_string()));
        }
        if self.output_poll_interval == 0 {
            return Err(EngineError::InvalidConfig(
                "output poll interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
