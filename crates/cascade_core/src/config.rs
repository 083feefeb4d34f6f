//! Engine and Stream Configuration

use serde::{Deserialize, Serialize};

use cascade_dsp::ProcessContext;

use crate::channel::DEFAULT_ORDER_CAPACITY;
use crate::error::{ChainError, EngineResult};
use crate::order::OrderSequence;

/// Largest block size `StreamConfig::validate` accepts, in frames
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Audio stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of interleaved channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Block size in frames (lower = less latency, higher = more stability)
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 512,
        }
    }
}

impl StreamConfig {
    /// Latency of one block in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Interleaved samples in one block
    pub fn samples_per_block(&self) -> usize {
        self.buffer_size as usize * self.channels as usize
    }

    /// Interleaved samples in the largest block any valid config allows
    pub fn max_samples_per_block(&self) -> usize {
        MAX_BUFFER_SIZE as usize * self.channels as usize
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if self.buffer_size < 32 || self.buffer_size > MAX_BUFFER_SIZE {
            return Err(format!("Invalid buffer size: {}", self.buffer_size));
        }
        Ok(())
    }

    /// The context stages are prepared with for this stream
    pub fn process_context(&self) -> ProcessContext {
        ProcessContext::new(
            self.sample_rate as f32,
            self.channels as usize,
            self.buffer_size as usize,
        )
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub stream: StreamConfig,

    /// How many order updates can queue up between two blocks
    pub order_capacity: usize,

    /// Order the renderer starts with
    #[serde(default)]
    pub initial_order: OrderSequence,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            order_capacity: DEFAULT_ORDER_CAPACITY,
            initial_order: OrderSequence::default(),
        }
    }
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 128, // ~2.6ms latency
            },
            ..Default::default()
        }
    }

    /// Create config optimized for stability
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 1024, // ~21ms latency
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.stream.validate().map_err(ChainError::ConfigError)?;
        if self.order_capacity == 0 {
            return Err(ChainError::ConfigError(
                "Order channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
