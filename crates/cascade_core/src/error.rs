//! Engine Error Types

use thiserror::Error;

use crate::order::{StageId, STAGE_COUNT};

/// Errors that can occur in the chain engine
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Stage {0} appears more than once in the chain order")]
    DuplicateStage(StageId),

    #[error("Chain order has {got} stages, at most {max} allowed", max = STAGE_COUNT)]
    TooManyStages { got: usize },

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Chain slot {index} out of range (must be 0-{max})", max = STAGE_COUNT - 1)]
    SlotOutOfRange { index: usize },

    #[error("Order channel full - render thread hasn't drained pending updates yet")]
    OrderChannelFull,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("DSP error: {0}")]
    Dsp(#[from] cascade_dsp::DspError),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to play audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, ChainError>;
