//! DSP Error Types

use thiserror::Error;

/// Errors that can occur during DSP setup and parameter handling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid choice index {index} for parameter '{name}'")]
    InvalidChoice { name: String, index: usize },

    #[error("Choice parameter '{name}' needs a non-negative index, got {value}")]
    InvalidChoiceValue { name: String, value: f32 },

    #[error("Invalid filter coefficients for frequency {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),
}
