//! Cascade DSP - Digital Signal Processing Module
//!
//! This crate provides the effect stages for the Cascade chain:
//! - Phaser (swept allpass cascade)
//! - Chorus (modulated delay line)
//! - Overdrive (tanh saturation)
//! - Ladder filter (12/24 dB lowpass, highpass, bandpass)
//! - General-purpose biquad filter (peak, bandpass, notch, allpass)
//! - Lock-free parameter handles shared with the control plane
//!
//! # Architecture
//!
//! Every effect implements [`Stage`], so the chain can run them in any
//! order. The processing path follows a strict "no allocation in audio
//! callback" rule: buffers are sized in `prepare()` and parameters are read
//! from atomics once per block.

mod chorus;
mod error;
mod general_filter;
mod ladder;
mod lfo;
mod overdrive;
mod param;
mod phaser;
mod stage;

pub use chorus::{Chorus, ChorusParams};
pub use error::DspError;
pub use general_filter::{FilterMode, FilterSettings, GeneralFilter, GeneralFilterParams};
pub use ladder::{LadderFilter, LadderMode, LadderParams};
pub use overdrive::{Overdrive, OverdriveParams};
pub use param::{ChainParams, Choice, ChoiceParam, FloatParam, ParamRange, FLOAT_PARAM_COUNT};
pub use phaser::{Phaser, PhaserParams};
pub use stage::{ProcessContext, Stage};
