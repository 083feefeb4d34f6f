//! Lock-free Parameter Handles
//!
//! Every tunable value lives in an atomic that the control plane writes and
//! the owning stage reads once per block. No locks are shared with the
//! audio thread.
//!
//! Rust pattern: AtomicF32 doesn't exist, so float values are stored as
//! `f32` bits in an `AtomicU32`.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use crate::chorus::ChorusParams;
use crate::error::DspError;
use crate::general_filter::GeneralFilterParams;
use crate::ladder::LadderParams;
use crate::overdrive::OverdriveParams;
use crate::phaser::PhaserParams;

/// Inclusive value range with a default
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        value.clamp(self.min, self.max)
    }

    /// Map a value in this range to 0.0 - 1.0
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.clamp(value) - self.min) / span).clamp(0.0, 1.0)
    }

    /// Map 0.0 - 1.0 back into this range
    pub fn denormalize(&self, normalized: f32) -> f32 {
        self.clamp(self.min + normalized.clamp(0.0, 1.0) * (self.max - self.min))
    }
}

/// A named, range-checked float parameter
#[derive(Debug)]
pub struct FloatParam {
    name: &'static str,
    range: ParamRange,
    bits: AtomicU32,
}

impl FloatParam {
    pub fn new(name: &'static str, range: ParamRange) -> Self {
        Self {
            name,
            range,
            bits: AtomicU32::new(range.default.to_bits()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn range(&self) -> ParamRange {
        self.range
    }

    /// Store a new value, clamped to the parameter's range
    pub fn set(&self, value: f32) {
        let value = self.range.clamp(value);
        // Relaxed is enough: each value is independent and read once per block
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn normalized(&self) -> f32 {
        self.range.normalize(self.get())
    }

    pub fn set_normalized(&self, normalized: f32) {
        self.set(self.range.denormalize(normalized));
    }

    pub fn reset_to_default(&self) {
        self.set(self.range.default);
    }
}

/// Enum types selectable through a [`ChoiceParam`]
pub trait Choice: Copy + PartialEq + Send + Sync + 'static {
    /// Display labels, in index order
    const LABELS: &'static [&'static str];

    fn index(self) -> usize;

    fn from_index(index: usize) -> Option<Self>;
}

/// A named enum parameter backed by an `AtomicU8`
#[derive(Debug)]
pub struct ChoiceParam<T: Choice> {
    name: &'static str,
    default: T,
    index: AtomicU8,
    _choice: PhantomData<T>,
}

impl<T: Choice> ChoiceParam<T> {
    pub fn new(name: &'static str, default: T) -> Self {
        Self {
            name,
            default,
            index: AtomicU8::new(default.index() as u8),
            _choice: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn labels(&self) -> &'static [&'static str] {
        T::LABELS
    }

    pub fn set(&self, value: T) {
        self.index.store(value.index() as u8, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> T {
        T::from_index(self.index() as usize).unwrap_or(self.default)
    }

    pub fn index(&self) -> u8 {
        self.index.load(Ordering::Relaxed)
    }

    pub fn set_index(&self, index: usize) -> Result<(), DspError> {
        let value = T::from_index(index).ok_or_else(|| DspError::InvalidChoice {
            name: self.name.to_string(),
            index,
        })?;
        self.set(value);
        Ok(())
    }
}

/// Number of float parameters across the whole chain
pub const FLOAT_PARAM_COUNT: usize = 17;

/// Typed parameter handles for every stage in the chain
///
/// Built once; the engine keeps a clone for writing and each stage holds
/// its own `Arc` for reading.
#[derive(Debug, Clone, Default)]
pub struct ChainParams {
    pub phaser: Arc<PhaserParams>,
    pub chorus: Arc<ChorusParams>,
    pub overdrive: Arc<OverdriveParams>,
    pub ladder: Arc<LadderParams>,
    pub general_filter: Arc<GeneralFilterParams>,
}

impl ChainParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// All float parameters, grouped by stage in chain-default order
    pub fn float_params(&self) -> [&FloatParam; FLOAT_PARAM_COUNT] {
        [
            &self.phaser.rate_hz,
            &self.phaser.center_freq_hz,
            &self.phaser.depth,
            &self.phaser.feedback,
            &self.phaser.mix,
            &self.chorus.rate_hz,
            &self.chorus.depth,
            &self.chorus.center_delay_ms,
            &self.chorus.feedback,
            &self.chorus.mix,
            &self.overdrive.saturation,
            &self.ladder.cutoff_hz,
            &self.ladder.resonance,
            &self.ladder.drive,
            &self.general_filter.freq_hz,
            &self.general_filter.quality,
            &self.general_filter.gain_db,
        ]
    }

    /// Names of the choice parameters
    pub fn choice_names(&self) -> [&'static str; 2] {
        [self.ladder.mode.name(), self.general_filter.mode.name()]
    }

    /// Look up a float parameter by name (ASCII case-insensitive)
    pub fn float_param(&self, name: &str) -> Option<&FloatParam> {
        self.float_params()
            .into_iter()
            .find(|param| param.name().eq_ignore_ascii_case(name))
    }

    /// Current index of a choice parameter
    pub fn choice_index(&self, name: &str) -> Option<usize> {
        if self.ladder.mode.name().eq_ignore_ascii_case(name) {
            Some(self.ladder.mode.index() as usize)
        } else if self.general_filter.mode.name().eq_ignore_ascii_case(name) {
            Some(self.general_filter.mode.index() as usize)
        } else {
            None
        }
    }

    pub fn set_choice_index(&self, name: &str, index: usize) -> Result<(), DspError> {
        if self.ladder.mode.name().eq_ignore_ascii_case(name) {
            self.ladder.mode.set_index(index)
        } else if self.general_filter.mode.name().eq_ignore_ascii_case(name) {
            self.general_filter.mode.set_index(index)
        } else {
            Err(DspError::UnknownParameter(name.to_string()))
        }
    }

    /// Set any parameter by name; choice parameters take the value as an index
    pub fn set_by_name(&self, name: &str, value: f32) -> Result<(), DspError> {
        if let Some(param) = self.float_param(name) {
            param.set(value);
            return Ok(());
        }
        if self.choice_index(name).is_some() {
            if !value.is_finite() || value < 0.0 {
                return Err(DspError::InvalidChoiceValue {
                    name: name.to_string(),
                    value,
                });
            }
            return self.set_choice_index(name, value.round() as usize);
        }
        Err(DspError::UnknownParameter(name.to_string()))
    }

    /// Put every parameter back to its default
    pub fn reset_to_defaults(&self) {
        for param in self.float_params() {
            param.reset_to_default();
        }
        self.ladder.mode.set(Default::default());
        self.general_filter.mode.set(Default::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general_filter::FilterMode;
    use crate::ladder::LadderMode;

    #[test]
    fn test_range_clamping() {
        let param = FloatParam::new("Test", ParamRange::new(-1.0, 1.0, 0.0));
        assert_eq!(param.get(), 0.0);

        param.set(5.0);
        assert_eq!(param.get(), 1.0);

        param.set(-5.0);
        assert_eq!(param.get(), -1.0);

        param.set(f32::NAN);
        assert_eq!(param.get(), 0.0, "NaN should fall back to default");
    }

    #[test]
    fn test_normalized_roundtrip_bounds() {
        let param = FloatParam::new("Freq", ParamRange::new(20.0, 20000.0, 1000.0));
        param.set_normalized(0.0);
        assert_eq!(param.get(), 20.0);
        param.set_normalized(1.0);
        assert_eq!(param.get(), 20000.0);
        param.set_normalized(2.0);
        assert_eq!(param.get(), 20000.0);
        assert_eq!(param.normalized(), 1.0);
    }

    #[test]
    fn test_all_float_params_resolve_by_name() {
        let params = ChainParams::new();
        let all = params.float_params();
        assert_eq!(all.len(), FLOAT_PARAM_COUNT);

        for param in all {
            let found = params.float_param(param.name()).expect("name should resolve");
            assert!(std::ptr::eq(found, param));
            assert_eq!(param.get(), param.range().default);
        }
    }

    #[test]
    fn test_param_names_are_unique() {
        let params = ChainParams::new();
        let mut names: Vec<&str> = params.float_params().iter().map(|p| p.name()).collect();
        names.extend(params.choice_names());
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_factory_defaults() {
        let params = ChainParams::new();
        assert_eq!(params.phaser.rate_hz.get(), 0.2);
        assert_eq!(params.phaser.center_freq_hz.get(), 1000.0);
        assert_eq!(params.chorus.center_delay_ms.get(), 7.0);
        assert_eq!(params.overdrive.saturation.get(), 1.0);
        assert_eq!(params.ladder.cutoff_hz.get(), 20000.0);
        assert_eq!(params.general_filter.freq_hz.get(), 750.0);
        assert_eq!(params.ladder.mode.get(), LadderMode::Lpf12);
        assert_eq!(params.general_filter.mode.get(), FilterMode::Peak);
    }

    #[test]
    fn test_set_by_name() {
        let params = ChainParams::new();

        params.set_by_name("Phaser RateHz", 1.5).unwrap();
        assert_eq!(params.phaser.rate_hz.get(), 1.5);

        params.set_by_name("general filter gain", 100.0).unwrap();
        assert_eq!(params.general_filter.gain_db.get(), 24.0);

        params.set_by_name("Ladder Filter Mode", 3.0).unwrap();
        assert_eq!(params.ladder.mode.get(), LadderMode::Lpf24);

        assert!(matches!(
            params.set_by_name("Ladder Filter Mode", 42.0),
            Err(DspError::InvalidChoice { index: 42, .. })
        ));
        assert!(matches!(
            params.set_by_name("Flanger Rate", 1.0),
            Err(DspError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_set_by_name_rejects_negative_and_nan_choice() {
        let params = ChainParams::new();
        params.set_by_name("Ladder Filter Mode", 2.0).unwrap();

        for bad in [-1.0, f32::NAN, f32::INFINITY] {
            match params.set_by_name("Ladder Filter Mode", bad) {
                Err(DspError::InvalidChoiceValue { name, value }) => {
                    assert_eq!(name, "Ladder Filter Mode");
                    assert!(value.is_nan() || value == bad);
                }
                other => panic!("expected InvalidChoiceValue for {}, got {:?}", bad, other),
            }
        }
        // Rejected values leave the choice alone
        assert_eq!(params.ladder.mode.get(), LadderMode::Bpf12);
    }

    #[test]
    fn test_clones_share_state() {
        let params = ChainParams::new();
        let reader = params.clone();

        params.chorus.mix.set(0.75);
        assert_eq!(reader.chorus.mix.get(), 0.75);
    }

    #[test]
    fn test_reset_to_defaults() {
        let params = ChainParams::new();
        params.overdrive.saturation.set(50.0);
        params.general_filter.mode.set(FilterMode::Notch);

        params.reset_to_defaults();

        assert_eq!(params.overdrive.saturation.get(), 1.0);
        assert_eq!(params.general_filter.mode.get(), FilterMode::Peak);
    }
}
