//! General-Purpose Filter
//!
//! A single RBJ (Robert Bristow-Johnson) Audio EQ Cookbook biquad with a
//! selectable response: peak, bandpass, notch or allpass.

use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};

use crate::error::DspError;
use crate::param::{Choice, ChoiceParam, FloatParam, ParamRange};
use crate::stage::{active_channels, is_usable_rate, ProcessContext, Stage};

/// Biquad response for the general filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Peak,
    Bandpass,
    Notch,
    Allpass,
}

impl Choice for FilterMode {
    const LABELS: &'static [&'static str] = &["Peak", "Bandpass", "Notch", "Allpass"];

    fn index(self) -> usize {
        self as usize
    }

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Peak),
            1 => Some(Self::Bandpass),
            2 => Some(Self::Notch),
            3 => Some(Self::Allpass),
            _ => None,
        }
    }
}

/// Control-plane handles for the general filter
#[derive(Debug)]
pub struct GeneralFilterParams {
    pub mode: ChoiceParam<FilterMode>,
    pub freq_hz: FloatParam,
    pub quality: FloatParam,
    pub gain_db: FloatParam,
}

impl Default for GeneralFilterParams {
    fn default() -> Self {
        Self {
            mode: ChoiceParam::new("General Filter Mode", FilterMode::Peak),
            freq_hz: FloatParam::new("General Filter Freq Hz", ParamRange::new(20.0, 20000.0, 750.0)),
            quality: FloatParam::new("General Filter Quality", ParamRange::new(0.1, 10.0, 1.0)),
            gain_db: FloatParam::new("General Filter Gain", ParamRange::new(-24.0, 24.0, 0.0)),
        }
    }
}

/// Snapshot of the values the coefficients were computed from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub mode: FilterMode,
    pub freq_hz: f32,
    pub quality: f32,
    pub gain_db: f32,
}

impl FilterSettings {
    fn read(params: &GeneralFilterParams) -> Self {
        Self {
            mode: params.mode.get(),
            freq_hz: params.freq_hz.get(),
            quality: params.quality.get(),
            gain_db: params.gain_db.get(),
        }
    }

    /// Generate BiQuad coefficients for these settings
    pub fn to_coefficients(self, sample_rate: f32) -> Result<Coefficients<f32>, DspError> {
        if !is_usable_rate(sample_rate) {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }

        // Stay just under Nyquist; the cookbook formulas reject anything above it
        let freq = self.freq_hz.min(sample_rate * 0.49);
        let filter = match self.mode {
            FilterMode::Peak => Type::PeakingEQ(self.gain_db),
            FilterMode::Bandpass => Type::BandPass,
            FilterMode::Notch => Type::Notch,
            FilterMode::Allpass => Type::AllPass,
        };

        Coefficients::<f32>::from_params(filter, sample_rate.hz(), freq.hz(), self.quality).map_err(
            |_| DspError::InvalidCoefficients {
                frequency: self.freq_hz,
                sample_rate,
            },
        )
    }
}

pub struct GeneralFilter {
    params: Arc<GeneralFilterParams>,
    // One filter state per channel, all sharing the same coefficients
    filters: Vec<DirectForm2Transposed<f32>>,
    applied: Option<FilterSettings>,
    sample_rate: f32,
}

impl GeneralFilter {
    pub fn new(params: Arc<GeneralFilterParams>) -> Self {
        Self {
            params,
            filters: Vec::new(),
            applied: None,
            sample_rate: 0.0,
        }
    }

    /// Settings the current coefficients were built from
    pub fn applied_settings(&self) -> Option<FilterSettings> {
        self.applied
    }

    /// Recompute coefficients if any parameter moved since the last block
    fn refresh_coefficients(&mut self) {
        let settings = FilterSettings::read(&self.params);
        if self.applied == Some(settings) {
            return;
        }

        // On failure the previous coefficients stay in place
        if let Ok(coeffs) = settings.to_coefficients(self.sample_rate) {
            for filter in self.filters.iter_mut() {
                filter.update_coefficients(coeffs);
            }
            self.applied = Some(settings);
        }
    }
}

impl Stage for GeneralFilter {
    fn prepare(&mut self, context: &ProcessContext) {
        self.sample_rate = context.sample_rate;

        let settings = FilterSettings::read(&self.params);
        let coeffs = settings
            .to_coefficients(context.sample_rate)
            .or_else(|_| {
                FilterSettings {
                    mode: FilterMode::Allpass,
                    freq_hz: 1000.0,
                    quality: Q_BUTTERWORTH_F32,
                    gain_db: 0.0,
                }
                .to_coefficients(context.sample_rate)
            });

        match coeffs {
            Ok(coeffs) => {
                self.filters = vec![DirectForm2Transposed::<f32>::new(coeffs); context.channels];
                self.applied = Some(settings);
            }
            Err(_) => {
                // Unusable sample rate: leave the stage as a passthrough
                self.filters = Vec::new();
                self.applied = None;
            }
        }
    }

    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        let active = active_channels(self.filters.len(), context);
        if active == 0 {
            return;
        }

        self.refresh_coefficients();

        for frame in buffer.chunks_exact_mut(context.channels) {
            for (sample, filter) in frame.iter_mut().zip(self.filters[..active].iter_mut()) {
                *sample = filter.run(*sample);
            }
        }
    }

    fn reset(&mut self) {
        for filter in self.filters.iter_mut() {
            filter.reset_state();
        }
    }

    fn release(&mut self) {
        self.filters = Vec::new();
        self.applied = None;
    }

    fn name(&self) -> &'static str {
        "General Filter"
    }
}
