//! Ladder Filter
//!
//! Four cascaded one-pole lowpass sections with resonance fed back from the
//! last section. Tapping and mixing the section outputs gives 12 and
//! 24 dB/octave lowpass, highpass and bandpass responses.
//!
//! The feedback path runs through `tanh`, which keeps every section state
//! within ±1 even at full resonance and drive.

use std::f32::consts::TAU;
use std::sync::Arc;

use crate::param::{Choice, ChoiceParam, FloatParam, ParamRange};
use crate::stage::{active_channels, is_usable_rate, ProcessContext, Stage};

/// Resonance of 1.0 maps to just below the self-oscillation point (k = 4)
const MAX_FEEDBACK: f32 = 3.8;

/// Ladder filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LadderMode {
    /// Low-pass 12 dB/octave
    #[default]
    Lpf12,
    /// High-pass 12 dB/octave
    Hpf12,
    /// Band-pass 12 dB/octave
    Bpf12,
    /// Low-pass 24 dB/octave
    Lpf24,
    /// High-pass 24 dB/octave
    Hpf24,
    /// Band-pass 24 dB/octave
    Bpf24,
}

impl Choice for LadderMode {
    const LABELS: &'static [&'static str] = &["LPF12", "HPF12", "BPF12", "LPF24", "HPF24", "BPF24"];

    fn index(self) -> usize {
        self as usize
    }

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Lpf12),
            1 => Some(Self::Hpf12),
            2 => Some(Self::Bpf12),
            3 => Some(Self::Lpf24),
            4 => Some(Self::Hpf24),
            5 => Some(Self::Bpf24),
            _ => None,
        }
    }
}

/// Control-plane handles for the ladder filter
#[derive(Debug)]
pub struct LadderParams {
    pub mode: ChoiceParam<LadderMode>,
    pub cutoff_hz: FloatParam,
    pub resonance: FloatParam,
    pub drive: FloatParam,
}

impl Default for LadderParams {
    fn default() -> Self {
        Self {
            mode: ChoiceParam::new("Ladder Filter Mode", LadderMode::Lpf12),
            cutoff_hz: FloatParam::new(
                "Ladder Filter Cutoff Hz",
                ParamRange::new(20.0, 20000.0, 20000.0),
            ),
            resonance: FloatParam::new("Ladder Filter Resonance", ParamRange::new(0.0, 1.0, 0.0)),
            drive: FloatParam::new("Ladder Filter Drive", ParamRange::new(1.0, 100.0, 1.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LadderChannel {
    stages: [f32; 4],
}

impl LadderChannel {
    #[inline]
    fn run(&mut self, input: f32, g: f32, k: f32, drive: f32, mode: LadderMode) -> f32 {
        let y0 = (drive * input - k * self.stages[3]).tanh();

        let mut x = y0;
        for stage in self.stages.iter_mut() {
            *stage += g * (x - *stage);
            x = *stage;
        }
        let [y1, y2, y3, y4] = self.stages;

        match mode {
            LadderMode::Lpf12 => y2,
            LadderMode::Lpf24 => y4,
            LadderMode::Hpf12 => y0 - 2.0 * y1 + y2,
            LadderMode::Hpf24 => y0 - 4.0 * y1 + 6.0 * y2 - 4.0 * y3 + y4,
            LadderMode::Bpf12 => 2.0 * (y1 - y2),
            LadderMode::Bpf24 => 4.0 * (y2 - 2.0 * y3 + y4),
        }
    }
}

pub struct LadderFilter {
    params: Arc<LadderParams>,
    channels: Vec<LadderChannel>,
    sample_rate: f32,
}

impl LadderFilter {
    pub fn new(params: Arc<LadderParams>) -> Self {
        Self {
            params,
            channels: Vec::new(),
            sample_rate: 0.0,
        }
    }

    /// One-pole coefficient for the cutoff frequency
    fn section_gain(cutoff_hz: f32, sample_rate: f32) -> f32 {
        let cutoff = cutoff_hz.max(20.0).min(sample_rate * 0.45);
        1.0 - (-TAU * cutoff / sample_rate).exp()
    }
}

impl Stage for LadderFilter {
    fn prepare(&mut self, context: &ProcessContext) {
        self.sample_rate = context.sample_rate;
        self.channels = vec![LadderChannel::default(); context.channels];
    }

    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        let active = active_channels(self.channels.len(), context);
        if active == 0 || !is_usable_rate(self.sample_rate) {
            return;
        }

        let mode = self.params.mode.get();
        let g = Self::section_gain(self.params.cutoff_hz.get(), self.sample_rate);
        let k = self.params.resonance.get() * MAX_FEEDBACK;
        let drive = self.params.drive.get();

        for frame in buffer.chunks_exact_mut(context.channels) {
            for (sample, channel) in frame.iter_mut().zip(self.channels[..active].iter_mut()) {
                *sample = channel.run(*sample, g, k, drive, mode);
            }
        }
    }

    fn reset(&mut self) {
        self.channels.fill(LadderChannel::default());
    }

    fn release(&mut self) {
        self.channels = Vec::new();
    }

    fn name(&self) -> &'static str {
        "Ladder Filter"
    }
}
