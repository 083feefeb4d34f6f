//! Phaser
//!
//! A cascade of first-order allpass sections whose break frequency is swept
//! by a sine LFO around a centre frequency. Mixing the phase-shifted signal
//! with the dry signal produces moving notches.

use std::f32::consts::PI;
use std::sync::Arc;

use crate::lfo::Lfo;
use crate::param::{FloatParam, ParamRange};
use crate::stage::{active_channels, is_usable_rate, ProcessContext, Stage};

const ALLPASS_SECTIONS: usize = 4;

/// Feedback is scaled below unity so a full-scale setting can't self-oscillate
const FEEDBACK_CEILING: f32 = 0.95;

/// Sweep width in octaves either side of the centre at full depth
const SWEEP_OCTAVES: f32 = 2.0;

/// Control-plane handles for the phaser
#[derive(Debug)]
pub struct PhaserParams {
    pub rate_hz: FloatParam,
    pub center_freq_hz: FloatParam,
    pub depth: FloatParam,
    pub feedback: FloatParam,
    pub mix: FloatParam,
}

impl Default for PhaserParams {
    fn default() -> Self {
        Self {
            rate_hz: FloatParam::new("Phaser RateHz", ParamRange::new(0.01, 2.0, 0.2)),
            center_freq_hz: FloatParam::new(
                "Phaser Center FreqHz",
                ParamRange::new(20.0, 20000.0, 1000.0),
            ),
            depth: FloatParam::new("Phaser Depth %", ParamRange::new(0.01, 1.0, 0.05)),
            feedback: FloatParam::new("Phaser Feedback %", ParamRange::new(-1.0, 1.0, 0.0)),
            mix: FloatParam::new("Phaser Mix %", ParamRange::new(0.01, 1.0, 0.05)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Allpass {
    x1: f32,
    y1: f32,
}

impl Allpass {
    #[inline]
    fn run(&mut self, input: f32, a: f32) -> f32 {
        let output = a * input + self.x1 - a * self.y1;
        self.x1 = input;
        self.y1 = output;
        output
    }
}

#[derive(Debug, Clone, Copy)]
struct PhaserChannel {
    sections: [Allpass; ALLPASS_SECTIONS],
    lfo: Lfo,
    last_output: f32,
}

impl PhaserChannel {
    fn new(index: usize) -> Self {
        let mut lfo = Lfo::new();
        // Quarter-cycle offset per channel for stereo width
        lfo.set_phase(index as f32 * 0.25);
        Self {
            sections: [Allpass::default(); ALLPASS_SECTIONS],
            lfo,
            last_output: 0.0,
        }
    }
}

pub struct Phaser {
    params: Arc<PhaserParams>,
    channels: Vec<PhaserChannel>,
    sample_rate: f32,
}

impl Phaser {
    pub fn new(params: Arc<PhaserParams>) -> Self {
        Self {
            params,
            channels: Vec::new(),
            sample_rate: 0.0,
        }
    }

    /// Allpass coefficient for a break frequency
    #[inline]
    fn coefficient(freq: f32, sample_rate: f32) -> f32 {
        let freq = freq.max(20.0).min(sample_rate * 0.45);
        let t = (PI * freq / sample_rate).tan();
        (t - 1.0) / (t + 1.0)
    }
}

impl Stage for Phaser {
    fn prepare(&mut self, context: &ProcessContext) {
        self.sample_rate = context.sample_rate;
        self.channels = (0..context.channels).map(PhaserChannel::new).collect();
    }

    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        let active = active_channels(self.channels.len(), context);
        if active == 0 || !is_usable_rate(self.sample_rate) {
            return;
        }

        let rate = self.params.rate_hz.get();
        let center = self.params.center_freq_hz.get();
        let depth = self.params.depth.get();
        let feedback = self.params.feedback.get() * FEEDBACK_CEILING;
        let mix = self.params.mix.get();
        let sample_rate = self.sample_rate;

        for channel in &mut self.channels[..active] {
            channel.lfo.set_frequency(rate, sample_rate);
        }

        for frame in buffer.chunks_exact_mut(context.channels) {
            for (sample, channel) in frame.iter_mut().zip(self.channels[..active].iter_mut()) {
                let sweep = channel.lfo.advance() * depth * SWEEP_OCTAVES;
                let a = Self::coefficient(center * sweep.exp2(), sample_rate);

                let dry = *sample;
                let mut wet = dry + feedback * channel.last_output;
                for section in channel.sections.iter_mut() {
                    wet = section.run(wet, a);
                }
                channel.last_output = wet;

                *sample = dry * (1.0 - mix) + wet * mix;
            }
        }
    }

    fn reset(&mut self) {
        for (index, channel) in self.channels.iter_mut().enumerate() {
            *channel = PhaserChannel::new(index);
        }
    }

    fn release(&mut self) {
        self.channels = Vec::new();
    }

    fn name(&self) -> &'static str {
        "Phaser"
    }
}
