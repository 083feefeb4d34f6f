//! Chorus
//!
//! One modulated delay line per channel. The LFO swings the delay time
//! around the centre delay; the delayed copy is blended back with the dry
//! signal and optionally fed back into the line.

use std::sync::Arc;

use crate::lfo::Lfo;
use crate::param::{FloatParam, ParamRange};
use crate::stage::{active_channels, is_usable_rate, ProcessContext, Stage};

/// Longest delay the line must hold, in milliseconds (centre max * 1.5 swing)
const MAX_DELAY_MS: f32 = 150.0;

const FEEDBACK_CEILING: f32 = 0.95;

/// Control-plane handles for the chorus
#[derive(Debug)]
pub struct ChorusParams {
    pub rate_hz: FloatParam,
    pub depth: FloatParam,
    pub center_delay_ms: FloatParam,
    pub feedback: FloatParam,
    pub mix: FloatParam,
}

impl Default for ChorusParams {
    fn default() -> Self {
        Self {
            rate_hz: FloatParam::new("Chorus RateHz", ParamRange::new(0.01, 100.0, 0.2)),
            depth: FloatParam::new("Chorus Depth %", ParamRange::new(0.01, 1.0, 0.05)),
            center_delay_ms: FloatParam::new(
                "Chorus Center Delay Ms",
                ParamRange::new(1.0, 100.0, 7.0),
            ),
            feedback: FloatParam::new("Chorus Feedback %", ParamRange::new(-1.0, 1.0, 0.0)),
            mix: FloatParam::new("Chorus Mix %", ParamRange::new(0.01, 1.0, 0.05)),
        }
    }
}

/// Circular delay line with linear-interpolated fractional reads
#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(2)],
            write_pos: 0,
        }
    }

    /// Read `delay` samples behind the write head
    #[inline]
    fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(1.0, (len - 1) as f32);
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let idx_a = (self.write_pos + len - whole) % len;
        let idx_b = (idx_a + len - 1) % len;
        self.buffer[idx_a] * (1.0 - frac) + self.buffer[idx_b] * frac
    }

    #[inline]
    fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[derive(Debug, Clone)]
struct ChorusChannel {
    line: DelayLine,
    lfo: Lfo,
}

pub struct Chorus {
    params: Arc<ChorusParams>,
    channels: Vec<ChorusChannel>,
    sample_rate: f32,
}

impl Chorus {
    pub fn new(params: Arc<ChorusParams>) -> Self {
        Self {
            params,
            channels: Vec::new(),
            sample_rate: 0.0,
        }
    }
}

impl Stage for Chorus {
    fn prepare(&mut self, context: &ProcessContext) {
        self.sample_rate = context.sample_rate;
        let capacity = if is_usable_rate(context.sample_rate) {
            (MAX_DELAY_MS * 0.001 * context.sample_rate).ceil() as usize + 2
        } else {
            0
        };

        self.channels = (0..context.channels)
            .map(|index| {
                let mut lfo = Lfo::new();
                lfo.set_phase(index as f32 * 0.25);
                ChorusChannel {
                    line: DelayLine::new(capacity),
                    lfo,
                }
            })
            .collect();
    }

    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        let active = active_channels(self.channels.len(), context);
        if active == 0 || !is_usable_rate(self.sample_rate) {
            return;
        }

        let rate = self.params.rate_hz.get();
        let depth = self.params.depth.get();
        let feedback = self.params.feedback.get() * FEEDBACK_CEILING;
        let mix = self.params.mix.get();
        let center_samples = self.params.center_delay_ms.get() * 0.001 * self.sample_rate;
        let sample_rate = self.sample_rate;

        for channel in &mut self.channels[..active] {
            channel.lfo.set_frequency(rate, sample_rate);
        }

        for frame in buffer.chunks_exact_mut(context.channels) {
            for (sample, channel) in frame.iter_mut().zip(self.channels[..active].iter_mut()) {
                let delay = center_samples * (1.0 + 0.5 * depth * channel.lfo.advance());
                let wet = channel.line.read(delay);

                let dry = *sample;
                channel.line.write(dry + feedback * wet);
                *sample = dry * (1.0 - mix) + wet * mix;
            }
        }
    }

    fn reset(&mut self) {
        for (index, channel) in self.channels.iter_mut().enumerate() {
            channel.line.clear();
            channel.lfo.reset();
            channel.lfo.set_phase(index as f32 * 0.25);
        }
    }

    fn release(&mut self) {
        self.channels = Vec::new();
    }

    fn name(&self) -> &'static str {
        "Chorus"
    }
}
