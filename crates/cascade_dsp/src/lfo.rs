//! Sine LFO shared by the modulated stages

use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Lfo {
    phase: f32,
    increment: f32,
}

impl Lfo {
    pub(crate) fn new() -> Self {
        Self {
            phase: 0.0,
            increment: 0.0,
        }
    }

    pub(crate) fn set_frequency(&mut self, rate_hz: f32, sample_rate: f32) {
        self.increment = if sample_rate > 0.0 {
            rate_hz / sample_rate
        } else {
            0.0
        };
    }

    /// Phase offset in cycles (0.25 = 90 degrees)
    pub(crate) fn set_phase(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }

    /// Next value in -1.0 ..= 1.0
    #[inline]
    pub(crate) fn advance(&mut self) -> f32 {
        let value = (self.phase * TAU).sin();
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        value
    }

    pub(crate) fn reset(&mut self) {
        self.phase = 0.0;
    }
}
