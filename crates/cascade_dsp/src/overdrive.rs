//! Overdrive
//!
//! Drives the signal into a tanh saturation curve. At the minimum
//! saturation of 1.0 the curve is gentle and nearly linear for quiet
//! material; higher settings push more of the waveform into the knee.
//!
//! # Algorithm
//!
//! `y = tanh(saturation * x)`
//!
//! - Odd-symmetric, so polarity is preserved
//! - Output never exceeds ±1.0 regardless of input level
//! - No delay lines, `reset()` is a no-op

use std::sync::Arc;

use crate::param::{FloatParam, ParamRange};
use crate::stage::{active_channels, ProcessContext, Stage};

/// Control-plane handles for the overdrive
#[derive(Debug)]
pub struct OverdriveParams {
    pub saturation: FloatParam,
}

impl Default for OverdriveParams {
    fn default() -> Self {
        Self {
            saturation: FloatParam::new("Overdrive Saturation", ParamRange::new(1.0, 100.0, 1.0)),
        }
    }
}

pub struct Overdrive {
    params: Arc<OverdriveParams>,
    /// Channel count from the last `prepare`, zero when released
    channels: usize,
}

impl Overdrive {
    pub fn new(params: Arc<OverdriveParams>) -> Self {
        Self {
            params,
            channels: 0,
        }
    }

    /// Process a single sample at the current saturation
    ///
    /// # Real-time Safety
    /// No allocations, no syscalls, O(1) time.
    #[inline]
    pub fn process_sample(&self, sample: f32) -> f32 {
        saturate(sample, self.params.saturation.get())
    }
}

/// tanh saturation with pre-gain
#[inline]
fn saturate(sample: f32, drive: f32) -> f32 {
    (sample * drive).tanh()
}

impl Stage for Overdrive {
    fn prepare(&mut self, context: &ProcessContext) {
        self.channels = context.channels;
    }

    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        let active = active_channels(self.channels, context);
        if active == 0 {
            return;
        }

        let drive = self.params.saturation.get();
        for frame in buffer.chunks_exact_mut(context.channels) {
            for sample in &mut frame[..active] {
                *sample = saturate(*sample, drive);
            }
        }
    }

    fn reset(&mut self) {}

    fn release(&mut self) {
        self.channels = 0;
    }

    fn name(&self) -> &'static str {
        "Overdrive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overdrive(saturation: f32) -> Overdrive {
        let params = Arc::new(OverdriveParams::default());
        params.saturation.set(saturation);
        Overdrive::new(params)
    }

    #[test]
    fn test_preserves_polarity() {
        let od = overdrive(10.0);

        let out_pos = od.process_sample(0.5);
        let out_neg = od.process_sample(-0.5);
        assert!(out_pos > 0.0);
        assert!(out_neg < 0.0);

        // Symmetric response
        assert!((out_pos.abs() - out_neg.abs()).abs() < 1e-6);
    }

    #[test]
    fn test_never_exceeds_one() {
        let od = overdrive(100.0);

        for input in [10.0, 100.0, 1000.0, -10.0, -100.0, -1000.0] {
            let output = od.process_sample(input);
            assert!(
                output.abs() <= 1.0,
                "Output {} exceeds ±1.0 for input {}",
                output,
                input
            );
        }
    }

    #[test]
    fn test_more_saturation_is_louder_for_quiet_input() {
        let gentle = overdrive(1.0).process_sample(0.1);
        let hot = overdrive(20.0).process_sample(0.1);
        assert!(hot > gentle);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut od = overdrive(50.0);
        let ctx = ProcessContext::new(48000.0, 2, 4);
        let mut buffer = vec![0.0; 8];
        od.process(&mut buffer, &ctx);
        assert!(buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_buffer_processing() {
        let mut od = overdrive(4.0);
        let ctx = ProcessContext::new(48000.0, 2, 3);
        od.prepare(&ctx);

        let mut buffer = vec![0.01, -0.01, 0.8, -0.8, 1.5, -1.5];
        od.process(&mut buffer, &ctx);

        assert!(buffer.iter().all(|s| s.abs() <= 1.0));
        // Loud values are compressed harder than quiet ones
        assert!(buffer[4] / 1.5 < buffer[0] / 0.01);
    }

    #[test]
    fn test_saturation_is_read_every_block() {
        let params = Arc::new(OverdriveParams::default());
        let mut od = Overdrive::new(Arc::clone(&params));
        let ctx = ProcessContext::new(48000.0, 1, 1);
        od.prepare(&ctx);

        let mut a = vec![0.2];
        od.process(&mut a, &ctx);

        params.saturation.set(30.0);
        let mut b = vec![0.2];
        od.process(&mut b, &ctx);

        assert!(b[0] > a[0]);
    }

    #[test]
    fn test_unprepared_passes_through() {
        let mut od = overdrive(10.0);
        let ctx = ProcessContext::new(48000.0, 2, 1);

        let mut buffer = vec![0.5, 0.5];
        od.process(&mut buffer, &ctx);
        assert_eq!(buffer, vec![0.5, 0.5]);

        od.prepare(&ctx);
        od.release();
        od.process(&mut buffer, &ctx);
        assert_eq!(buffer, vec![0.5, 0.5]);
    }

    #[test]
    fn test_extra_channels_pass_through() {
        let mut od = overdrive(10.0);
        od.prepare(&ProcessContext::new(48000.0, 1, 4));

        let ctx = ProcessContext::new(48000.0, 2, 4);
        let mut buffer = vec![0.5; 8];
        od.process(&mut buffer, &ctx);

        for frame in buffer.chunks_exact(2) {
            assert!((frame[0] - (0.5f32 * 10.0).tanh()).abs() < 1e-6);
            assert_eq!(frame[1], 0.5);
        }
    }
}
