//! Stage Trait
//!
//! Defines the uniform lifecycle every effect in the chain implements.
//! The renderer only ever talks to stages through this trait, so any
//! stage can sit in any slot of the chain.

/// Context passed to stages containing stream metadata
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessContext {
    pub sample_rate: f32,
    pub channels: usize,
    /// Frames per block
    pub buffer_size: usize,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, channels: usize, buffer_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            buffer_size,
        }
    }

    /// Same stream settings with a different block length
    pub fn with_buffer_size(self, buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ..self
        }
    }
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::new(48000.0, 2, 512)
    }
}

/// One DSP effect in the chain
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no mutex locks)
/// - NO unbounded loops
/// - Constant or O(n) time complexity where n = buffer size
///
/// `prepare()` runs off the audio thread and may allocate.
pub trait Stage: Send {
    /// Size internal state for the given stream settings
    fn prepare(&mut self, context: &ProcessContext);

    /// Process audio buffer in-place
    ///
    /// Buffer format is interleaved: [L0, R0, L1, R1, ...]
    /// Channels beyond what was prepared pass through untouched.
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext);

    /// Reset internal state (delay lines, filter memory, LFO phase)
    fn reset(&mut self);

    /// Drop anything acquired in `prepare`
    fn release(&mut self) {
        self.reset();
    }

    /// Human-readable name for debugging/UI
    fn name(&self) -> &'static str;
}

/// Number of channels a stage can safely touch in this block
#[inline]
pub(crate) fn active_channels(prepared: usize, context: &ProcessContext) -> usize {
    prepared.min(context.channels)
}

/// False for zero, negative, NaN and infinite rates
#[inline]
pub(crate) fn is_usable_rate(sample_rate: f32) -> bool {
    sample_rate.is_finite() && sample_rate > 0.0
}
