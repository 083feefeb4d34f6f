//! Block Renderer
//!
//! The audio-thread side of the chain. Once per block it:
//! 1. drains the order channel, keeping only the newest order,
//! 2. swaps in that order if it differs from the one it holds,
//! 3. resolves the held order against the rack,
//! 4. runs the resolved stages over the block in place.
//!
//! # Real-time Safety
//! `render()` takes no locks, performs no allocations and never logs. An
//! empty channel is the normal case and costs one atomic load.

use cascade_dsp::ProcessContext;

use crate::channel::OrderReceiver;
use crate::dispatch::resolve;
use crate::order::OrderSequence;
use crate::rack::StageRack;

pub struct ChainRenderer {
    rack: StageRack,
    order: OrderSequence,
    orders: OrderReceiver,
    context: ProcessContext,
}

impl ChainRenderer {
    pub fn new(rack: StageRack, initial_order: OrderSequence, orders: OrderReceiver) -> Self {
        Self {
            rack,
            order: initial_order,
            orders,
            context: ProcessContext::default(),
        }
    }

    /// Prepare every stage for the stream
    ///
    /// Call before the first `render()` and whenever the stream settings
    /// change. May allocate, so never call it from the audio callback.
    pub fn prepare(&mut self, context: ProcessContext) {
        self.context = context;
        self.rack.prepare(&context);
    }

    /// Render one interleaved block with the prepared stream settings
    ///
    /// The frame count is taken from the buffer length.
    #[inline]
    pub fn render(&mut self, buffer: &mut [f32]) {
        let channels = self.context.channels.max(1);
        let context = self.context.with_buffer_size(buffer.len() / channels);
        self.render_with(buffer, &context);
    }

    /// Render one interleaved block described by `context`
    #[inline]
    pub fn render_with(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        self.apply_pending_order();
        resolve(&self.order, &mut self.rack).process(buffer, context);
    }

    /// Pick up the newest order from the control plane, if one arrived
    ///
    /// Returns true when the held order changed.
    #[inline]
    pub fn apply_pending_order(&mut self) -> bool {
        match self.orders.drain_latest() {
            Some(latest) if latest != self.order => {
                self.order = latest;
                true
            }
            _ => false,
        }
    }

    /// The order the next block will use (ignoring anything still queued)
    pub fn current_order(&self) -> OrderSequence {
        self.order
    }

    pub fn context(&self) -> ProcessContext {
        self.context
    }

    /// Clear all stage state (delay lines, filter memory)
    pub fn reset(&mut self) {
        self.rack.reset();
    }

    /// Let every stage drop what it acquired in `prepare`
    pub fn release(&mut self) {
        self.rack.release();
    }

    pub fn rack(&self) -> &StageRack {
        &self.rack
    }

    pub fn rack_mut(&mut self) -> &mut StageRack {
        &mut self.rack
    }
}
