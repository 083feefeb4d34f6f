//! Chain Engine - Control Plane Entry Point
//!
//! The `ChainEngine` lives on the UI/main thread. It owns the producer end
//! of the order channel and the parameter handles; its twin, the
//! [`ChainRenderer`], goes to the audio thread.
//!
//! ```text
//!   ChainEngine::new(config)
//!        │
//!        ├──▶ ChainEngine   (UI thread)    set_order / move_stage / params()
//!        │         │ OrderSender
//!        │         ▼   rtrb, lock-free
//!        └──▶ ChainRenderer (audio thread) render(buffer)
//! ```
//!
//! Every edit goes through `set_order`. A full channel means the render
//! thread hasn't run a block since the last burst of edits; the request is
//! refused and nothing changes, so the caller can retry on the next UI tick.

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use cascade_dsp::ChainParams;

use crate::channel::{order_channel, OrderSender};
use crate::config::EngineConfig;
use crate::error::{ChainError, EngineResult};
use crate::message::Event;
use crate::order::{OrderSequence, StageId};
use crate::rack::StageRack;
use crate::renderer::ChainRenderer;

pub struct ChainEngine {
    /// Producer end of the order channel
    orders: OrderSender,

    /// Shared with every stage in the renderer's rack
    params: ChainParams,

    /// Last order the channel accepted
    requested_order: OrderSequence,

    config: EngineConfig,

    /// Optional listener for `OrderChanged`
    event_sender: Option<Sender<Event>>,
}

impl ChainEngine {
    /// Build the engine and its renderer
    ///
    /// The renderer's stages are already prepared for `config.stream`, so
    /// it can render as soon as it reaches the audio thread.
    pub fn new(config: EngineConfig) -> EngineResult<(Self, ChainRenderer)> {
        config.validate()?;

        let params = ChainParams::new();
        let (orders, receiver) = order_channel(config.order_capacity);

        let mut renderer =
            ChainRenderer::new(StageRack::new(&params), config.initial_order, receiver);
        renderer.prepare(config.stream.process_context());

        info!(
            "Chain engine ready: {} Hz, {} ch, {} frames ({:.1}ms), order [{}]",
            config.stream.sample_rate,
            config.stream.channels,
            config.stream.buffer_size,
            config.stream.latency_ms(),
            config.initial_order
        );

        let engine = Self {
            orders,
            params,
            requested_order: config.initial_order,
            config,
            event_sender: None,
        };
        Ok((engine, renderer))
    }

    /// Send `Event::OrderChanged` to `sender` whenever an order is accepted
    pub fn set_event_sender(&mut self, sender: Sender<Event>) {
        self.event_sender = Some(sender);
    }

    /// Hand a new processing order to the renderer
    ///
    /// Takes effect at the start of the next rendered block.
    pub fn set_order(&mut self, order: OrderSequence) -> EngineResult<()> {
        if !self.orders.push(order) {
            warn!(
                "Order channel full (capacity {}), dropping order [{}]",
                self.orders.capacity(),
                order
            );
            return Err(ChainError::OrderChannelFull);
        }

        self.requested_order = order;
        debug!("Chain order requested: [{}]", order);

        if let Some(sender) = &self.event_sender {
            let _ = sender.try_send(Event::OrderChanged(order));
        }
        Ok(())
    }

    /// Drag the stage in slot `from` to slot `to`
    pub fn move_stage(&mut self, from: usize, to: usize) -> EngineResult<()> {
        let next = self.requested_order.move_stage(from, to)?;
        self.set_order(next)
    }

    pub fn swap_stages(&mut self, a: usize, b: usize) -> EngineResult<()> {
        let next = self.requested_order.swap(a, b)?;
        self.set_order(next)
    }

    /// Take a stage out of the chain; its slot becomes empty
    pub fn disable_stage(&mut self, id: StageId) -> EngineResult<()> {
        let next = self.requested_order.without(id);
        self.set_order(next)
    }

    /// Put a stage into slot `index`, moving it if it was elsewhere
    pub fn enable_stage_at(&mut self, index: usize, id: StageId) -> EngineResult<()> {
        let next = self.requested_order.with_stage_at(index, id)?;
        self.set_order(next)
    }

    /// Back to Phaser, Chorus, Overdrive, Ladder Filter, General Filter
    pub fn reset_order(&mut self) -> EngineResult<()> {
        self.set_order(OrderSequence::default())
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// The last order the channel accepted
    ///
    /// The renderer picks it up at its next block, so this can run ahead of
    /// what is audible for up to one block.
    pub fn requested_order(&self) -> OrderSequence {
        self.requested_order
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Slots left before `set_order` starts failing
    pub fn free_order_slots(&self) -> usize {
        self.orders.free_slots()
    }

    /// True once the renderer has been dropped
    pub fn is_renderer_gone(&self) -> bool {
        self.orders.is_abandoned()
    }
}
