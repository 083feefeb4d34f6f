//! Cascade Core - Reorderable Effects Chain
//!
//! This crate runs a fixed set of five effects in an order the user can
//! change while audio is playing:
//! - Validated chain orders ([`OrderSequence`]) with explicit empty slots
//! - A lock-free order channel from the control thread to the audio thread
//! - A per-block renderer that picks up the newest order and runs the chain
//! - A CPAL duplex stream that hosts the renderer
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Control Thread                         │
//! │   ChainEngine::set_order ──▶ OrderSender     ChainParams    │
//! └─────────────────────────────────────────────────────────────┘
//!                  │ rtrb (SPSC, last writer wins)  │ atomics
//!                  ▼                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   drain ──▶ swap order ──▶ resolve ──▶ stage 1 ▶ … ▶ stage 5│
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod channel;
mod config;
mod dispatch;
mod engine;
mod error;
mod message;
mod order;
mod rack;
mod renderer;
mod stream;

pub use channel::{order_channel, OrderReceiver, OrderSender, DEFAULT_ORDER_CAPACITY};
pub use config::{EngineConfig, StreamConfig, MAX_BUFFER_SIZE};
pub use dispatch::{resolve, ResolvedChain};
pub use engine::ChainEngine;
pub use error::{ChainError, EngineResult};
pub use message::Event;
pub use order::{ChainSlot, OrderSequence, StageId, STAGE_COUNT};
pub use rack::StageRack;
pub use renderer::ChainRenderer;
pub use stream::{find_input_device, find_output_device, ChainStream, SharedState};

// Re-export DSP types for convenience
pub use cascade_dsp::{ChainParams, DspError, ProcessContext, Stage};
