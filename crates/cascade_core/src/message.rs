//! Message Types for Thread Communication
//!
//! Events flow from the audio callbacks and the engine to the UI thread.
//! Topology changes don't travel here: they go through the order channel.

use serde::{Deserialize, Serialize};

use crate::order::OrderSequence;

/// Events sent from the audio side to the UI thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Streams are running
    Started,

    /// Streams stopped
    Stopped,

    /// Error occurred
    Error { message: String },

    /// Audio level update (for meters)
    /// Contains peak levels: (left, right) in range 0.0 - 1.0
    LevelUpdate { left: f32, right: f32 },

    /// Capture ring overflowed or output ran dry (audio glitch)
    BufferUnderrun,

    /// A new chain order was accepted by the order channel
    OrderChanged(OrderSequence),
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}
