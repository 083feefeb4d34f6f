//! Order Channel
//!
//! Single-producer/single-consumer lock-free queue that carries
//! [`OrderSequence`] updates from the control plane to the render thread.
//!
//! Built on `rtrb`: both ends are wait-free, neither ever blocks or
//! allocates after construction. A full channel rejects the push and leaves
//! queued entries untouched; the caller decides whether to retry.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::order::OrderSequence;

/// Enough room to absorb a burst of drag-to-reorder gestures between blocks
pub const DEFAULT_ORDER_CAPACITY: usize = 32;

/// Create a connected sender/receiver pair holding up to `capacity` orders
///
/// A capacity of zero is bumped to one.
pub fn order_channel(capacity: usize) -> (OrderSender, OrderReceiver) {
    let (producer, consumer) = RingBuffer::<OrderSequence>::new(capacity.max(1));
    (OrderSender { producer }, OrderReceiver { consumer })
}

/// Control-plane end of the order channel
///
/// Not `Clone`: exactly one thread may push at a time.
pub struct OrderSender {
    producer: Producer<OrderSequence>,
}

impl OrderSender {
    /// Try to enqueue an order without blocking
    ///
    /// Returns `false` if the channel is full; nothing already queued is
    /// overwritten.
    pub fn push(&mut self, order: OrderSequence) -> bool {
        self.producer.push(order).is_ok()
    }

    /// Free slots right now
    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }

    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }

    /// True once the receiver has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Render-thread end of the order channel
pub struct OrderReceiver {
    consumer: Consumer<OrderSequence>,
}

impl OrderReceiver {
    /// Dequeue the oldest pending order, if any
    #[inline]
    pub fn pull(&mut self) -> Option<OrderSequence> {
        self.consumer.pop().ok()
    }

    /// Dequeue everything pending and keep only the newest
    ///
    /// The number of pops is fixed when the drain starts, so a producer
    /// pushing concurrently can't keep the render thread spinning.
    #[inline]
    pub fn drain_latest(&mut self) -> Option<OrderSequence> {
        let pending = self.consumer.slots();
        let mut latest = None;
        for _ in 0..pending {
            match self.consumer.pop() {
                Ok(order) => latest = Some(order),
                Err(_) => break,
            }
        }
        latest
    }

    /// Orders waiting to be pulled
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }

    pub fn capacity(&self) -> usize {
        self.consumer.buffer().capacity()
    }

    /// True once the sender has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}
