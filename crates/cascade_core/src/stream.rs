//! Audio Stream Management
//!
//! Handles the CPAL duplex setup and the real-time callbacks that drive the
//! chain.
//!
//! ```text
//!   input device ──capture cb──▶ rtrb<f32> ──output cb──▶ output device
//!                                              │
//!                                   ChainRenderer::render (once per cb)
//!                                   bypass / volume / peak meters
//! ```
//!
//! The renderer moves into the output callback when the stream opens and
//! is dropped with the stream.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use crossbeam_channel::Sender;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::{ChainError, EngineResult};
use crate::message::Event;
use crate::renderer::ChainRenderer;

/// Meter events per second sent from the output callback
const METER_RATE_HZ: u32 = 30;

/// Blocks of headroom in the capture ring
const RING_BLOCKS: usize = 4;

/// Shared state between audio callback and control thread
pub struct SharedState {
    /// Whether the chain output is discarded in favour of the dry input
    pub bypassed: AtomicBool,

    /// Master volume (stored as u32, interpreted as f32 bits)
    master_volume_bits: AtomicU32,

    /// Peak level left channel (for meters)
    peak_left_bits: AtomicU32,

    /// Peak level right channel
    peak_right_bits: AtomicU32,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            bypassed: AtomicBool::new(false),
            master_volume_bits: AtomicU32::new(1.0_f32.to_bits()),
            peak_left_bits: AtomicU32::new(0.0_f32.to_bits()),
            peak_right_bits: AtomicU32::new(0.0_f32.to_bits()),
        }
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.master_volume_bits
            .store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_peaks(&self, left: f32, right: f32) {
        self.peak_left_bits.store(left.to_bits(), Ordering::Relaxed);
        self.peak_right_bits.store(right.to_bits(), Ordering::Relaxed);
    }

    pub fn peaks(&self) -> (f32, f32) {
        (
            f32::from_bits(self.peak_left_bits.load(Ordering::Relaxed)),
            f32::from_bits(self.peak_right_bits.load(Ordering::Relaxed)),
        )
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Relaxed)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the output callback owns
///
/// Kept separate from the CPAL closure so the block logic can be driven
/// without a device.
struct OutputProcessor {
    consumer: Consumer<f32>,
    renderer: ChainRenderer,
    shared: Arc<SharedState>,
    /// Dry copy of the block, used while bypassed
    dry: Vec<f32>,
    /// Sent once if a callback outgrows `dry` while bypassed
    bypass_overflow: Option<Event>,
    channels: usize,
    blocks_per_meter: u32,
    blocks_since_meter: u32,
    event_sender: Sender<Event>,
}

impl OutputProcessor {
    fn new(
        consumer: Consumer<f32>,
        renderer: ChainRenderer,
        shared: Arc<SharedState>,
        config: &StreamConfig,
        event_sender: Sender<Event>,
    ) -> Self {
        let blocks_per_second = config.sample_rate / config.buffer_size.max(1);
        Self {
            consumer,
            renderer,
            shared,
            dry: Vec::with_capacity(
                (config.samples_per_block() * RING_BLOCKS).max(config.max_samples_per_block()),
            ),
            bypass_overflow: Some(Event::Error {
                message: "Callback buffer too large to bypass; chain output kept".to_string(),
            }),
            channels: config.channels.max(1) as usize,
            blocks_per_meter: (blocks_per_second / METER_RATE_HZ).max(1),
            blocks_since_meter: 0,
            event_sender,
        }
    }

    /// One output callback: pull input, render, bypass, volume, meters
    fn process(&mut self, data: &mut [f32]) {
        // Real-time audio callback - NO allocations allowed here
        let available = self.consumer.slots();
        let to_read = data.len().min(available);

        if to_read < data.len() {
            // Underrun - fill with silence
            data.fill(0.0);
            let _ = self.event_sender.try_send(Event::BufferUnderrun);
        }

        if let Ok(chunk) = self.consumer.read_chunk(to_read) {
            let (first, second) = chunk.as_slices();
            data[..first.len()].copy_from_slice(first);
            if !second.is_empty() {
                data[first.len()..first.len() + second.len()].copy_from_slice(second);
            }
            chunk.commit_all();
        }

        // Render even while bypassed so order updates and stage state keep
        // up; the dry copy only fits without allocating up to its capacity
        let mut bypassed = self.shared.is_bypassed();
        if bypassed && data.len() > self.dry.capacity() {
            bypassed = false;
            if let Some(event) = self.bypass_overflow.take() {
                let _ = self.event_sender.try_send(event);
            }
        }
        if bypassed {
            self.dry.clear();
            self.dry.extend_from_slice(data);
        }

        self.renderer.render(data);

        if bypassed {
            data.copy_from_slice(&self.dry);
        }

        let volume = self.shared.master_volume();
        if (volume - 1.0).abs() > 0.001 {
            for sample in data.iter_mut() {
                *sample *= volume;
            }
        }

        let (peak_l, peak_r) = peak_levels(data, self.channels);
        self.shared.set_peaks(peak_l, peak_r);

        self.blocks_since_meter += 1;
        if self.blocks_since_meter >= self.blocks_per_meter {
            self.blocks_since_meter = 0;
            let _ = self.event_sender.try_send(Event::LevelUpdate {
                left: peak_l,
                right: peak_r,
            });
        }
    }
}

/// Peak of the first two channels; mono reports the same peak on both sides
fn peak_levels(data: &[f32], channels: usize) -> (f32, f32) {
    let mut peak_l = 0.0_f32;
    let mut peak_r = 0.0_f32;
    for frame in data.chunks_exact(channels.max(1)) {
        peak_l = peak_l.max(frame[0].abs());
        peak_r = peak_r.max(frame.get(1).unwrap_or(&frame[0]).abs());
    }
    (peak_l, peak_r)
}

/// Find an input device by name, or the host default when `name` is None
pub fn find_input_device(name: Option<&str>) -> EngineResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| ChainError::DeviceNotFound("default input".to_string())),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| ChainError::DeviceNotFound(e.to_string()))?
            .find(|device| device.name().is_ok_and(|n| n == wanted))
            .ok_or_else(|| ChainError::DeviceNotFound(wanted.to_string())),
    }
}

/// Find an output device by name, or the host default when `name` is None
pub fn find_output_device(name: Option<&str>) -> EngineResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| ChainError::DeviceNotFound("default output".to_string())),
        Some(wanted) => host
            .output_devices()
            .map_err(|e| ChainError::DeviceNotFound(e.to_string()))?
            .find(|device| device.name().is_ok_and(|n| n == wanted))
            .ok_or_else(|| ChainError::DeviceNotFound(wanted.to_string())),
    }
}

/// A running duplex stream with the chain in its output callback
pub struct ChainStream {
    /// The underlying CPAL streams (kept alive to maintain audio flow)
    capture_stream: Stream,
    output_stream: Stream,

    /// Shared state for atomic updates from control thread
    pub shared: Arc<SharedState>,

    pub config: StreamConfig,

    event_sender: Sender<Event>,
}

impl ChainStream {
    /// Open and start capture and output streams
    ///
    /// # Arguments
    ///
    /// * `config` - Stream configuration (sample rate, buffer size, etc.)
    /// * `input_device` - The device to capture audio FROM
    /// * `output_device` - The device to play processed audio TO
    /// * `renderer` - The chain; moved into the output callback
    /// * `event_sender` - Channel for underrun, meter and error events
    pub fn open(
        config: StreamConfig,
        input_device: &Device,
        output_device: &Device,
        mut renderer: ChainRenderer,
        event_sender: Sender<Event>,
    ) -> EngineResult<Self> {
        config.validate().map_err(ChainError::ConfigError)?;

        // Cheap to redo, and keeps the rack in step with this stream
        renderer.prepare(config.process_context());

        let shared = Arc::new(SharedState::new());

        let ring_size = config.samples_per_block() * RING_BLOCKS;
        let (producer, consumer) = RingBuffer::<f32>::new(ring_size);

        let cpal_config = CpalStreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let capture_stream =
            Self::build_capture_stream(input_device, &cpal_config, producer, event_sender.clone())?;

        let processor = OutputProcessor::new(
            consumer,
            renderer,
            Arc::clone(&shared),
            &config,
            event_sender.clone(),
        );
        let output_stream =
            Self::build_output_stream(output_device, &cpal_config, processor, event_sender.clone())?;

        capture_stream
            .play()
            .map_err(|e| ChainError::StreamPlayError(e.to_string()))?;
        output_stream
            .play()
            .map_err(|e| ChainError::StreamPlayError(e.to_string()))?;

        info!(
            "Chain stream started: {} -> {} ({} Hz, {} ch, {} frames)",
            input_device.name().unwrap_or_else(|_| "unknown".into()),
            output_device.name().unwrap_or_else(|_| "unknown".into()),
            config.sample_rate,
            config.channels,
            config.buffer_size
        );
        let _ = event_sender.try_send(Event::Started);

        Ok(Self {
            capture_stream,
            output_stream,
            shared,
            config,
            event_sender,
        })
    }

    fn build_capture_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut producer: Producer<f32>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let err_sender = event_sender.clone();

        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    let written = push_samples(&mut producer, data);
                    if written < data.len() {
                        // Output isn't consuming fast enough
                        let _ = event_sender.try_send(Event::BufferUnderrun);
                    }
                },
                move |err| {
                    let _ = err_sender.try_send(Event::error(err));
                },
                None, // No timeout
            )
            .map_err(|e| ChainError::StreamBuildError(e.to_string()))?;

        Ok(stream)
    }

    fn build_output_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut processor: OutputProcessor,
        event_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    processor.process(data);
                },
                move |err| {
                    let _ = event_sender.try_send(Event::error(err));
                },
                None,
            )
            .map_err(|e| ChainError::StreamBuildError(e.to_string()))?;

        Ok(stream)
    }

    /// Get current peak levels (for UI meters)
    pub fn peaks(&self) -> (f32, f32) {
        self.shared.peaks()
    }

    pub fn set_bypass(&self, bypassed: bool) {
        debug!("Bypass {}", if bypassed { "on" } else { "off" });
        self.shared.bypassed.store(bypassed, Ordering::Relaxed);
    }

    /// Set master volume (clamped to 0.0 - 2.0)
    pub fn set_master_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 2.0);
        debug!("Master volume {:.2}", clamped);
        self.shared.set_master_volume(clamped);
    }

    /// Pause both streams
    pub fn stop(&self) -> EngineResult<()> {
        self.capture_stream
            .pause()
            .map_err(|e| ChainError::StreamPlayError(e.to_string()))?;
        self.output_stream
            .pause()
            .map_err(|e| ChainError::StreamPlayError(e.to_string()))?;
        info!("Chain stream stopped");
        Ok(())
    }
}

impl Drop for ChainStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to pause streams on drop: {}", e);
        }
        let _ = self.event_sender.try_send(Event::Stopped);
    }
}

/// Write as many samples as fit; returns how many were written
fn push_samples(producer: &mut Producer<f32>, data: &[f32]) -> usize {
    let len = data.len().min(producer.slots());
    match producer.write_chunk(len) {
        Ok(mut chunk) => {
            let (first, second) = chunk.as_mut_slices();
            let split = first.len();
            first.copy_from_slice(&data[..split]);
            second.copy_from_slice(&data[split..len]);
            chunk.commit_all();
            len
        }
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::ChainEngine;
    use crate::order::OrderSequence;

    fn processor_with(
        config: StreamConfig,
    ) -> (
        OutputProcessor,
        Producer<f32>,
        ChainEngine,
        crossbeam_channel::Receiver<Event>,
    ) {
        let (engine, renderer) = ChainEngine::new(EngineConfig {
            stream: config,
            ..Default::default()
        })
        .unwrap();
        let (producer, consumer) = RingBuffer::<f32>::new(config.samples_per_block() * RING_BLOCKS);
        let (tx, rx) = crossbeam_channel::unbounded();
        let processor =
            OutputProcessor::new(consumer, renderer, Arc::new(SharedState::new()), &config, tx);
        (processor, producer, engine, rx)
    }

    fn small_stream() -> StreamConfig {
        StreamConfig {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 32,
        }
    }

    #[test]
    fn test_shared_state_defaults() {
        let state = SharedState::new();
        assert!(!state.is_bypassed());
        assert_eq!(state.master_volume(), 1.0);
        assert_eq!(state.peaks(), (0.0, 0.0));
    }

    #[test]
    fn test_shared_state_volume() {
        let state = SharedState::new();

        state.set_master_volume(0.5);
        assert_eq!(state.master_volume(), 0.5);

        state.set_master_volume(0.0);
        assert_eq!(state.master_volume(), 0.0);
    }

    #[test]
    fn test_shared_state_peaks() {
        let state = SharedState::new();

        state.set_peaks(0.8, 0.6);
        assert_eq!(state.peaks(), (0.8, 0.6));
    }

    #[test]
    fn test_peak_levels() {
        let stereo = [0.1, -0.9, -0.5, 0.3];
        assert_eq!(peak_levels(&stereo, 2), (0.5, 0.9));

        let mono = [0.2, -0.7, 0.4];
        assert_eq!(peak_levels(&mono, 1), (0.7, 0.7));
    }

    #[test]
    fn test_push_samples_wraps_and_truncates() {
        let (mut producer, mut consumer) = RingBuffer::<f32>::new(4);

        assert_eq!(push_samples(&mut producer, &[1.0, 2.0, 3.0]), 3);
        assert_eq!(consumer.pop(), Ok(1.0));
        assert_eq!(consumer.pop(), Ok(2.0));

        // Wraps around the end of the ring, and the last sample doesn't fit
        assert_eq!(push_samples(&mut producer, &[4.0, 5.0, 6.0, 7.0]), 3);
        let drained: Vec<f32> = std::iter::from_fn(|| consumer.pop().ok()).collect();
        assert_eq!(drained, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_underrun_fills_silence() {
        let (mut processor, _producer, _engine, events) = processor_with(small_stream());

        let mut data = vec![0.7; 64];
        processor.process(&mut data);

        // Chain of real effects on silence stays silent
        assert!(data.iter().all(|s| s.abs() < 1e-6));
        assert!(events.try_iter().any(|e| e == Event::BufferUnderrun));
    }

    #[test]
    fn test_output_runs_chain_once_per_callback() {
        let (mut processor, mut producer, mut engine, _events) = processor_with(small_stream());
        engine.params().set_by_name("Overdrive Saturation", 3.0).unwrap();
        engine
            .set_order(OrderSequence::from_stages(&[crate::order::StageId::Overdrive]).unwrap())
            .unwrap();

        push_samples(&mut producer, &[0.2; 64]);
        let mut data = vec![0.0; 64];
        processor.process(&mut data);

        // Applied once, not twice
        let expected = (0.2_f32 * 3.0).tanh();
        assert!(data.iter().all(|s| (s - expected).abs() < 1e-6));
        assert_eq!(processor.shared.peaks().0, expected);
    }

    #[test]
    fn test_bypass_keeps_dry_signal_and_tracks_order() {
        let (mut processor, mut producer, mut engine, _events) = processor_with(small_stream());
        engine.params().set_by_name("Overdrive Saturation", 50.0).unwrap();
        let order = OrderSequence::from_stages(&[crate::order::StageId::Overdrive]).unwrap();
        engine.set_order(order).unwrap();

        processor.shared.bypassed.store(true, Ordering::Relaxed);
        push_samples(&mut producer, &[0.25; 64]);
        let mut data = vec![0.0; 64];
        processor.process(&mut data);

        assert!(data.iter().all(|s| *s == 0.25));
        assert_eq!(processor.renderer.current_order(), order);
    }

    #[test]
    fn test_bypass_holds_for_oversized_callbacks() {
        let config = small_stream();
        let (mut processor, mut producer, mut engine, events) = processor_with(config);
        engine.params().set_by_name("Overdrive Saturation", 50.0).unwrap();
        engine
            .set_order(OrderSequence::from_stages(&[crate::order::StageId::Overdrive]).unwrap())
            .unwrap();
        processor.shared.bypassed.store(true, Ordering::Relaxed);

        // Twice the capture ring, still within the largest valid block
        let ring = config.samples_per_block() * RING_BLOCKS;
        let mut data = vec![0.0; ring * 2];
        assert_eq!(push_samples(&mut producer, &vec![0.25; ring]), ring);
        processor.process(&mut data);

        // Dry input: what arrived, then underrun silence
        assert!(data[..ring].iter().all(|s| *s == 0.25));
        assert!(data[ring..].iter().all(|s| *s == 0.0));
        assert!(!events.try_iter().any(|e| matches!(e, Event::Error { .. })));
    }

    #[test]
    fn test_bypass_overflow_reported_once() {
        let config = small_stream();
        let (mut processor, _producer, mut engine, events) = processor_with(config);
        engine.set_order(OrderSequence::empty()).unwrap();
        processor.shared.bypassed.store(true, Ordering::Relaxed);

        let mut data = vec![0.0; config.max_samples_per_block() + config.channels as usize];
        processor.process(&mut data);
        processor.process(&mut data);

        let errors = events
            .try_iter()
            .filter(|e| matches!(e, Event::Error { .. }))
            .count();
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_master_volume_applied_after_chain() {
        let (mut processor, mut producer, mut engine, _events) = processor_with(small_stream());
        engine.set_order(OrderSequence::empty()).unwrap();
        processor.shared.set_master_volume(0.5);

        push_samples(&mut producer, &[0.8; 64]);
        let mut data = vec![0.0; 64];
        processor.process(&mut data);

        assert!(data.iter().all(|s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_level_events_throttled() {
        // 48000 / 32 = 1500 blocks/s, 50 blocks per meter event
        let (mut processor, mut producer, _engine, events) = processor_with(small_stream());
        assert_eq!(processor.blocks_per_meter, 50);

        let mut data = vec![0.0; 64];
        for _ in 0..100 {
            push_samples(&mut producer, &[0.0; 64]);
            processor.process(&mut data);
        }
        let meters = events
            .try_iter()
            .filter(|e| matches!(e, Event::LevelUpdate { .. }))
            .count();
        assert_eq!(meters, 2);
    }

    // Hardware-dependent tests
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_stream_open() {
        let (sender, _receiver) = crossbeam_channel::unbounded();
        let (_engine, renderer) = ChainEngine::new(EngineConfig::default()).unwrap();

        let input = find_input_device(None).unwrap();
        let output = find_output_device(None).unwrap();
        let stream =
            ChainStream::open(StreamConfig::default(), &input, &output, renderer, sender).unwrap();
        assert_eq!(stream.config.sample_rate, 48000);
    }
}
