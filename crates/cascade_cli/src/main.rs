//! Cascade - live effects chain from the terminal
//!
//! Opens a duplex stream on the chosen devices, runs the five-stage chain
//! on it and reads reorder/parameter commands from stdin.

mod command;

use std::io::{self, BufRead, Write};
use std::thread;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use cascade_core::{
    find_input_device, find_output_device, ChainEngine, ChainError, ChainStream, EngineConfig,
    EngineResult, Event, OrderSequence, StreamConfig,
};

use crate::command::{apply_set, parse_order, CliCommand, HELP};

#[derive(Parser)]
#[command(name = "cascade")]
#[command(author, version, about = "Reorderable real-time effects chain", long_about = None)]
struct Args {
    /// Input device name (default: system default)
    #[arg(long)]
    input_device: Option<String>,

    /// Output device name (default: system default)
    #[arg(long)]
    output_device: Option<String>,

    /// Sample rate
    #[arg(long, default_value = "48000")]
    sample_rate: u32,

    /// Buffer size in frames
    #[arg(long, default_value = "512")]
    buffer_size: u32,

    /// Channel count
    #[arg(long, default_value = "2")]
    channels: u16,

    /// Starting order, e.g. "4 3 2 1 0"
    #[arg(long)]
    order: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let initial_order = match &args.order {
        Some(stages) => parse_order(&stages.split_whitespace().collect::<Vec<_>>())
            .context("invalid --order")?,
        None => OrderSequence::default(),
    };

    let config = EngineConfig {
        stream: StreamConfig {
            sample_rate: args.sample_rate,
            channels: args.channels,
            buffer_size: args.buffer_size,
        },
        initial_order,
        ..Default::default()
    };

    let (mut engine, renderer) =
        ChainEngine::new(config.clone()).context("failed to build the chain")?;

    let (event_sender, event_receiver) = crossbeam_channel::bounded::<Event>(256);
    engine.set_event_sender(event_sender.clone());

    let input = find_input_device(args.input_device.as_deref())?;
    let output = find_output_device(args.output_device.as_deref())?;
    let stream = ChainStream::open(config.stream, &input, &output, renderer, event_sender)
        .context("failed to open audio stream")?;

    let events = thread::Builder::new()
        .name("cascade-events".into())
        .spawn(move || log_events(event_receiver))
        .context("failed to spawn event thread")?;

    println!("{}", HELP);
    print_order(&engine);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<CliCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        if command == CliCommand::Quit {
            break;
        }
        if let Err(e) = execute(command, &mut engine, &stream) {
            match e.downcast_ref::<ChainError>() {
                Some(ChainError::OrderChannelFull) => {
                    println!("audio thread is busy, try again in a moment")
                }
                _ => println!("error: {:#}", e),
            }
        }
        io::stdout().flush()?;
    }

    info!("Shutting down");
    drop(stream);
    drop(engine);
    if events.join().is_err() {
        warn!("Event thread panicked");
    }
    Ok(())
}

fn execute(command: CliCommand, engine: &mut ChainEngine, stream: &ChainStream) -> anyhow::Result<()> {
    match command {
        CliCommand::Order(order) => reorder(engine, |e| e.set_order(order))?,
        CliCommand::Move { from, to } => reorder(engine, |e| e.move_stage(from, to))?,
        CliCommand::Swap { a, b } => reorder(engine, |e| e.swap_stages(a, b))?,
        CliCommand::Disable(stage) => reorder(engine, |e| e.disable_stage(stage))?,
        CliCommand::Enable { stage, slot } => reorder(engine, |e| e.enable_stage_at(slot, stage))?,
        CliCommand::Reset => reorder(engine, ChainEngine::reset_order)?,
        CliCommand::Set { name, value } => {
            apply_set(engine.params(), &name, &value)?;
            debug!("Set '{}' = {}", name, value);
        }
        CliCommand::Bypass(on) => stream.set_bypass(on),
        CliCommand::Volume(volume) => stream.set_master_volume(volume),
        CliCommand::Show => show(engine, stream),
        CliCommand::Help => println!("{}", HELP),
        CliCommand::Quit => {}
    }
    Ok(())
}

fn reorder(
    engine: &mut ChainEngine,
    edit: impl FnOnce(&mut ChainEngine) -> EngineResult<()>,
) -> EngineResult<()> {
    edit(engine)?;
    print_order(engine);
    Ok(())
}

fn print_order(engine: &ChainEngine) {
    let order = engine.requested_order();
    println!("chain: {}", order);
    for (slot, entry) in order.slots().iter().enumerate() {
        println!("  [{}] {}", slot, entry);
    }
}

fn show(engine: &ChainEngine, stream: &ChainStream) {
    print_order(engine);

    let (left, right) = stream.peaks();
    println!(
        "bypass: {}  volume: {:.2}  peaks: L {:.3} R {:.3}",
        if stream.shared.is_bypassed() { "on" } else { "off" },
        stream.shared.master_volume(),
        left,
        right
    );

    let params = engine.params();
    for param in params.float_params() {
        println!("  {:<28} {:>10.3}", param.name(), param.get());
    }
    println!(
        "  {:<28} {:>10}",
        params.ladder.mode.name(),
        label(params.ladder.mode.labels(), params.ladder.mode.index())
    );
    println!(
        "  {:<28} {:>10}",
        params.general_filter.mode.name(),
        label(params.general_filter.mode.labels(), params.general_filter.mode.index())
    );
}

fn label(labels: &[&'static str], index: u8) -> &'static str {
    labels.get(index as usize).copied().unwrap_or("?")
}

/// Runs until every event sender is gone
fn log_events(events: Receiver<Event>) {
    for event in events {
        match event {
            Event::Started => info!("Audio started"),
            Event::Stopped => info!("Audio stopped"),
            Event::Error { message } => error!("Audio error: {}", message),
            Event::BufferUnderrun => debug!("Buffer underrun"),
            Event::OrderChanged(order) => debug!("Order queued: [{}]", order),
            Event::LevelUpdate { .. } => {}
        }
    }
}
