//! # iocontrol
//!
//! I/O controller process. Commands arrive as JSON lines on stdin,
//! statuses leave as JSON lines on stdout, logs go to stderr.
//!
//! With `--simulate` the toolchanger simulator answers every handshake,
//! so the whole protocol can be driven from a terminal.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use iocontrol::channel::JsonLinesChannel;
use iocontrol::controller::IoController;
use iocontrol::cycle::CycleRunner;
use iocontrol::signals::SignalTable;
use iocontrol::sim::ToolchangerSim;
use iocontrol_common::config::{ConfigLoader, DebugFlags, IoControlConfig};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// iocontrol — toolchanger, coolant, lube and estop I/O controller
#[derive(Parser, Debug)]
#[command(name = "iocontrol")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "I/O controller: toolchanger handshake, coolant, lube and estop")]
struct Args {
    /// Path to the configuration TOML.
    #[arg(default_value = "config/iocontrol.toml")]
    config: PathBuf,

    /// Honour TOOL_START_CHANGE regardless of the config file (protocol v2).
    #[arg(long)]
    support_start_change: bool,

    /// Answer the toolchanger handshakes with the built-in simulator.
    #[arg(short, long)]
    simulate: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let filter = setup_tracing(&args);

    info!("iocontrol v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, filter) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("iocontrol shutdown complete");
}

fn run(args: &Args, filter: FilterHandle) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = IoControlConfig::load(&args.config)?;
    config.resolve_paths(&args.config);
    if args.support_start_change {
        config.iocontrol.support_start_change = true;
    }
    config.validate()?;

    let base_level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        config.shared.log_level.as_directive().parse()?
    };
    filter.reload(env_filter(base_level))?;

    let settings = config.iocontrol;
    info!(
        "Config OK: service={}, protocol={}, cycle_time={}s, {} changer, tool table {}",
        config.shared.service_name,
        settings.protocol_version,
        settings.cycle_time,
        if settings.random_toolchanger { "random" } else { "sequential" },
        settings.tool_table.display()
    );

    let signals = SignalTable::new(settings.protocol_version);
    let mut controller = IoController::new(settings, signals)?;
    controller.set_debug_hook(move |flags| {
        let level = if flags.contains(DebugFlags::IOCONTROL) {
            LevelFilter::DEBUG.max(base_level)
        } else {
            base_level
        };
        if let Err(e) = filter.reload(env_filter(level)) {
            warn!("log level change failed: {e}");
        }
    });

    let sim = if args.simulate {
        let sim = match &config.simulation {
            Some(sim_config) => ToolchangerSim::from_config(sim_config)?,
            None => ToolchangerSim::loopback(),
        };
        info!("toolchanger simulator enabled");
        Some(sim)
    } else {
        if config.simulation.is_some() {
            info!("[simulation] present but --simulate not given, ignored");
        }
        None
    };

    let channel = JsonLinesChannel::stdio()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut runner = CycleRunner::new(controller, channel, sim, running)?;
    runner.run()?;
    Ok(())
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Install the subscriber. The returned handle swaps the filter at runtime.
fn setup_tracing(args: &Args) -> FilterHandle {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let (filter, handle) = reload::Layer::new(env_filter(level));
    let registry = tracing_subscriber::registry().with(filter);

    if args.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
    handle
}
