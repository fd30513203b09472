//! # Engine-Room Ventilation and Cooling Plant Simulator
//!
//! A Modbus/TCP server that impersonates an industrial PLC, for testing
//! HMI and Edge-AI clients against a physically-coherent, fault-injecting
//! ventilation and cooling plant without real hardware.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (binds 0.0.0.0:502, unit id 3)
//! ventsim_core
//!
//! # Run against a config file
//! ventsim_core --config ventsim.toml -v
//! ```

#![deny(warnings)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;
use ventsim_common::config::SimConfig;
use ventsim_common::consts::{MAJOR_MINOR_REVISION, PRODUCT_NAME, VENDOR_NAME};
use ventsim_core::PlcCore;

/// Engine-room ventilation and cooling plant Modbus/TCP simulator.
#[derive(Parser, Debug)]
#[command(name = "ventsim_core")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Modbus/TCP engine-room ventilation and cooling plant simulator")]
struct Args {
    /// Path to simulation configuration file (TOML). Missing fields fall
    /// back to built-in defaults; a missing file is an error.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("ventsim startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!(
        "{} v{} ({}, rev {}) starting...",
        PRODUCT_NAME,
        env!("CARGO_PKG_VERSION"),
        VENDOR_NAME,
        MAJOR_MINOR_REVISION
    );

    let cfg = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    info!(bind_addr = %cfg.bind_addr, unit_id = cfg.unit_id, "configuration loaded");

    let core = PlcCore::new(cfg);

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    core.run()?;

    info!("ventsim_core shutdown complete");
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
