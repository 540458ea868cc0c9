//! Operator tool for the adaptive detection engine.
//!
//! # Commands
//!
//! - `detect verify <path> --expected-size N` - Check an artifact's size and header
//! - `detect config` - Print the default engine configuration
//! - `detect config --check <file>` - Parse and validate a configuration file
//! - `detect replay <config> <images...>` - Run stills through the engine
//!   (requires the `onnx` feature)

mod config;
mod replay;
mod verify;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use detect_engine::{LogConfig, init_tracing};
use detect_model::DEFAULT_ONNX_IR_VERSION;

/// Adaptive detection engine tools
#[derive(Parser)]
#[command(name = "detect")]
#[command(about = "Verify models, check configs and replay frames", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug logging with module targets
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a model artifact's size and format header
    Verify {
        /// Artifact path
        #[arg(name = "PATH")]
        path: PathBuf,

        /// Declared approximate size in bytes; omit to check the header only
        #[arg(long)]
        expected_size: Option<u64>,

        /// Accepted fractional size deviation
        #[arg(long, default_value_t = 0.10)]
        tolerance: f64,

        /// Highest accepted ONNX IR version
        #[arg(long, default_value_t = DEFAULT_ONNX_IR_VERSION)]
        format_version: u32,
    },

    /// Print the default config, or validate one with --check
    Config {
        /// Configuration file to validate
        #[arg(long, value_name = "FILE")]
        check: Option<PathBuf>,
    },

    /// Run still images through the engine and print detections as JSON
    Replay {
        /// Engine configuration file
        #[arg(name = "CONFIG")]
        config: PathBuf,

        /// Images to process in order
        #[arg(name = "IMAGES", required = true)]
        images: Vec<PathBuf>,

        /// Try the GPU execution provider first
        #[arg(long)]
        gpu: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    init_tracing(&log).context("installing tracing subscriber")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building async runtime")?;

    match cli.command {
        Commands::Verify {
            path,
            expected_size,
            tolerance,
            format_version,
        } => runtime.block_on(verify::run(&path, expected_size, tolerance, format_version)),
        Commands::Config { check } => config::run(check.as_deref()),
        Commands::Replay {
            config,
            images,
            gpu,
        } => runtime.block_on(replay::run(&config, &images, gpu)),
    }
}
