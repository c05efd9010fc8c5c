// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use skeleton_viewer::constants::simulation;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "skeleton-viewer")]
#[command(about = "Depth, color and skeleton viewer for motion-sensing cameras")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scripted scene through a virtual sensor
    Simulate {
        /// Number of frames to play
        #[arg(short, long, default_value_t = simulation::DEFAULT_FRAMES)]
        frames: u64,

        /// Frame edges the simulated body touches
        #[arg(long, value_enum, default_value = "none")]
        clip: cli::ClipEdge,

        /// Display surface width in pixels
        #[arg(long, default_value_t = simulation::DEFAULT_SURFACE_WIDTH)]
        width: u32,

        /// Display surface height in pixels
        #[arg(long, default_value_t = simulation::DEFAULT_SURFACE_HEIGHT)]
        height: u32,

        /// Config file (default: ~/.config/skeleton-viewer/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Config file (default: ~/.config/skeleton-viewer/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=skeleton_viewer=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            frames,
            clip,
            width,
            height,
            config,
        } => cli::run_simulation(cli::SimulateOptions {
            frames,
            clip,
            width,
            height,
            config,
        }),
        Commands::Config { config } => cli::show_config(config),
    }
}
