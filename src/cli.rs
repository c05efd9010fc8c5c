// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the skeleton viewer
//!
//! This module provides command-line functionality for:
//! - Playing a scripted scene through a virtual sensor
//! - Showing the effective configuration

use clap::ValueEnum;
use skeleton_viewer::backends::sensor::virtual_sensor::standing_skeleton;
use skeleton_viewer::backends::sensor::{
    FrameEdges, SensorDevice, SensorManager, SensorProvider, StreamKind, VirtualSensor,
    VirtualSensorHub,
};
use skeleton_viewer::config::Config;
use skeleton_viewer::constants::simulation;
use skeleton_viewer::pipelines::SurfaceSize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Which frame edges the simulated body touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClipEdge {
    None,
    Top,
    Bottom,
    Both,
}

impl ClipEdge {
    fn edges(self) -> FrameEdges {
        match self {
            ClipEdge::None => FrameEdges::empty(),
            ClipEdge::Top => FrameEdges::TOP,
            ClipEdge::Bottom => FrameEdges::BOTTOM,
            ClipEdge::Both => FrameEdges::TOP | FrameEdges::BOTTOM,
        }
    }
}

/// Options for the `simulate` command
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub frames: u64,
    pub clip: ClipEdge,
    pub width: u32,
    pub height: u32,
    pub config: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Play a scripted scene through a virtual sensor
///
/// The body is present for the first two thirds of the frames, then the
/// scene is empty so the tilt returns to level.
pub fn run_simulation(options: SimulateOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(options.config.as_deref())?;

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let hub = VirtualSensorHub::new();
        let mut status_events = hub.subscribe_status();
        let sensor = VirtualSensor::connected("virtual-0");

        let mut manager = SensorManager::new(config);
        let display = manager.display();
        display.set_surface_size(SurfaceSize::new(
            options.width as f32,
            options.height as f32,
        ));

        hub.attach(Arc::clone(&sensor));
        let event = status_events.recv().await?;
        manager.handle_status_change(event).await?;

        let Some(mut tilt_status) = manager.tilt_status() else {
            return Err("Sensor did not bind".into());
        };

        println!("Sensor: virtual-0");
        if let Some(depth) = sensor.stream_descriptor(StreamKind::Depth) {
            println!("Depth: {}", depth);
        }
        if let Some(color) = sensor.stream_descriptor(StreamKind::Color) {
            println!("Color: {}", color);
        }
        println!("Surface: {}x{}", options.width, options.height);
        println!("Playing {} frames (press Ctrl+C to stop early)", options.frames);
        println!();

        let frame_interval = Duration::from_millis(1000 / simulation::FPS);
        let present_until = options.frames * 2 / 3;
        let edges = options.clip.edges();

        for frame in 0..options.frames {
            if stop_flag.load(Ordering::SeqCst) {
                println!();
                println!("Stopping early...");
                break;
            }

            sensor.emit_depth(1000 + (frame % 1000) as u16);
            sensor.emit_color([0x20, 0x20, 0x20, 0xff]);
            let bodies = if frame < present_until {
                let sway = ((frame as f32) / 15.0).sin() * 0.3;
                vec![standing_skeleton(1, sway, 2.5, edges)]
            } else {
                Vec::new()
            };
            sensor.emit_skeletons(bodies);

            tokio::time::sleep(frame_interval).await;

            if frame % simulation::FPS == 0 {
                let output = display.skeletons();
                let angle = tilt_status.borrow_and_update().angle;
                println!(
                    "frame {:>4}: {} figures, tilt {:+}°",
                    frame,
                    output.figures.len(),
                    angle
                );
                if let Some(torso) = output.figures.first() {
                    let points: Vec<String> = torso
                        .points
                        .iter()
                        .map(|p| format!("({:.0},{:.0})", p.x, p.y))
                        .collect();
                    println!("            torso {}", points.join(" "));
                }
            }
        }

        let Some(summary) = manager.unbind_device().await else {
            return Err("Sensor was unbound unexpectedly".into());
        };
        println!();
        println!("Depth frames: {}", summary.frames.depth_frames);
        println!("Color frames: {}", summary.frames.color_frames);
        println!("Skeleton frames: {}", summary.frames.skeleton_frames);
        println!("Tilt requests: {}", summary.frames.tilt_requests);
        println!(
            "Tilt commands processed: {}",
            summary.tilt.commands_processed
        );
        println!("Final tilt: {:+}°", summary.tilt.angle);
        println!("Angle writes: {:?}", sensor.angle_writes());

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Print the effective configuration and where it is read from
pub fn show_config(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let shown_path = path.clone().unwrap_or_else(Config::default_path);
    let config = load_config(path.as_deref())?;

    println!("Config file: {}", shown_path.display());
    if !shown_path.exists() {
        println!("(not found, using defaults)");
    }
    println!();
    println!("{}", config.to_json()?);
    Ok(())
}
