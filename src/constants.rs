// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Tilt motor defaults
pub mod tilt {
    /// Degrees per clipped-edge correction
    pub const STEP_DEGREES: i32 = 1;

    /// Hold time after each adjustment so the motor is not flooded
    pub const COOLDOWN_MS: u64 = 1000;

    /// Pending commands before requests are dropped
    pub const QUEUE_CAPACITY: usize = 16;
}

/// Skeleton figure defaults
pub mod figures {
    use crate::config::FigureColor;

    /// Line width of a figure in display units
    pub const STROKE_WIDTH: f32 = 8.0;

    /// Number of figures drawn per tracked body
    pub const FIGURES_PER_SKELETON: usize = 6;

    /// Slot colors, first entry is used for slot 0
    pub const DEFAULT_PALETTE: [FigureColor; 6] = [
        FigureColor::rgb(100, 149, 237), // cornflower blue
        FigureColor::rgb(50, 205, 50),   // lime green
        FigureColor::rgb(255, 165, 0),   // orange
        FigureColor::rgb(186, 85, 211),  // medium orchid
        FigureColor::rgb(255, 215, 0),   // gold
        FigureColor::rgb(64, 224, 208),  // turquoise
    ];
}

/// Frame pipeline constants
pub mod pipeline {
    /// Frame-ready notifications buffered per subscriber (keep small for low latency)
    pub const FRAME_QUEUE_CAPACITY: usize = 8;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Simulation defaults for the `simulate` command
pub mod simulation {
    /// Default frame count
    pub const DEFAULT_FRAMES: u64 = 90;

    /// Frames per second of the scripted scene
    pub const FPS: u64 = 30;

    /// Default display surface size
    pub const DEFAULT_SURFACE_WIDTH: u32 = 1280;
    pub const DEFAULT_SURFACE_HEIGHT: u32 = 960;
}
