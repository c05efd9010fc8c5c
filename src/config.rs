// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::sensor::ImageFormat;
use crate::backends::sensor::motor_control::{TILT_MAX_DEGREES, TILT_MIN_DEGREES};
use crate::constants::{figures, tilt};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user's config dir
const CONFIG_DIR_NAME: &str = "skeleton-viewer";
const CONFIG_FILE_NAME: &str = "config.json";

/// RGBA stroke color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FigureColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl FigureColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Tilt controller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiltSettings {
    /// Lowest allowed angle (degrees)
    pub min_degrees: i32,
    /// Highest allowed angle (degrees)
    pub max_degrees: i32,
    /// Degrees moved per clipped-edge correction
    pub step_degrees: i32,
    /// Pause after each successful adjustment (milliseconds)
    pub cooldown_ms: u64,
    /// Pending tilt commands before new requests are dropped
    pub queue_capacity: usize,
}

impl TiltSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for TiltSettings {
    fn default() -> Self {
        Self {
            min_degrees: TILT_MIN_DEGREES,
            max_degrees: TILT_MAX_DEGREES,
            step_degrees: tilt::STEP_DEGREES,
            cooldown_ms: tilt::COOLDOWN_MS,
            queue_capacity: tilt::QUEUE_CAPACITY,
        }
    }
}

/// Skeleton figure rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureSettings {
    /// Line width of each figure
    pub stroke_width: f32,
    /// Colors assigned to skeleton slots, cycled by slot index
    pub palette: Vec<FigureColor>,
}

impl Default for FigureSettings {
    fn default() -> Self {
        Self {
            stroke_width: figures::STROKE_WIDTH,
            palette: figures::DEFAULT_PALETTE.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Depth stream format
    pub depth_format: ImageFormat,
    /// Color stream format
    pub color_format: ImageFormat,
    /// Tilt motor behaviour
    pub tilt: TiltSettings,
    /// Skeleton figure appearance
    pub figures: FigureSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            depth_format: ImageFormat::DepthResolution640x480Fps30,
            color_format: ImageFormat::RgbResolution640x480Fps30,
            tilt: TiltSettings::default(),
            figures: FigureSettings::default(),
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(AppError::Io(format!("{}: {}", path.display(), e))),
        };

        let config: Config = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from the default location
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| AppError::Io(format!("{}: {}", path.display(), e)))
    }

    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        let tilt = &self.tilt;
        if tilt.min_degrees > tilt.max_degrees {
            return Err(AppError::Config(format!(
                "tilt.min_degrees ({}) is above tilt.max_degrees ({})",
                tilt.min_degrees, tilt.max_degrees
            )));
        }
        if tilt.min_degrees < TILT_MIN_DEGREES || tilt.max_degrees > TILT_MAX_DEGREES {
            return Err(AppError::Config(format!(
                "tilt limits must stay within {}..={} degrees",
                TILT_MIN_DEGREES, TILT_MAX_DEGREES
            )));
        }
        if tilt.step_degrees <= 0 {
            return Err(AppError::Config("tilt.step_degrees must be positive".into()));
        }
        if tilt.queue_capacity == 0 {
            return Err(AppError::Config("tilt.queue_capacity must be at least 1".into()));
        }
        if self.figures.palette.is_empty() {
            return Err(AppError::Config("figures.palette must not be empty".into()));
        }
        if self.depth_format.stream_kind() != crate::backends::sensor::StreamKind::Depth {
            return Err(AppError::Config(format!(
                "depth_format {} is not a depth format",
                self.depth_format
            )));
        }
        if self.color_format.stream_kind() != crate::backends::sensor::StreamKind::Color {
            return Err(AppError::Config(format!(
                "color_format {} is not a color format",
                self.color_format
            )));
        }
        Ok(())
    }
}
