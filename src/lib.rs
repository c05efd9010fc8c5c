// SPDX-License-Identifier: GPL-3.0-only

//! Skeleton Viewer - core of a depth, color and skeleton viewer
//!
//! This library turns a motion-sensing camera's frame notifications into
//! display artifacts and keeps the camera's tilt within safe bounds.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Sensor device abstraction, binding and tilt control
//! - [`pipelines`]: Pixel buffers, joint mapping and skeleton figures
//! - [`config`]: User configuration handling
//! - [`errors`]: Error types shared across layers
//!
//! # Example
//!
//! ```ignore
//! let mut manager = SensorManager::new(Config::load()?);
//! manager.bind_first_connected(&provider).await;
//! let figures = manager.display().skeletons().figures;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;

// Re-export commonly used types
pub use backends::sensor::{SensorDevice, SensorManager, SensorProvider};
pub use config::Config;
pub use errors::{AppError, AppResult};
