// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing pipelines
//!
//! Pure, per-frame transformations from sensor data to display artifacts.
//! None of these spawn tasks or talk to the device; the frame loop drives
//! them and forwards their outputs.
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Depth/Color  │ ──▶ │   PixelBuffer     │ ──▶ │ PixelSnapshot│
//! │   frame      │     │  - size check     │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │  Skeleton    │ ──▶ │ SkeletonPipeline  │ ──▶ │   Figures    │
//! │   frame      │     │  - joint mapping  │     │ Tilt requests│
//! │              │     │  - edge clipping  │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`stream_buffer`]: Fixed-size pixel buffers for image streams
//! - [`coordinate_mapper`]: Skeleton space to display surface projection
//! - [`skeleton_figure`]: Body segment line strips
//! - [`skeleton_frame`]: Per-frame figures and tilt requests

pub mod coordinate_mapper;
pub mod skeleton_figure;
pub mod skeleton_frame;
pub mod stream_buffer;

pub use coordinate_mapper::{CoordinateMapper, DepthImagePoint, Point, SurfaceSize};
pub use skeleton_figure::{BodySegment, Figure, FigureBuilder};
pub use skeleton_frame::{SkeletonOutput, SkeletonPipeline};
pub use stream_buffer::{BufferError, BufferResult, PixelBuffer, PixelRect, PixelSnapshot, WriteOutcome};
