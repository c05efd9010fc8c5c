// SPDX-License-Identifier: GPL-3.0-only

//! Kinect depth camera intrinsics
//!
//! Pinhole parameters of the depth camera, used to project skeleton-space
//! positions into depth-image pixels.
//!
//! Reference resolution: 640x480. Lower depth resolutions scale every
//! parameter linearly.

use super::types::StreamDescriptor;

/// Focal length X (pixels) at 640x480 base resolution
pub const FX: f32 = 594.21;
/// Focal length Y (pixels) at 640x480 base resolution
pub const FY: f32 = 591.04;
/// Principal point X (pixels) at 640x480 base resolution
pub const CX: f32 = 339.5;
/// Principal point Y (pixels) at 640x480 base resolution
pub const CY: f32 = 242.7;

/// Base width for intrinsics calculation
pub const BASE_WIDTH: f32 = 640.0;
/// Base height for intrinsics calculation
pub const BASE_HEIGHT: f32 = 480.0;

/// Depth camera intrinsics at a specific resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl DepthIntrinsics {
    /// Kinect defaults scaled to `width` x `height`
    pub fn kinect(width: u32, height: u32) -> Self {
        let sx = width as f32 / BASE_WIDTH;
        let sy = height as f32 / BASE_HEIGHT;
        Self {
            fx: FX * sx,
            fy: FY * sy,
            cx: CX * sx,
            cy: CY * sy,
            width,
            height,
        }
    }

    pub fn for_descriptor(descriptor: &StreamDescriptor) -> Self {
        Self::kinect(descriptor.width, descriptor.height)
    }
}

impl Default for DepthIntrinsics {
    fn default() -> Self {
        Self::kinect(BASE_WIDTH as u32, BASE_HEIGHT as u32)
    }
}
