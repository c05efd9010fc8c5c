// SPDX-License-Identifier: GPL-3.0-only

//! Skeleton space to display surface mapping
//!
//! Two steps, both recomputed for every joint:
//! 1. pinhole projection of the skeleton-space position into the depth
//!    image (native depth-stream pixels)
//! 2. per-axis rescale from the depth stream size to the current display
//!    surface size
//!
//! Positions outside the field of view simply land outside the surface.

use crate::backends::sensor::{DepthIntrinsics, Joint, SkeletonPoint};

/// Display surface size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
}

impl SurfaceSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Point on the display surface
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Point in depth-image pixels with its depth in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthImagePoint {
    pub x: f32,
    pub y: f32,
    pub depth_mm: f32,
}

/// Projects joints for one depth stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    intrinsics: DepthIntrinsics,
}

impl CoordinateMapper {
    pub fn new(intrinsics: DepthIntrinsics) -> Self {
        Self { intrinsics }
    }

    pub fn intrinsics(&self) -> &DepthIntrinsics {
        &self.intrinsics
    }

    /// Project into native depth-image pixels
    ///
    /// Skeleton +Y is up while image rows grow downwards. Points at or
    /// behind the sensor plane map to the image origin with zero depth.
    pub fn map_skeleton_point_to_depth(&self, point: SkeletonPoint) -> DepthImagePoint {
        if point.z <= f32::EPSILON {
            return DepthImagePoint::default();
        }
        let k = &self.intrinsics;
        DepthImagePoint {
            x: k.cx + k.fx * point.x / point.z,
            y: k.cy - k.fy * point.y / point.z,
            depth_mm: point.z * 1000.0,
        }
    }

    /// Rescale a depth-image point onto `surface`
    pub fn scale_to_surface(&self, point: DepthImagePoint, surface: SurfaceSize) -> Point {
        let scale_x = surface.width / self.intrinsics.width as f32;
        let scale_y = surface.height / self.intrinsics.height as f32;
        Point {
            x: point.x * scale_x,
            y: point.y * scale_y,
        }
    }

    /// Joint position on the display surface
    pub fn joint_point(&self, joint: &Joint, surface: SurfaceSize) -> Point {
        self.scale_to_surface(self.map_skeleton_point_to_depth(joint.position), surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::{JointId, JointTrackingState};

    fn joint_at(x: f32, y: f32, z: f32) -> Joint {
        Joint {
            id: JointId::Head,
            position: SkeletonPoint::new(x, y, z),
            tracking_state: JointTrackingState::Tracked,
        }
    }

    #[test]
    fn test_optical_axis_hits_principal_point() {
        let mapper = CoordinateMapper::new(DepthIntrinsics::kinect(640, 480));
        let p = mapper.map_skeleton_point_to_depth(SkeletonPoint::new(0.0, 0.0, 2.0));
        assert_eq!(p.x, mapper.intrinsics().cx);
        assert_eq!(p.y, mapper.intrinsics().cy);
        assert_eq!(p.depth_mm, 2000.0);
    }

    #[test]
    fn test_up_is_towards_top_row() {
        let mapper = CoordinateMapper::new(DepthIntrinsics::kinect(640, 480));
        let high = mapper.map_skeleton_point_to_depth(SkeletonPoint::new(0.0, 0.5, 2.0));
        let low = mapper.map_skeleton_point_to_depth(SkeletonPoint::new(0.0, -0.5, 2.0));
        assert!(high.y < low.y);
        let right = mapper.map_skeleton_point_to_depth(SkeletonPoint::new(0.5, 0.0, 2.0));
        assert!(right.x > mapper.intrinsics().cx);
    }

    #[test]
    fn test_native_surface_is_identity() {
        let mapper = CoordinateMapper::new(DepthIntrinsics::kinect(640, 480));
        let joint = joint_at(0.3, -0.2, 1.8);
        let native = mapper.map_skeleton_point_to_depth(joint.position);
        let mapped = mapper.joint_point(&joint, SurfaceSize::new(640.0, 480.0));
        assert_eq!(mapped.x, native.x);
        assert_eq!(mapped.y, native.y);
    }

    #[test]
    fn test_axes_scale_independently() {
        let mapper = CoordinateMapper::new(DepthIntrinsics::kinect(320, 240));
        let joint = joint_at(0.1, 0.1, 2.0);
        let native = mapper.map_skeleton_point_to_depth(joint.position);

        let mapped = mapper.joint_point(&joint, SurfaceSize::new(960.0, 480.0));
        assert!((mapped.x - native.x * 3.0).abs() < 1e-3);
        assert!((mapped.y - native.y * 2.0).abs() < 1e-3);

        // Resizing between frames changes the result
        let resized = mapper.joint_point(&joint, SurfaceSize::new(320.0, 240.0));
        assert!((resized.x - native.x).abs() < 1e-3);
    }

    #[test]
    fn test_point_behind_sensor_maps_to_origin() {
        let mapper = CoordinateMapper::new(DepthIntrinsics::default());
        assert_eq!(
            mapper.map_skeleton_point_to_depth(SkeletonPoint::new(1.0, 1.0, 0.0)),
            DepthImagePoint::default()
        );
    }
}
