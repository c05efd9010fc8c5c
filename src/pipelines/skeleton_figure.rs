// SPDX-License-Identifier: GPL-3.0-only

//! Skeleton figures
//!
//! Every tracked body is drawn as six line strips. The joint order inside a
//! strip is the drawing order and must not change.

use crate::backends::sensor::{JointId, Skeleton};
use crate::config::{FigureColor, FigureSettings};

use super::coordinate_mapper::{CoordinateMapper, Point, SurfaceSize};

/// Body segment drawn as one line strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodySegment {
    HeadAndTorso,
    Hips,
    LeftLeg,
    RightLeg,
    LeftArm,
    RightArm,
}

impl BodySegment {
    /// Segments in drawing order
    pub const ALL: [BodySegment; 6] = [
        BodySegment::HeadAndTorso,
        BodySegment::Hips,
        BodySegment::LeftLeg,
        BodySegment::RightLeg,
        BodySegment::LeftArm,
        BodySegment::RightArm,
    ];

    /// Joint chain of the segment
    pub fn joints(&self) -> &'static [JointId] {
        match self {
            BodySegment::HeadAndTorso => &[
                JointId::Head,
                JointId::ShoulderCenter,
                JointId::ShoulderLeft,
                JointId::Spine,
                JointId::ShoulderRight,
                JointId::ShoulderCenter,
                JointId::HipCenter,
            ],
            BodySegment::Hips => &[JointId::HipLeft, JointId::HipRight],
            BodySegment::LeftLeg => &[
                JointId::HipCenter,
                JointId::HipLeft,
                JointId::KneeLeft,
                JointId::AnkleLeft,
                JointId::FootLeft,
            ],
            BodySegment::RightLeg => &[
                JointId::HipCenter,
                JointId::HipRight,
                JointId::KneeRight,
                JointId::AnkleRight,
                JointId::FootRight,
            ],
            BodySegment::LeftArm => &[
                JointId::ShoulderLeft,
                JointId::ElbowLeft,
                JointId::WristLeft,
                JointId::HandLeft,
            ],
            BodySegment::RightArm => &[
                JointId::ShoulderRight,
                JointId::ElbowRight,
                JointId::WristRight,
                JointId::HandRight,
            ],
        }
    }
}

/// A colored line strip in display-surface coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub segment: BodySegment,
    /// Skeleton slot the figure belongs to
    pub slot: usize,
    pub tracking_id: u32,
    pub color: FigureColor,
    pub stroke_width: f32,
    pub points: Vec<Point>,
}

/// Turns tracked skeletons into figures
#[derive(Debug, Clone)]
pub struct FigureBuilder {
    palette: Vec<FigureColor>,
    stroke_width: f32,
}

impl FigureBuilder {
    pub fn new(settings: &FigureSettings) -> Self {
        Self {
            palette: settings.palette.clone(),
            stroke_width: settings.stroke_width,
        }
    }

    /// Color for a skeleton slot, cycling through the palette
    pub fn color_for_slot(&self, slot: usize) -> FigureColor {
        if self.palette.is_empty() {
            return crate::constants::figures::DEFAULT_PALETTE[0];
        }
        self.palette[slot % self.palette.len()]
    }

    /// Figures for the skeleton in `slot`; none unless it is fully tracked
    pub fn build(
        &self,
        slot: usize,
        skeleton: &Skeleton,
        mapper: &CoordinateMapper,
        surface: SurfaceSize,
    ) -> Vec<Figure> {
        if !skeleton.is_tracked() {
            return Vec::new();
        }

        let color = self.color_for_slot(slot);
        BodySegment::ALL
            .iter()
            .map(|&segment| Figure {
                segment,
                slot,
                tracking_id: skeleton.tracking_id,
                color,
                stroke_width: self.stroke_width,
                points: segment
                    .joints()
                    .iter()
                    .map(|&joint| mapper.joint_point(&skeleton.joints[joint], surface))
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::virtual_sensor::standing_skeleton;
    use crate::backends::sensor::{DepthIntrinsics, FrameEdges, SkeletonTrackingState};

    fn builder() -> FigureBuilder {
        FigureBuilder::new(&FigureSettings::default())
    }

    fn mapper() -> CoordinateMapper {
        CoordinateMapper::new(DepthIntrinsics::kinect(640, 480))
    }

    #[test]
    fn test_segment_lengths() {
        let lengths: Vec<usize> = BodySegment::ALL.iter().map(|s| s.joints().len()).collect();
        assert_eq!(lengths, vec![7, 2, 5, 5, 4, 4]);
    }

    #[test]
    fn test_tracked_skeleton_yields_six_figures_in_order() {
        let skeleton = standing_skeleton(4, 0.0, 2.0, FrameEdges::empty());
        let surface = SurfaceSize::new(640.0, 480.0);
        let figures = builder().build(0, &skeleton, &mapper(), surface);

        assert_eq!(figures.len(), 6);
        let segments: Vec<BodySegment> = figures.iter().map(|f| f.segment).collect();
        assert_eq!(segments, BodySegment::ALL.to_vec());

        let torso = &figures[0];
        assert_eq!(torso.points.len(), 7);
        assert_eq!(torso.stroke_width, 8.0);
        assert_eq!(torso.tracking_id, 4);
        for (point, joint) in torso.points.iter().zip(BodySegment::HeadAndTorso.joints()) {
            assert_eq!(*point, mapper().joint_point(&skeleton.joints[*joint], surface));
        }
        // ShoulderCenter appears twice in the torso strip
        assert_eq!(torso.points[1], torso.points[5]);
    }

    #[test]
    fn test_untracked_skeleton_yields_nothing() {
        let mut skeleton = standing_skeleton(1, 0.0, 2.0, FrameEdges::empty());
        skeleton.tracking_state = SkeletonTrackingState::PositionOnly;
        assert!(builder().build(0, &skeleton, &mapper(), SurfaceSize::new(640.0, 480.0)).is_empty());

        skeleton.tracking_state = SkeletonTrackingState::NotTracked;
        assert!(builder().build(0, &skeleton, &mapper(), SurfaceSize::new(640.0, 480.0)).is_empty());
    }

    #[test]
    fn test_palette_cycles_by_slot() {
        let settings = FigureSettings {
            palette: vec![FigureColor::rgb(1, 2, 3), FigureColor::rgb(4, 5, 6)],
            ..FigureSettings::default()
        };
        let builder = FigureBuilder::new(&settings);
        assert_eq!(builder.color_for_slot(0), FigureColor::rgb(1, 2, 3));
        assert_eq!(builder.color_for_slot(1), FigureColor::rgb(4, 5, 6));
        assert_eq!(builder.color_for_slot(4), FigureColor::rgb(1, 2, 3));
    }
}
