// SPDX-License-Identifier: GPL-3.0-only

//! Skeleton stream types
//!
//! A skeleton frame carries up to [`MAX_SKELETONS`] bodies. Each body has a
//! tracking state, one position per [`JointId`] in skeleton space (meters,
//! sensor at the origin, +Y up, +Z away from the sensor) and the set of frame
//! edges it is clipped by.

use std::ops::{Index, IndexMut};

/// Number of bodies a sensor reports per skeleton frame
pub const MAX_SKELETONS: usize = 6;

/// Named anatomical points on a tracked body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JointId {
    HipCenter,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointId {
    pub const COUNT: usize = 20;

    /// All joints in index order
    pub const ALL: [JointId; JointId::COUNT] = [
        JointId::HipCenter,
        JointId::Spine,
        JointId::ShoulderCenter,
        JointId::Head,
        JointId::ShoulderLeft,
        JointId::ElbowLeft,
        JointId::WristLeft,
        JointId::HandLeft,
        JointId::ShoulderRight,
        JointId::ElbowRight,
        JointId::WristRight,
        JointId::HandRight,
        JointId::HipLeft,
        JointId::KneeLeft,
        JointId::AnkleLeft,
        JointId::FootLeft,
        JointId::HipRight,
        JointId::KneeRight,
        JointId::AnkleRight,
        JointId::FootRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Position in skeleton space, in meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkeletonPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SkeletonPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// How confidently the sensor located a single joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JointTrackingState {
    #[default]
    NotTracked,
    Inferred,
    Tracked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub id: JointId,
    pub position: SkeletonPoint,
    pub tracking_state: JointTrackingState,
}

/// Fixed-size joint table indexed by [`JointId`]
#[derive(Debug, Clone, PartialEq)]
pub struct JointCollection {
    joints: [Joint; JointId::COUNT],
}

impl JointCollection {
    /// All joints at the origin and not tracked
    pub fn new() -> Self {
        Self {
            joints: JointId::ALL.map(|id| Joint {
                id,
                position: SkeletonPoint::default(),
                tracking_state: JointTrackingState::NotTracked,
            }),
        }
    }

    /// Set a joint's position and mark it tracked
    pub fn set(&mut self, id: JointId, position: SkeletonPoint) {
        self.joints[id.index()] = Joint {
            id,
            position,
            tracking_state: JointTrackingState::Tracked,
        };
    }

    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter()
    }
}

impl Default for JointCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<JointId> for JointCollection {
    type Output = Joint;

    fn index(&self, id: JointId) -> &Joint {
        &self.joints[id.index()]
    }
}

impl IndexMut<JointId> for JointCollection {
    fn index_mut(&mut self, id: JointId) -> &mut Joint {
        &mut self.joints[id.index()]
    }
}

/// Body-level tracking state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkeletonTrackingState {
    #[default]
    NotTracked,
    /// Only the body's overall position is known, no joints
    PositionOnly,
    Tracked,
}

bitflags::bitflags! {
    /// Frame edges a body extends beyond
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameEdges: u8 {
        const RIGHT  = 1 << 0;
        const LEFT   = 1 << 1;
        const TOP    = 1 << 2;
        const BOTTOM = 1 << 3;
    }
}

impl Default for FrameEdges {
    fn default() -> Self {
        Self::empty()
    }
}

/// One body slot in a skeleton frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub tracking_id: u32,
    pub tracking_state: SkeletonTrackingState,
    pub position: SkeletonPoint,
    pub joints: JointCollection,
    pub clipped_edges: FrameEdges,
}

impl Skeleton {
    /// Empty, untracked slot
    pub fn not_tracked() -> Self {
        Self::default()
    }

    pub fn is_tracked(&self) -> bool {
        self.tracking_state == SkeletonTrackingState::Tracked
    }
}

/// A skeleton frame as delivered by the sensor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkeletonFrame {
    pub frame_number: u64,
    pub timestamp_ms: u64,
    pub skeletons: Vec<Skeleton>,
}

impl SkeletonFrame {
    pub fn new(frame_number: u64, skeletons: Vec<Skeleton>) -> Self {
        Self {
            frame_number,
            timestamp_ms: 0,
            skeletons,
        }
    }

    /// Copy skeleton entries into a caller-provided slot array
    ///
    /// Slots beyond the frame's entries are reset to untracked. Returns the
    /// number of entries copied.
    pub fn copy_skeleton_data_to(&self, slots: &mut [Skeleton]) -> usize {
        let count = self.skeletons.len().min(slots.len());
        for (slot, skeleton) in slots.iter_mut().zip(&self.skeletons) {
            slot.clone_from(skeleton);
        }
        for slot in slots.iter_mut().skip(count) {
            *slot = Skeleton::not_tracked();
        }
        count
    }

    pub fn tracked(&self) -> impl Iterator<Item = &Skeleton> {
        self.skeletons.iter().filter(|s| s.is_tracked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_index_matches_table() {
        for (i, id) in JointId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
        let joints = JointCollection::new();
        for id in JointId::ALL {
            assert_eq!(joints[id].id, id);
        }
    }

    #[test]
    fn test_set_joint_marks_tracked() {
        let mut joints = JointCollection::new();
        joints.set(JointId::Head, SkeletonPoint::new(0.0, 0.5, 2.0));
        assert_eq!(joints[JointId::Head].tracking_state, JointTrackingState::Tracked);
        assert_eq!(joints[JointId::Head].position.z, 2.0);
        assert_eq!(joints[JointId::Spine].tracking_state, JointTrackingState::NotTracked);
    }

    #[test]
    fn test_copy_skeleton_data_clears_tail() {
        let mut tracked = Skeleton::not_tracked();
        tracked.tracking_state = SkeletonTrackingState::Tracked;
        let frame = SkeletonFrame::new(3, vec![tracked.clone()]);

        let mut slots = vec![tracked; 3];
        assert_eq!(frame.copy_skeleton_data_to(&mut slots), 1);
        assert!(slots[0].is_tracked());
        assert!(!slots[1].is_tracked());
        assert!(!slots[2].is_tracked());
    }

    #[test]
    fn test_frame_edges_default_empty() {
        let edges = FrameEdges::default();
        assert!(edges.is_empty());
        let clipped = FrameEdges::TOP | FrameEdges::BOTTOM;
        assert!(clipped.contains(FrameEdges::TOP));
        assert!(!clipped.contains(FrameEdges::LEFT));
    }
}
