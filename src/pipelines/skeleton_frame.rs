// SPDX-License-Identifier: GPL-3.0-only

//! Skeleton frame processing
//!
//! Turns one skeleton frame into the figures to draw and the tilt commands
//! to queue. Nothing here touches the motor; the caller forwards
//! `tilt_requests` to the tilt controller.

use tracing::debug;

use crate::backends::sensor::motor_control::edge_corrections;
use crate::backends::sensor::{Skeleton, SkeletonFrame, TiltCommand};
use crate::config::Config;

use super::coordinate_mapper::{CoordinateMapper, SurfaceSize};
use super::skeleton_figure::{Figure, FigureBuilder};

/// Everything produced by one skeleton frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonOutput {
    pub frame_number: u64,
    /// Figures for every tracked body, slot by slot
    pub figures: Vec<Figure>,
    /// Tilt commands in the order they must be queued
    pub tilt_requests: Vec<TiltCommand>,
}

impl SkeletonOutput {
    /// Number of bodies that produced figures
    pub fn tracked_count(&self) -> usize {
        let mut slots: Vec<usize> = self.figures.iter().map(|f| f.slot).collect();
        slots.dedup();
        slots.len()
    }
}

/// Per-device skeleton pipeline
#[derive(Debug, Clone)]
pub struct SkeletonPipeline {
    mapper: CoordinateMapper,
    builder: FigureBuilder,
    step_degrees: i32,
    slots: Vec<Skeleton>,
}

impl SkeletonPipeline {
    /// `slot_count` is the device's skeleton array length
    pub fn new(mapper: CoordinateMapper, config: &Config, slot_count: usize) -> Self {
        Self {
            mapper,
            builder: FigureBuilder::new(&config.figures),
            step_degrees: config.tilt.step_degrees,
            slots: vec![Skeleton::not_tracked(); slot_count],
        }
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Process a frame against the current surface size
    ///
    /// An absent frame yields `None`. A frame with no skeleton entries asks
    /// for a reset to level. Every entry, tracked or not, is checked for
    /// clipped edges.
    pub fn process(
        &mut self,
        frame: Option<&SkeletonFrame>,
        surface: SurfaceSize,
    ) -> Option<SkeletonOutput> {
        let frame = frame?;
        let count = frame.copy_skeleton_data_to(&mut self.slots);

        let mut output = SkeletonOutput {
            frame_number: frame.frame_number,
            ..SkeletonOutput::default()
        };

        if frame.skeletons.is_empty() {
            output.tilt_requests.push(TiltCommand::Reset);
            return Some(output);
        }

        for (slot, skeleton) in self.slots[..count].iter().enumerate() {
            output
                .tilt_requests
                .extend(edge_corrections(skeleton.clipped_edges, self.step_degrees));
            output
                .figures
                .extend(self.builder.build(slot, skeleton, &self.mapper, surface));
        }

        if !output.tilt_requests.is_empty() {
            debug!(
                frame = frame.frame_number,
                requests = ?output.tilt_requests,
                "Skeleton frame requests tilt"
            );
        }
        Some(output)
    }
}
