// SPDX-License-Identifier: GPL-3.0-only
//! Frame dispatch loop
//!
//! One task per bound sensor consumes frame-ready notifications and routes
//! them: depth and color frames into their pixel buffers, skeleton frames
//! through the skeleton pipeline. Display artifacts are published on watch
//! channels, tilt requests are handed to the tilt worker without waiting.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::manager::DisplayChannels;
use super::motor_control::{TiltError, TiltHandle};
use super::types::{FrameReady, FrameReceiver, ImageFrame, StreamKind};
use crate::constants::pipeline::FRAME_LOG_INTERVAL;
use crate::pipelines::coordinate_mapper::SurfaceSize;
use crate::pipelines::skeleton_frame::SkeletonPipeline;
use crate::pipelines::stream_buffer::{PixelBuffer, WriteOutcome};

/// Action returned by the dispatcher to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Counters kept by the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLoopStats {
    pub depth_frames: u64,
    pub color_frames: u64,
    pub skeleton_frames: u64,
    /// Notifications that carried no frame
    pub skipped_frames: u64,
    /// Frames refused by a pixel buffer
    pub rejected_frames: u64,
    /// Tilt commands the worker accepted
    pub tilt_requests: u64,
}

/// Per-device routing state, owned by the loop task
pub struct FrameDispatcher {
    depth: Option<PixelBuffer>,
    color: Option<PixelBuffer>,
    skeletons: SkeletonPipeline,
    tilt: TiltHandle,
    surface: watch::Receiver<SurfaceSize>,
    display: Arc<DisplayChannels>,
    stats: FrameLoopStats,
}

impl FrameDispatcher {
    pub fn new(
        depth: Option<PixelBuffer>,
        color: Option<PixelBuffer>,
        skeletons: SkeletonPipeline,
        tilt: TiltHandle,
        display: Arc<DisplayChannels>,
    ) -> Self {
        Self {
            depth,
            color,
            skeletons,
            tilt,
            surface: display.subscribe_surface(),
            display,
            stats: FrameLoopStats::default(),
        }
    }

    pub fn stats(&self) -> FrameLoopStats {
        self.stats
    }

    /// Route one notification
    ///
    /// `None` means the device dropped its subscriber.
    pub fn dispatch(&mut self, event: Option<FrameReady>) -> LoopAction {
        let Some(event) = event else {
            debug!("Frame notifications ended");
            return LoopAction::Stop;
        };

        match event {
            FrameReady::Depth(frame) => self.write_image(StreamKind::Depth, frame.as_ref()),
            FrameReady::Color(frame) => self.write_image(StreamKind::Color, frame.as_ref()),
            FrameReady::Skeleton(frame) => {
                // Surface size is re-read for every frame so resizes apply immediately
                let surface = *self.surface.borrow_and_update();
                match self.skeletons.process(frame.as_ref(), surface) {
                    Some(output) => {
                        self.stats.skeleton_frames += 1;
                        for command in &output.tilt_requests {
                            match self.tilt.request(*command) {
                                Ok(()) => self.stats.tilt_requests += 1,
                                Err(TiltError::ControllerStopped) => {
                                    debug!(?command, "Tilt controller gone, request ignored")
                                }
                                // Already logged by the handle
                                Err(_) => {}
                            }
                        }
                        if output.frame_number % FRAME_LOG_INTERVAL == 0 {
                            debug!(
                                frame = output.frame_number,
                                figures = output.figures.len(),
                                "Skeleton frame"
                            );
                        }
                        self.display.publish_skeletons(output);
                    }
                    None => self.stats.skipped_frames += 1,
                }
            }
        }
        LoopAction::Continue
    }

    fn write_image(&mut self, kind: StreamKind, frame: Option<&ImageFrame>) {
        let buffer = match kind {
            StreamKind::Depth => self.depth.as_mut(),
            StreamKind::Color => self.color.as_mut(),
            StreamKind::Skeleton => None,
        };
        let Some(buffer) = buffer else {
            debug!(stream = %kind, "No buffer for stream, frame ignored");
            return;
        };

        match buffer.write_frame(frame) {
            Ok(WriteOutcome::Written) => {
                let snapshot = buffer.snapshot();
                match kind {
                    StreamKind::Depth => self.stats.depth_frames += 1,
                    _ => self.stats.color_frames += 1,
                }
                self.display.publish_image(kind, snapshot);
            }
            Ok(WriteOutcome::Skipped) => self.stats.skipped_frames += 1,
            Err(e) => {
                warn!(stream = %kind, error = %e, "Dropping frame");
                self.stats.rejected_frames += 1;
            }
        }
    }
}

/// Controller for a dispatch loop running as a tokio task
///
/// Must be started inside a tokio runtime. Dropping the controller stops
/// the loop without waiting for it.
pub struct FrameLoop {
    task: Option<JoinHandle<FrameLoopStats>>,
    stop_signal: watch::Sender<bool>,
    name: String,
}

impl FrameLoop {
    /// Spawn the loop feeding `frames` into `dispatcher`
    pub fn start(name: &str, mut frames: FrameReceiver, mut dispatcher: FrameDispatcher) -> Self {
        let (stop_signal, mut stop_rx) = watch::channel(false);
        let name_clone = name.to_string();

        info!(name = %name, "Starting frame loop");

        let task = tokio::spawn(async move {
            debug!(name = %name_clone, "Frame loop task started");

            loop {
                let event = tokio::select! {
                    biased;
                    _ = stop_rx.wait_for(|stop| *stop) => {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }
                    event = frames.recv() => event,
                };

                match dispatcher.dispatch(event) {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }
            }

            let stats = dispatcher.stats();
            info!(name = %name_clone, ?stats, "Frame loop exiting");
            stats
        });

        Self {
            task: Some(task),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting frame loop stop");
        let _ = self.stop_signal.send(true);
    }

    /// Stop the loop and wait for the task to finish
    pub async fn stop(mut self) -> FrameLoopStats {
        self.request_stop();
        let Some(task) = self.task.take() else {
            return FrameLoopStats::default();
        };
        match task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(name = %self.name, error = %e, "Frame loop task panicked");
                FrameLoopStats::default()
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!(name = %self.name, "FrameLoop dropped, stopping loop");
            self.request_stop();
        }
    }
}
