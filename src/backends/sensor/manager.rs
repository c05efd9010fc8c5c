// SPDX-License-Identifier: GPL-3.0-only

//! Sensor binding lifecycle
//!
//! The manager provides:
//! - Explicit bind/unbind of a single active sensor
//! - Reaction to provider status changes
//! - Display channels that outlive any one binding

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::frame_loop::{FrameDispatcher, FrameLoop, FrameLoopStats};
use super::motor_control::{ShutdownMode, TiltController, TiltHandle, TiltStatus};
use super::types::*;
use super::{DepthIntrinsics, SensorDevice, SensorProvider, StatusChanged};
use crate::config::Config;
use crate::pipelines::coordinate_mapper::{CoordinateMapper, SurfaceSize};
use crate::pipelines::skeleton_frame::{SkeletonOutput, SkeletonPipeline};
use crate::pipelines::stream_buffer::{PixelBuffer, PixelSnapshot};

/// Publishing side of the display artifacts
///
/// Shared between the manager and the active frame loop. Values are
/// replaced, never queued: the display always sees the latest frame.
#[derive(Debug)]
pub struct DisplayChannels {
    depth: watch::Sender<Option<PixelSnapshot>>,
    color: watch::Sender<Option<PixelSnapshot>>,
    skeletons: watch::Sender<SkeletonOutput>,
    surface: watch::Sender<SurfaceSize>,
}

impl DisplayChannels {
    pub fn new(surface: SurfaceSize) -> Self {
        Self {
            depth: watch::channel(None).0,
            color: watch::channel(None).0,
            skeletons: watch::channel(SkeletonOutput::default()).0,
            surface: watch::channel(surface).0,
        }
    }

    pub fn handle(self: &Arc<Self>) -> DisplayHandle {
        DisplayHandle {
            channels: Arc::clone(self),
            depth: self.depth.subscribe(),
            color: self.color.subscribe(),
            skeletons: self.skeletons.subscribe(),
        }
    }

    pub fn subscribe_surface(&self) -> watch::Receiver<SurfaceSize> {
        self.surface.subscribe()
    }

    pub fn publish_image(&self, kind: StreamKind, snapshot: PixelSnapshot) {
        match kind {
            StreamKind::Depth => {
                self.depth.send_replace(Some(snapshot));
            }
            StreamKind::Color => {
                self.color.send_replace(Some(snapshot));
            }
            StreamKind::Skeleton => {}
        }
    }

    pub fn publish_skeletons(&self, output: SkeletonOutput) {
        self.skeletons.send_replace(output);
    }

    /// Drop everything published by a binding
    fn clear(&self) {
        self.depth.send_replace(None);
        self.color.send_replace(None);
        self.skeletons.send_replace(SkeletonOutput::default());
    }
}

/// Display-layer view: latest artifacts plus the surface size input
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    channels: Arc<DisplayChannels>,
    depth: watch::Receiver<Option<PixelSnapshot>>,
    color: watch::Receiver<Option<PixelSnapshot>>,
    skeletons: watch::Receiver<SkeletonOutput>,
}

impl DisplayHandle {
    /// Latest depth buffer (16-bit grayscale)
    pub fn depth(&self) -> Option<PixelSnapshot> {
        self.depth.borrow().clone()
    }

    /// Latest color buffer (32-bit BGR)
    pub fn color(&self) -> Option<PixelSnapshot> {
        self.color.borrow().clone()
    }

    /// Figures and tilt requests of the latest skeleton frame
    pub fn skeletons(&self) -> SkeletonOutput {
        self.skeletons.borrow().clone()
    }

    /// Wait for the next skeleton frame
    pub async fn skeletons_changed(&mut self) -> Option<SkeletonOutput> {
        self.skeletons.changed().await.ok()?;
        Some(self.skeletons.borrow_and_update().clone())
    }

    /// Report a new display surface size, applied from the next skeleton frame
    pub fn set_surface_size(&self, surface: SurfaceSize) {
        debug!(width = surface.width, height = surface.height, "Display surface resized");
        self.channels.surface.send_replace(surface);
    }

    pub fn surface_size(&self) -> SurfaceSize {
        *self.channels.surface.borrow()
    }
}

/// Everything owned by one binding
struct ActiveBinding {
    device: Arc<dyn SensorDevice>,
    tilt: TiltController,
    frame_loop: FrameLoop,
}

/// Summary of a finished binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unbound {
    pub device_id: String,
    pub tilt: TiltStatus,
    pub frames: FrameLoopStats,
}

/// Sensor manager
///
/// Owns at most one active sensor. Binding enables the depth, color and
/// skeleton streams, sizes the pixel buffers, starts the tilt worker and the
/// frame loop, then starts the device. Unbinding undoes all of it.
pub struct SensorManager {
    config: Config,
    display: Arc<DisplayChannels>,
    active: Option<ActiveBinding>,
}

impl SensorManager {
    pub fn new(config: Config) -> Self {
        let (width, height) = config.depth_format.dimensions();
        Self {
            config,
            display: Arc::new(DisplayChannels::new(SurfaceSize::new(
                width as f32,
                height as f32,
            ))),
            active: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Display-layer view, valid across rebinds
    pub fn display(&self) -> DisplayHandle {
        self.display.handle()
    }

    pub fn is_bound(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_device(&self) -> Option<Arc<dyn SensorDevice>> {
        self.active.as_ref().map(|a| Arc::clone(&a.device))
    }

    /// Tilt queue of the active sensor
    pub fn tilt_handle(&self) -> Option<TiltHandle> {
        self.active.as_ref().map(|a| a.tilt.handle())
    }

    /// Tilt worker progress of the active sensor
    pub fn tilt_status(&self) -> Option<watch::Receiver<TiltStatus>> {
        self.active.as_ref().map(|a| a.tilt.status())
    }

    /// Make `device` the active sensor
    ///
    /// Any previous sensor is unbound first. On failure nothing stays
    /// enabled on `device` and the manager is left unbound.
    pub async fn bind_device(&mut self, device: Arc<dyn SensorDevice>) -> SensorResult<()> {
        self.unbind_device().await;

        let status = device.status();
        if !status.can_stream() {
            warn!(device = %device.id(), %status, "Cannot bind sensor");
            return Err(SensorError::NotConnected(status));
        }

        info!(device = %device.id(), "Binding sensor");

        if let Err(e) = self.enable_streams(device.as_ref()) {
            warn!(device = %device.id(), error = %e, "Failed to enable streams");
            release_streams(device.as_ref());
            return Err(e);
        }

        let Some(depth) = device.stream_descriptor(StreamKind::Depth) else {
            release_streams(device.as_ref());
            return Err(SensorError::StreamNotEnabled(StreamKind::Depth));
        };
        let Some(color) = device.stream_descriptor(StreamKind::Color) else {
            release_streams(device.as_ref());
            return Err(SensorError::StreamNotEnabled(StreamKind::Color));
        };
        let intrinsics = device
            .depth_intrinsics()
            .unwrap_or_else(|| DepthIntrinsics::for_descriptor(&depth));

        let tilt = TiltController::spawn(Arc::clone(&device), &self.config.tilt);
        let dispatcher = FrameDispatcher::new(
            Some(PixelBuffer::new(StreamKind::Depth, depth)),
            Some(PixelBuffer::new(StreamKind::Color, color)),
            SkeletonPipeline::new(
                CoordinateMapper::new(intrinsics),
                &self.config,
                device.skeleton_array_length(),
            ),
            tilt.handle(),
            Arc::clone(&self.display),
        );
        let frames = device.subscribe();
        let frame_loop = FrameLoop::start(device.id(), frames, dispatcher);

        match device.start() {
            Ok(()) => {}
            Err(SensorError::AlreadyRunning) => {
                debug!(device = %device.id(), "Sensor already running");
            }
            Err(e) => {
                warn!(device = %device.id(), error = %e, "Failed to start sensor");
                device.unsubscribe();
                frame_loop.stop().await;
                tilt.shutdown(ShutdownMode::Cancel).await;
                release_streams(device.as_ref());
                return Err(e);
            }
        }

        info!(device = %device.id(), %depth, %color, "Sensor bound");
        self.active = Some(ActiveBinding {
            device,
            tilt,
            frame_loop,
        });
        Ok(())
    }

    /// Release the active sensor, if any
    ///
    /// Queued tilt commands are dropped and a running cool-down is cut short.
    pub async fn unbind_device(&mut self) -> Option<Unbound> {
        let ActiveBinding {
            device,
            tilt,
            frame_loop,
        } = self.active.take()?;

        info!(device = %device.id(), "Unbinding sensor");
        device.stop();
        device.unsubscribe();
        let frames = frame_loop.stop().await;
        let tilt = tilt.shutdown(ShutdownMode::Cancel).await;
        release_streams(device.as_ref());
        self.display.clear();

        Some(Unbound {
            device_id: device.id().to_string(),
            tilt,
            frames,
        })
    }

    /// Bind the first connected sensor of `provider`
    ///
    /// Returns whether a sensor was bound.
    pub async fn bind_first_connected(&mut self, provider: &dyn SensorProvider) -> bool {
        for sensor in provider.sensors() {
            if sensor.status() != SensorStatus::Connected {
                continue;
            }
            match self.bind_device(Arc::clone(&sensor)).await {
                Ok(()) => return true,
                Err(e) => warn!(device = %sensor.id(), error = %e, "Skipping sensor"),
            }
        }
        debug!("No connected sensor found");
        false
    }

    /// Follow a provider status change
    ///
    /// - `Connected`: bind the sensor (no-op if it is already active)
    /// - `Disconnected`: unbind it if it is the active sensor
    /// - anything else: unbind the active sensor and stay unbound until a
    ///   sensor reports `Connected`
    pub async fn handle_status_change(&mut self, event: StatusChanged) -> SensorResult<()> {
        let StatusChanged { sensor, status } = event;
        debug!(device = %sensor.id(), %status, "Sensor status changed");

        let is_active = self
            .active
            .as_ref()
            .is_some_and(|a| a.device.id() == sensor.id());

        match status {
            SensorStatus::Connected if is_active => Ok(()),
            SensorStatus::Connected => self.bind_device(sensor).await,
            SensorStatus::Disconnected => {
                if is_active {
                    self.unbind_device().await;
                }
                Ok(())
            }
            _ => {
                self.unbind_device().await;
                Ok(())
            }
        }
    }

    fn enable_streams(&self, device: &dyn SensorDevice) -> SensorResult<()> {
        device.enable_stream(StreamKind::Skeleton, None)?;
        device.enable_stream(StreamKind::Color, Some(self.config.color_format))?;
        device.enable_stream(StreamKind::Depth, Some(self.config.depth_format))?;
        Ok(())
    }
}

impl std::fmt::Debug for SensorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorManager")
            .field("active", &self.active.as_ref().map(|a| a.device.id().to_string()))
            .field("surface", &*self.display.surface.borrow())
            .finish()
    }
}

fn release_streams(device: &dyn SensorDevice) {
    for kind in [StreamKind::Skeleton, StreamKind::Depth, StreamKind::Color] {
        if device.is_stream_enabled(kind) {
            device.disable_stream(kind);
        }
    }
}
