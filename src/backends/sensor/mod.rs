// SPDX-License-Identifier: GPL-3.0-only

//! Sensor device abstraction
//!
//! A motion-sensing camera is treated as a black box that reports its
//! status, produces depth, color and skeleton streams, and owns a tilt motor.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    Display layer    │  ← pixel buffers, skeleton figures
//! └──────────▲──────────┘
//!            │ watch channels
//! ┌──────────┴──────────┐
//! │    SensorManager    │  ← bind/unbind, status changes
//! └───┬─────────────┬───┘
//!     │             │
//!     ▼             ▼
//! ┌─────────┐ ┌─────────────┐
//! │ Frame   │ │    Tilt     │  ← single-owner worker
//! │ loop    │─▶ controller  │
//! └────▲────┘ └──────┬──────┘
//!      │ frame-ready │ elevation writes
//! ┌────┴─────────────▼──┐
//! │ SensorDevice trait  │
//! └─────────────────────┘
//! ```

pub mod frame_loop;
pub mod kinect_intrinsics;
pub mod manager;
pub mod motor_control;
pub mod skeleton;
pub mod types;
pub mod virtual_sensor;

pub use frame_loop::FrameLoopStats;
pub use kinect_intrinsics::DepthIntrinsics;
pub use manager::{DisplayChannels, DisplayHandle, SensorManager, Unbound};
pub use motor_control::{
    ShutdownMode, TiltCommand, TiltController, TiltError, TiltHandle, TiltOutcome, TiltResult,
    TiltStatus,
};
pub use skeleton::*;
pub use types::*;
pub use virtual_sensor::{VirtualSensor, VirtualSensorHub};

use std::sync::Arc;

/// A single physical sensor
///
/// Implementations are driven from the device's own threads; every method
/// must be callable concurrently.
pub trait SensorDevice: Send + Sync {
    /// Stable identifier (e.g. USB path or serial)
    fn id(&self) -> &str;

    fn status(&self) -> SensorStatus;

    // ===== Streams =====

    /// Enable a stream
    ///
    /// Image streams take the format to produce, `None` selects the device
    /// default. The skeleton stream ignores `format`.
    fn enable_stream(&self, kind: StreamKind, format: Option<ImageFormat>) -> SensorResult<()>;

    fn disable_stream(&self, kind: StreamKind);

    fn is_stream_enabled(&self, kind: StreamKind) -> bool;

    /// Geometry of an enabled image stream
    fn stream_descriptor(&self, kind: StreamKind) -> Option<StreamDescriptor>;

    /// Number of body slots in a skeleton frame
    fn skeleton_array_length(&self) -> usize {
        MAX_SKELETONS
    }

    // ===== Lifecycle =====

    fn start(&self) -> SensorResult<()>;

    fn stop(&self);

    fn is_running(&self) -> bool;

    // ===== Notifications =====

    /// Subscribe to frame-ready notifications, replacing any previous subscriber
    fn subscribe(&self) -> FrameReceiver;

    /// Drop the current subscriber; its receiver ends
    fn unsubscribe(&self);

    // ===== Tilt motor =====

    /// Current elevation angle in degrees
    fn elevation_angle(&self) -> TiltResult<i32>;

    /// Move the sensor to `degrees`
    fn set_elevation_angle(&self, degrees: i32) -> TiltResult<()>;

    /// Depth camera intrinsics for the enabled depth stream
    fn depth_intrinsics(&self) -> Option<DepthIntrinsics> {
        self.stream_descriptor(StreamKind::Depth)
            .map(|descriptor| DepthIntrinsics::for_descriptor(&descriptor))
    }
}

/// Status change notification
#[derive(Clone)]
pub struct StatusChanged {
    pub sensor: Arc<dyn SensorDevice>,
    pub status: SensorStatus,
}

impl std::fmt::Debug for StatusChanged {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusChanged")
            .field("sensor", &self.sensor.id())
            .field("status", &self.status)
            .finish()
    }
}

/// Receiver for status change notifications
pub type StatusReceiver = tokio::sync::broadcast::Receiver<StatusChanged>;

/// Source of sensors: enumeration plus status change notifications
pub trait SensorProvider: Send + Sync {
    /// Sensors currently known, in enumeration order
    fn sensors(&self) -> Vec<Arc<dyn SensorDevice>>;

    fn subscribe_status(&self) -> StatusReceiver;
}
