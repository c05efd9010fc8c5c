// SPDX-License-Identifier: GPL-3.0-only

//! In-memory sensor
//!
//! [`VirtualSensor`] behaves like an attached device: streams must be
//! enabled and the device started before frames are delivered, status can be
//! changed at will, and elevation writes are recorded (or made to fail) so
//! callers can observe exactly what reached the motor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use super::motor_control::{TILT_MAX_DEGREES, TILT_MIN_DEGREES, TiltError, TiltResult};
use super::skeleton::{
    FrameEdges, JointId, Skeleton, SkeletonFrame, SkeletonPoint, SkeletonTrackingState,
};
use super::types::*;
use super::{SensorDevice, SensorProvider, StatusChanged, StatusReceiver};
use crate::constants::pipeline::FRAME_QUEUE_CAPACITY;

struct VirtualState {
    status: SensorStatus,
    streams: HashMap<StreamKind, Option<StreamDescriptor>>,
    running: bool,
    subscriber: Option<FrameSender>,
    elevation: i32,
    angle_writes: Vec<i32>,
    angle_failure: Option<TiltError>,
    frame_number: u64,
}

/// Software sensor for tests and demos
pub struct VirtualSensor {
    id: String,
    state: Mutex<VirtualState>,
}

impl VirtualSensor {
    pub fn new(id: impl Into<String>, status: SensorStatus) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(VirtualState {
                status,
                streams: HashMap::new(),
                running: false,
                subscriber: None,
                elevation: 0,
                angle_writes: Vec::new(),
                angle_failure: None,
                frame_number: 0,
            }),
        }
    }

    /// Connected sensor wrapped for sharing
    pub fn connected(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(id, SensorStatus::Connected))
    }

    fn state(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the reported status
    ///
    /// Leaving `Connected` stops the device and ends the subscription.
    pub fn set_status(&self, status: SensorStatus) {
        let mut state = self.state();
        state.status = status;
        if !status.can_stream() {
            state.running = false;
            state.subscriber = None;
        }
    }

    /// Make every following elevation write fail with `error`, or succeed again with `None`
    pub fn fail_angle_writes(&self, error: Option<TiltError>) {
        self.state().angle_failure = error;
    }

    /// Every angle successfully written, oldest first
    pub fn angle_writes(&self) -> Vec<i32> {
        self.state().angle_writes.clone()
    }

    pub fn has_subscriber(&self) -> bool {
        self.state().subscriber.is_some()
    }

    /// Deliver a notification
    ///
    /// Dropped (returns false) unless the device is running, the stream is
    /// enabled and someone is subscribed. Never blocks: if the subscriber
    /// lags behind, the notification is lost like a missed hardware frame.
    pub fn emit(&self, event: FrameReady) -> bool {
        let mut state = self.state();
        if !state.running || !state.streams.contains_key(&event.kind()) {
            return false;
        }
        state.frame_number += 1;
        let Some(sender) = state.subscriber.as_ref() else {
            return false;
        };
        match sender.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!(sensor = %self.id, error = %e, "Dropping frame notification");
                false
            }
        }
    }

    /// Emit a depth frame filled with `value`, sized for the enabled stream
    pub fn emit_depth(&self, value: u16) -> bool {
        let Some(descriptor) = self.stream_descriptor(StreamKind::Depth) else {
            return false;
        };
        let number = self.state().frame_number;
        let frame = ImageFrame::depth(
            descriptor.format,
            number,
            vec![value; descriptor.pixel_count()],
        );
        self.emit(FrameReady::Depth(Some(frame)))
    }

    /// Emit a color frame with every pixel set to `bgra`
    pub fn emit_color(&self, bgra: [u8; 4]) -> bool {
        let Some(descriptor) = self.stream_descriptor(StreamKind::Color) else {
            return false;
        };
        let number = self.state().frame_number;
        let bytes = bgra.repeat(descriptor.pixel_count());
        self.emit(FrameReady::Color(Some(ImageFrame::color(
            descriptor.format,
            number,
            bytes,
        ))))
    }

    /// Emit a skeleton frame with the given body entries
    pub fn emit_skeletons(&self, skeletons: Vec<Skeleton>) -> bool {
        let number = self.state().frame_number;
        self.emit(FrameReady::Skeleton(Some(SkeletonFrame::new(
            number, skeletons,
        ))))
    }
}

impl SensorDevice for VirtualSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> SensorStatus {
        self.state().status
    }

    fn enable_stream(&self, kind: StreamKind, format: Option<ImageFormat>) -> SensorResult<()> {
        let mut state = self.state();
        if !state.status.can_stream() {
            return Err(SensorError::NotConnected(state.status));
        }

        let descriptor = match kind {
            StreamKind::Skeleton => None,
            StreamKind::Depth | StreamKind::Color => {
                let format = format.unwrap_or(match kind {
                    StreamKind::Depth => ImageFormat::DepthResolution640x480Fps30,
                    _ => ImageFormat::RgbResolution640x480Fps30,
                });
                if format.stream_kind() != kind {
                    return Err(SensorError::FormatNotSupported(format));
                }
                Some(StreamDescriptor::from_format(format))
            }
        };

        debug!(sensor = %self.id, stream = %kind, ?descriptor, "Stream enabled");
        state.streams.insert(kind, descriptor);
        Ok(())
    }

    fn disable_stream(&self, kind: StreamKind) {
        self.state().streams.remove(&kind);
    }

    fn is_stream_enabled(&self, kind: StreamKind) -> bool {
        self.state().streams.contains_key(&kind)
    }

    fn stream_descriptor(&self, kind: StreamKind) -> Option<StreamDescriptor> {
        self.state().streams.get(&kind).copied().flatten()
    }

    fn start(&self) -> SensorResult<()> {
        let mut state = self.state();
        if !state.status.can_stream() {
            return Err(SensorError::NotConnected(state.status));
        }
        if state.running {
            return Err(SensorError::AlreadyRunning);
        }
        state.running = true;
        info!(sensor = %self.id, "Virtual sensor started");
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state();
        if state.running {
            state.running = false;
            info!(sensor = %self.id, "Virtual sensor stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    fn subscribe(&self) -> FrameReceiver {
        let (sender, receiver) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        self.state().subscriber = Some(sender);
        receiver
    }

    fn unsubscribe(&self) {
        self.state().subscriber = None;
    }

    fn elevation_angle(&self) -> TiltResult<i32> {
        let state = self.state();
        if state.status == SensorStatus::Disconnected {
            return Err(TiltError::Disconnected);
        }
        Ok(state.elevation)
    }

    fn set_elevation_angle(&self, degrees: i32) -> TiltResult<()> {
        let mut state = self.state();
        if state.status == SensorStatus::Disconnected {
            return Err(TiltError::Disconnected);
        }
        if let Some(error) = state.angle_failure.clone() {
            return Err(error);
        }
        if !(TILT_MIN_DEGREES..=TILT_MAX_DEGREES).contains(&degrees) {
            return Err(TiltError::OutOfRange(degrees));
        }
        state.elevation = degrees;
        state.angle_writes.push(degrees);
        Ok(())
    }
}

impl std::fmt::Debug for VirtualSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("VirtualSensor")
            .field("id", &self.id)
            .field("status", &state.status)
            .field("running", &state.running)
            .field("elevation", &state.elevation)
            .finish()
    }
}

/// Provider for virtual sensors
pub struct VirtualSensorHub {
    sensors: Mutex<Vec<Arc<VirtualSensor>>>,
    status_tx: broadcast::Sender<StatusChanged>,
}

impl VirtualSensorHub {
    pub fn new() -> Self {
        let (status_tx, _) = broadcast::channel(16);
        Self {
            sensors: Mutex::new(Vec::new()),
            status_tx,
        }
    }

    /// Attach a sensor and announce its current status
    pub fn attach(&self, sensor: Arc<VirtualSensor>) {
        let status = sensor.status();
        self.sensors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&sensor));
        self.notify(sensor, status);
    }

    /// Change a sensor's status and announce it
    pub fn set_status(&self, sensor: &Arc<VirtualSensor>, status: SensorStatus) {
        sensor.set_status(status);
        self.notify(Arc::clone(sensor), status);
    }

    fn notify(&self, sensor: Arc<VirtualSensor>, status: SensorStatus) {
        // No receivers is fine
        let _ = self.status_tx.send(StatusChanged { sensor, status });
    }
}

impl Default for VirtualSensorHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorProvider for VirtualSensorHub {
    fn sensors(&self) -> Vec<Arc<dyn SensorDevice>> {
        self.sensors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|sensor| Arc::clone(sensor) as Arc<dyn SensorDevice>)
            .collect()
    }

    fn subscribe_status(&self) -> StatusReceiver {
        self.status_tx.subscribe()
    }
}

/// A standing body centred at `x` meters, `z` meters from the sensor
pub fn standing_skeleton(tracking_id: u32, x: f32, z: f32, clipped_edges: FrameEdges) -> Skeleton {
    let mut skeleton = Skeleton {
        tracking_id,
        tracking_state: SkeletonTrackingState::Tracked,
        position: SkeletonPoint::new(x, 0.0, z),
        clipped_edges,
        ..Skeleton::default()
    };

    let layout = [
        (JointId::Head, 0.0, 0.65),
        (JointId::ShoulderCenter, 0.0, 0.45),
        (JointId::ShoulderLeft, -0.18, 0.40),
        (JointId::ShoulderRight, 0.18, 0.40),
        (JointId::ElbowLeft, -0.28, 0.15),
        (JointId::ElbowRight, 0.28, 0.15),
        (JointId::WristLeft, -0.32, -0.08),
        (JointId::WristRight, 0.32, -0.08),
        (JointId::HandLeft, -0.33, -0.15),
        (JointId::HandRight, 0.33, -0.15),
        (JointId::Spine, 0.0, 0.10),
        (JointId::HipCenter, 0.0, 0.0),
        (JointId::HipLeft, -0.10, -0.05),
        (JointId::HipRight, 0.10, -0.05),
        (JointId::KneeLeft, -0.11, -0.45),
        (JointId::KneeRight, 0.11, -0.45),
        (JointId::AnkleLeft, -0.12, -0.85),
        (JointId::AnkleRight, 0.12, -0.85),
        (JointId::FootLeft, -0.13, -0.92),
        (JointId::FootRight, 0.13, -0.92),
    ];
    for (joint, dx, y) in layout {
        skeleton
            .joints
            .set(joint, SkeletonPoint::new(x + dx, y, z));
    }
    skeleton
}
