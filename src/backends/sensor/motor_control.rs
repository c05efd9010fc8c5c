// SPDX-License-Identifier: GPL-3.0-only

//! Tilt motor control
//!
//! The sensor's elevation angle is owned by a single worker task. Frame
//! handlers never touch the angle directly: they push [`TiltCommand`]s into
//! the worker's bounded queue through a cloneable [`TiltHandle`] and return
//! immediately, so motor latency and the post-move cool-down never hold up
//! frame delivery.
//!
//! Adjustments travel through a bounded queue, and at most one is
//! outstanding at a time: while an adjustment is queued or cooling down,
//! further adjustments are refused with [`TiltError::Busy`]. Resets bypass
//! the queue and are never refused. A reset cuts a running cool-down short
//! and discards adjustments queued before it, so the most recent request
//! decides where the motor ends up.
//!
//! Overflow policy: an adjustment whose target falls outside the configured
//! limits returns the sensor to 0 degrees instead of pinning it to the limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SensorDevice;
use super::skeleton::FrameEdges;
use crate::config::TiltSettings;

/// Tilt angle limits (in degrees)
pub const TILT_MIN_DEGREES: i32 = -27;
pub const TILT_MAX_DEGREES: i32 = 27;

/// Result type for elevation-angle operations
pub type TiltResult<T> = Result<T, TiltError>;

/// Why an elevation change did not happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TiltError {
    /// Motor is still moving or the device rejected the request
    Busy,
    /// Device is gone
    Disconnected,
    /// Device has no tilt motor
    Unsupported,
    /// Angle outside the motor's range
    OutOfRange(i32),
    /// Command queue is full, request dropped
    QueueFull,
    /// Controller has shut down
    ControllerStopped,
    /// Device-specific failure
    Device(String),
}

impl std::fmt::Display for TiltError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TiltError::Busy => write!(f, "Tilt motor busy"),
            TiltError::Disconnected => write!(f, "Sensor disconnected"),
            TiltError::Unsupported => write!(f, "Tilt not supported by this sensor"),
            TiltError::OutOfRange(degrees) => write!(f, "Tilt angle {}° out of range", degrees),
            TiltError::QueueFull => write!(f, "Tilt command queue full"),
            TiltError::ControllerStopped => write!(f, "Tilt controller stopped"),
            TiltError::Device(msg) => write!(f, "Tilt failed: {}", msg),
        }
    }
}

impl std::error::Error for TiltError {}

/// A request to move the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltCommand {
    /// Move by a signed number of degrees
    Adjust(i32),
    /// Return to 0 degrees
    Reset,
}

/// Corrections requested by a body's clipped edges
///
/// Bottom-only clipping tilts down one step; top clipping tilts up one step
/// whether or not the bottom is clipped too. Both may apply to the same
/// body and are returned in that order.
pub fn edge_corrections(edges: FrameEdges, step: i32) -> Vec<TiltCommand> {
    let mut commands = Vec::with_capacity(2);
    if edges.contains(FrameEdges::BOTTOM) && !edges.contains(FrameEdges::TOP) {
        commands.push(TiltCommand::Adjust(-step));
    }
    if edges.contains(FrameEdges::TOP) {
        commands.push(TiltCommand::Adjust(step));
    }
    commands
}

/// What the worker did with one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TiltOutcome {
    /// Angle written, cool-down observed
    Applied { angle: i32 },
    /// Target was out of range, sensor sent back to 0
    Saturated { requested: i32 },
    /// Explicit reset to 0
    Reset,
    /// Device refused the write; the tracked angle is kept
    Failed { angle: i32, error: TiltError },
}

/// Snapshot published after every processed command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TiltStatus {
    pub angle: i32,
    pub commands_processed: u64,
    pub last_outcome: Option<TiltOutcome>,
}

/// Angle bookkeeping, independent of any device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiltState {
    angle: i32,
    min: i32,
    max: i32,
}

/// Device write planned by [`TiltState::plan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiltStep {
    /// Angle to write to the device
    pub angle: i32,
    /// Hold the worker for the cool-down after a successful write
    pub cooldown: bool,
    /// Target overflowed and was replaced by 0
    pub saturated: bool,
}

impl TiltState {
    pub fn new(min: i32, max: i32) -> Self {
        Self { angle: 0, min, max }
    }

    pub fn angle(&self) -> i32 {
        self.angle
    }

    /// Update the tracked angle for `command` and return the write to make
    pub fn plan(&mut self, command: TiltCommand) -> TiltStep {
        match command {
            TiltCommand::Reset => {
                self.angle = 0;
                TiltStep {
                    angle: 0,
                    cooldown: false,
                    saturated: false,
                }
            }
            TiltCommand::Adjust(delta) => {
                let candidate = self.angle.saturating_add(delta);
                if candidate > self.max || candidate < self.min {
                    self.angle = 0;
                    TiltStep {
                        angle: 0,
                        cooldown: false,
                        saturated: true,
                    }
                } else {
                    self.angle = candidate;
                    TiltStep {
                        angle: candidate,
                        cooldown: true,
                        saturated: false,
                    }
                }
            }
        }
    }
}

enum WorkerMessage {
    /// `generation` is the reset count seen when the adjustment was queued
    Adjust { delta: i32, generation: u64 },
    Drain,
}

/// State shared between handles and the worker
struct Shared {
    requested: AtomicU64,
    /// Set while an adjustment is queued or cooling down
    adjustment_pending: AtomicBool,
    /// Incremented on every reset request
    resets: watch::Sender<u64>,
}

/// How [`TiltController::shutdown`] treats queued work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Finish every queued command, then stop
    Drain,
    /// Abort the current cool-down and drop queued commands
    Cancel,
}

/// Cloneable, non-blocking entry point into the tilt worker
#[derive(Clone)]
pub struct TiltHandle {
    sender: mpsc::Sender<WorkerMessage>,
    shared: Arc<Shared>,
}

impl TiltHandle {
    /// Hand a command to the worker without waiting
    pub fn request(&self, command: TiltCommand) -> TiltResult<()> {
        match command {
            TiltCommand::Adjust(delta) => self.adjust(delta),
            TiltCommand::Reset => self.reset(),
        }
    }

    /// Queue an adjustment unless one is already in flight
    pub fn adjust(&self, delta: i32) -> TiltResult<()> {
        if self.sender.is_closed() {
            return Err(TiltError::ControllerStopped);
        }
        if self
            .shared
            .adjustment_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(delta, "Tilt adjustment in flight, dropping request");
            return Err(TiltError::Busy);
        }

        let generation = *self.shared.resets.borrow();
        match self.sender.try_send(WorkerMessage::Adjust { delta, generation }) {
            Ok(()) => {
                self.shared.requested.fetch_add(1, Ordering::Relaxed);
                debug!(delta, "Tilt adjustment queued");
                Ok(())
            }
            Err(e) => {
                self.shared.adjustment_pending.store(false, Ordering::Release);
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!(delta, "Tilt command queue full, dropping request");
                        Err(TiltError::QueueFull)
                    }
                    mpsc::error::TrySendError::Closed(_) => Err(TiltError::ControllerStopped),
                }
            }
        }
    }

    /// Ask for a return to level, superseding pending adjustments
    pub fn reset(&self) -> TiltResult<()> {
        if self.sender.is_closed() {
            return Err(TiltError::ControllerStopped);
        }
        self.shared.resets.send_modify(|generation| *generation += 1);
        self.shared.requested.fetch_add(1, Ordering::Relaxed);
        debug!("Tilt reset requested");
        Ok(())
    }

    /// Number of requests accepted so far
    pub fn requested_count(&self) -> u64 {
        self.shared.requested.load(Ordering::Relaxed)
    }

    /// Whether an adjustment is queued or cooling down
    pub fn adjustment_pending(&self) -> bool {
        self.shared.adjustment_pending.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for TiltHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiltHandle")
            .field("requested", &self.requested_count())
            .field("adjustment_pending", &self.adjustment_pending())
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Owner of the tilt worker task
///
/// Must be created inside a tokio runtime. Dropping the controller cancels
/// the worker the same way as [`ShutdownMode::Cancel`].
pub struct TiltController {
    handle: TiltHandle,
    cancel: watch::Sender<bool>,
    status: watch::Receiver<TiltStatus>,
    worker: JoinHandle<()>,
}

impl TiltController {
    /// Spawn a worker driving `device`'s tilt motor
    pub fn spawn(device: Arc<dyn SensorDevice>, settings: &TiltSettings) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let (cancel, cancel_rx) = watch::channel(false);
        let (status_tx, status) = watch::channel(TiltStatus::default());
        let (resets, resets_rx) = watch::channel(0);
        let shared = Arc::new(Shared {
            requested: AtomicU64::new(0),
            adjustment_pending: AtomicBool::new(false),
            resets,
        });

        info!(
            device = %device.id(),
            min = settings.min_degrees,
            max = settings.max_degrees,
            cooldown_ms = settings.cooldown_ms,
            "Starting tilt controller"
        );

        let worker = tokio::spawn(run_worker(
            device,
            TiltState::new(settings.min_degrees, settings.max_degrees),
            settings.cooldown(),
            Arc::clone(&shared),
            WorkerChannels {
                commands: receiver,
                resets: resets_rx,
                cancel: cancel_rx,
                status: status_tx,
            },
        ));

        Self {
            handle: TiltHandle { sender, shared },
            cancel,
            status,
            worker,
        }
    }

    pub fn handle(&self) -> TiltHandle {
        self.handle.clone()
    }

    /// Watch the worker's progress
    pub fn status(&self) -> watch::Receiver<TiltStatus> {
        self.status.clone()
    }

    /// Angle as last recorded by the worker
    pub fn angle(&self) -> i32 {
        self.status.borrow().angle
    }

    /// Stop the worker and wait for it to exit
    pub async fn shutdown(self, mode: ShutdownMode) -> TiltStatus {
        match mode {
            ShutdownMode::Drain => {
                // Queued after every command already accepted
                if self.handle.sender.send(WorkerMessage::Drain).await.is_err() {
                    debug!("Tilt worker already gone");
                }
            }
            ShutdownMode::Cancel => {
                let _ = self.cancel.send(true);
            }
        }

        if let Err(e) = self.worker.await {
            warn!(error = %e, "Tilt worker panicked");
        }
        let status = self.status.borrow().clone();
        info!(angle = status.angle, processed = status.commands_processed, ?mode, "Tilt controller stopped");
        status
    }
}

impl std::fmt::Debug for TiltController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiltController")
            .field("status", &*self.status.borrow())
            .field("handle", &self.handle)
            .finish()
    }
}

/// Resolves once cancellation is requested or the controller is dropped
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

struct WorkerChannels {
    commands: mpsc::Receiver<WorkerMessage>,
    resets: watch::Receiver<u64>,
    cancel: watch::Receiver<bool>,
    status: watch::Sender<TiltStatus>,
}

/// Write one command to the device and publish the outcome
///
/// Returns whether a cool-down should follow.
fn apply(
    device: &dyn SensorDevice,
    state: &mut TiltState,
    command: TiltCommand,
    status: &watch::Sender<TiltStatus>,
) -> bool {
    let step = state.plan(command);
    let result = device.set_elevation_angle(step.angle);

    let outcome = match (&result, command) {
        (Err(error), _) => {
            warn!(degrees = step.angle, error = %error, "Failed to set sensor tilt");
            TiltOutcome::Failed {
                angle: step.angle,
                error: error.clone(),
            }
        }
        (Ok(()), TiltCommand::Reset) => TiltOutcome::Reset,
        (Ok(()), TiltCommand::Adjust(delta)) if step.saturated => {
            info!(delta, "Tilt target out of range, returning to level");
            TiltOutcome::Saturated { requested: delta }
        }
        (Ok(()), TiltCommand::Adjust(_)) => TiltOutcome::Applied { angle: step.angle },
    };

    status.send_modify(|s| {
        s.angle = state.angle();
        s.commands_processed += 1;
        s.last_outcome = Some(outcome);
    });

    step.cooldown && result.is_ok()
}

async fn run_worker(
    device: Arc<dyn SensorDevice>,
    mut state: TiltState,
    cooldown: Duration,
    shared: Arc<Shared>,
    channels: WorkerChannels,
) {
    let WorkerChannels {
        mut commands,
        mut resets,
        mut cancel,
        status,
    } = channels;
    let mut reset_generation = 0;

    debug!(device = %device.id(), "Tilt worker started");

    loop {
        let message = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                debug!("Tilt worker cancelled");
                break;
            }
            Ok(()) = resets.changed() => {
                reset_generation = *resets.borrow_and_update();
                apply(&*device, &mut state, TiltCommand::Reset, &status);
                continue;
            }
            message = commands.recv() => message,
        };

        let (delta, generation) = match message {
            Some(WorkerMessage::Adjust { delta, generation }) => (delta, generation),
            Some(WorkerMessage::Drain) | None => break,
        };

        if generation < reset_generation {
            debug!(delta, "Tilt adjustment superseded by reset");
            shared.adjustment_pending.store(false, Ordering::Release);
            continue;
        }

        if apply(&*device, &mut state, TiltCommand::Adjust(delta), &status) {
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    debug!("Tilt worker cancelled during cool-down");
                    break;
                }
                Ok(()) = resets.changed() => {
                    debug!("Tilt cool-down cut short by reset");
                    reset_generation = *resets.borrow_and_update();
                    shared.adjustment_pending.store(false, Ordering::Release);
                    apply(&*device, &mut state, TiltCommand::Reset, &status);
                }
                _ = tokio::time::sleep(cooldown) => {}
            }
        }
        shared.adjustment_pending.store(false, Ordering::Release);
    }

    debug!(device = %device.id(), angle = state.angle(), "Tilt worker exiting");
}
