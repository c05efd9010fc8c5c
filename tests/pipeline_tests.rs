// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the sensor pipeline
//!
//! A virtual sensor stands in for hardware. Tilt timing tests run on a
//! paused clock so the one second cool-down costs nothing.

use std::sync::Arc;
use std::time::Duration;

use skeleton_viewer::Config;
use skeleton_viewer::backends::sensor::virtual_sensor::standing_skeleton;
use skeleton_viewer::backends::sensor::{
    DepthIntrinsics, FrameEdges, FrameReady, ImageFormat, ImageFrame, SensorDevice,
    SensorManager, SensorProvider, SensorStatus, ShutdownMode, StreamKind, TiltCommand,
    TiltController, TiltError, TiltHandle, TiltOutcome, VirtualSensor, VirtualSensorHub,
};
use skeleton_viewer::pipelines::{BodySegment, CoordinateMapper, SkeletonOutput, SurfaceSize};
use tokio::time::{Instant, sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

async fn bound_manager(sensor: &Arc<VirtualSensor>) -> SensorManager {
    let hub = VirtualSensorHub::new();
    hub.attach(Arc::clone(sensor));
    let mut manager = SensorManager::new(Config::default());
    assert!(manager.bind_first_connected(&hub).await);
    manager
}

async fn wait_until_idle(handle: &TiltHandle) {
    while handle.adjustment_pending() {
        sleep(Duration::from_millis(10)).await;
    }
}

async fn next_skeletons(
    display: &mut skeleton_viewer::backends::sensor::DisplayHandle,
) -> SkeletonOutput {
    timeout(WAIT, display.skeletons_changed())
        .await
        .expect("skeleton frame within timeout")
        .expect("display channel open")
}

#[tokio::test]
async fn test_single_tracked_skeleton_end_to_end() {
    let sensor = VirtualSensor::connected("virtual-0");
    let mut manager = bound_manager(&sensor).await;

    let depth = sensor.stream_descriptor(StreamKind::Depth).unwrap();
    let color = sensor.stream_descriptor(StreamKind::Color).unwrap();
    assert_eq!((depth.width, depth.height, depth.bytes_per_pixel), (640, 480, 2));
    assert_eq!((color.width, color.height, color.bytes_per_pixel), (640, 480, 4));

    let mut display = manager.display();
    assert!(sensor.emit_depth(1200));
    assert!(sensor.emit_color([1, 2, 3, 255]));
    assert!(sensor.emit_skeletons(vec![standing_skeleton(
        7,
        0.0,
        2.5,
        FrameEdges::empty()
    )]));

    let output = next_skeletons(&mut display).await;
    assert_eq!(output.figures.len(), 6);
    assert!(output.tilt_requests.is_empty());
    let segments: Vec<BodySegment> = output.figures.iter().map(|f| f.segment).collect();
    assert_eq!(segments, BodySegment::ALL.to_vec());
    assert!(output.figures.iter().all(|f| f.stroke_width == 8.0));

    // Image frames were queued before the skeleton frame
    let depth_snapshot = display.depth().unwrap();
    assert_eq!(depth_snapshot.data.len(), 640 * 480 * 2);
    assert_eq!(&depth_snapshot.data[..2], &1200u16.to_ne_bytes());
    let color_snapshot = display.color().unwrap();
    assert_eq!(color_snapshot.stride, 640 * 4);
    assert_eq!(&color_snapshot.data[..4], &[1, 2, 3, 255]);

    assert_eq!(manager.tilt_handle().unwrap().requested_count(), 0);

    let unbound = manager.unbind_device().await.unwrap();
    assert_eq!(unbound.tilt.commands_processed, 0);
    assert!(sensor.angle_writes().is_empty());
}

#[tokio::test]
async fn test_empty_frame_resets_tilt() {
    let sensor = VirtualSensor::connected("virtual-0");
    let mut manager = bound_manager(&sensor).await;
    let mut display = manager.display();
    let mut tilt = manager.tilt_status().unwrap();

    assert!(sensor.emit_skeletons(Vec::new()));
    let output = next_skeletons(&mut display).await;
    assert!(output.figures.is_empty());
    assert_eq!(output.tilt_requests, vec![TiltCommand::Reset]);

    timeout(WAIT, tilt.wait_for(|s| s.commands_processed == 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tilt.borrow().last_outcome, Some(TiltOutcome::Reset));
    assert_eq!(sensor.angle_writes(), vec![0]);
    manager.unbind_device().await;
}

#[tokio::test]
async fn test_surface_resize_applies_to_next_frame() {
    let sensor = VirtualSensor::connected("virtual-0");
    let mut manager = bound_manager(&sensor).await;
    let mut display = manager.display();
    let skeleton = standing_skeleton(1, 0.2, 2.0, FrameEdges::empty());
    let mapper = CoordinateMapper::new(DepthIntrinsics::kinect(640, 480));

    sensor.emit_skeletons(vec![skeleton.clone()]);
    let native = next_skeletons(&mut display).await;

    display.set_surface_size(SurfaceSize::new(1280.0, 480.0));
    sensor.emit_skeletons(vec![skeleton.clone()]);
    let wide = next_skeletons(&mut display).await;

    for (a, b) in native.figures[0].points.iter().zip(&wide.figures[0].points) {
        assert!((b.x - a.x * 2.0).abs() < 1e-3);
        assert!((b.y - a.y).abs() < 1e-3);
    }

    let head = mapper.joint_point(
        &skeleton.joints[skeleton_viewer::backends::sensor::JointId::Head],
        SurfaceSize::new(1280.0, 480.0),
    );
    assert_eq!(wide.figures[0].points[0], head);
    manager.unbind_device().await;
}

#[tokio::test]
async fn test_mismatched_frame_leaves_buffer_untouched() {
    let sensor = VirtualSensor::connected("virtual-0");
    let mut manager = bound_manager(&sensor).await;
    let mut display = manager.display();

    // 320x240 payload for a 640x480 stream
    let wrong = ImageFrame::depth(
        ImageFormat::DepthResolution320x240Fps30,
        1,
        vec![5; 320 * 240],
    );
    assert!(sensor.emit(FrameReady::Depth(Some(wrong))));
    assert!(sensor.emit(FrameReady::Depth(None)));
    sensor.emit_skeletons(Vec::new());
    next_skeletons(&mut display).await;
    assert!(display.depth().is_none());

    sensor.emit_depth(9);
    sensor.emit_skeletons(Vec::new());
    next_skeletons(&mut display).await;
    assert!(display.depth().unwrap().data.chunks(2).all(|px| px == 9u16.to_ne_bytes()));

    let unbound = manager.unbind_device().await.unwrap();
    assert_eq!(unbound.frames.rejected_frames, 1);
    assert_eq!(unbound.frames.depth_frames, 1);
}

#[tokio::test]
async fn test_disconnect_unbinds_and_cancels_tilt() {
    let hub = VirtualSensorHub::new();
    let mut events = hub.subscribe_status();
    let sensor = VirtualSensor::connected("virtual-0");
    let mut manager = SensorManager::new(Config::default());

    hub.attach(Arc::clone(&sensor));
    manager.handle_status_change(events.recv().await.unwrap()).await.unwrap();
    let display = manager.display();
    let mut tilt = manager.tilt_status().unwrap();

    for _ in 0..3 {
        sensor.emit_skeletons(vec![standing_skeleton(1, 0.0, 2.5, FrameEdges::TOP)]);
    }
    timeout(WAIT, tilt.wait_for(|s| s.commands_processed >= 1))
        .await
        .unwrap()
        .unwrap();

    hub.set_status(&sensor, SensorStatus::Disconnected);
    manager.handle_status_change(events.recv().await.unwrap()).await.unwrap();

    assert!(!manager.is_bound());
    assert!(manager.tilt_handle().is_none());
    assert!(!sensor.is_running());
    assert!(!sensor.is_stream_enabled(StreamKind::Skeleton));
    assert!(display.skeletons().figures.is_empty());
    assert!(display.depth().is_none());
    // Later clipped frames were refused while the first adjustment cooled down
    assert_eq!(sensor.angle_writes(), vec![1]);

    // Reconnecting binds again with a fresh angle
    hub.set_status(&sensor, SensorStatus::Connected);
    manager.handle_status_change(events.recv().await.unwrap()).await.unwrap();
    assert!(manager.is_bound());
    assert_eq!(manager.tilt_status().unwrap().borrow().angle, 0);
    manager.unbind_device().await;
}

#[tokio::test(start_paused = true)]
async fn test_latest_tilt_request_wins() {
    let sensor = VirtualSensor::connected("virtual-0");
    let settings = Config::default().tilt;

    // Reset queued before an adjustment: the adjustment lands last
    let controller = TiltController::spawn(sensor.clone(), &settings);
    let handle = controller.handle();
    handle.reset().unwrap();
    handle.adjust(1).unwrap();
    let status = controller.shutdown(ShutdownMode::Drain).await;
    assert_eq!(sensor.angle_writes(), vec![0, 1]);
    assert_eq!(status.angle, 1);
    assert_eq!(status.commands_processed, 2);

    // A reset supersedes the adjustment queued before it
    let controller = TiltController::spawn(sensor.clone(), &settings);
    let handle = controller.handle();
    handle.adjust(1).unwrap();
    handle.reset().unwrap();
    let status = controller.shutdown(ShutdownMode::Drain).await;
    assert_eq!(sensor.angle_writes(), vec![0, 1, 0]);
    assert_eq!(status.angle, 0);
    assert_eq!(status.commands_processed, 1);
    assert_eq!(sensor.elevation_angle(), Ok(0));
}

#[tokio::test(start_paused = true)]
async fn test_adjustment_cooldown() {
    let sensor = VirtualSensor::connected("virtual-0");
    let controller = TiltController::spawn(sensor.clone(), &Config::default().tilt);
    let handle = controller.handle();
    let mut status = controller.status();

    handle.adjust(1).unwrap();
    status.wait_for(|s| s.commands_processed == 1).await.unwrap();
    let first = Instant::now();
    assert_eq!(handle.adjust(1), Err(TiltError::Busy));

    wait_until_idle(&handle).await;
    assert!(first.elapsed() >= Duration::from_millis(1000));
    handle.adjust(1).unwrap();
    status.wait_for(|s| s.commands_processed == 2).await.unwrap();
    assert_eq!(sensor.angle_writes(), vec![1, 2]);

    // Resets never wait, even during a cool-down
    let start = Instant::now();
    handle.reset().unwrap();
    status.wait_for(|s| s.commands_processed == 3).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(sensor.angle_writes(), vec![1, 2, 0]);

    controller.shutdown(ShutdownMode::Cancel).await;
}

#[tokio::test(start_paused = true)]
async fn test_overflow_returns_to_level_without_cooldown() {
    let sensor = VirtualSensor::connected("virtual-0");
    let mut settings = Config::default().tilt;
    settings.max_degrees = 1;
    let controller = TiltController::spawn(sensor.clone(), &settings);
    let handle = controller.handle();
    let mut status = controller.status();

    handle.adjust(1).unwrap();
    status.wait_for(|s| s.commands_processed == 1).await.unwrap();
    wait_until_idle(&handle).await;

    let start = Instant::now();
    handle.adjust(1).unwrap();
    status.wait_for(|s| s.commands_processed == 2).await.unwrap();
    assert_eq!(
        status.borrow().last_outcome,
        Some(TiltOutcome::Saturated { requested: 1 })
    );
    // No cool-down after saturating
    assert!(!handle.adjustment_pending());
    handle.adjust(-1).unwrap();
    status.wait_for(|s| s.commands_processed == 3).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(sensor.angle_writes(), vec![1, 0, -1]);

    controller.shutdown(ShutdownMode::Cancel).await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_is_reported_and_not_fatal() {
    let sensor = VirtualSensor::connected("virtual-0");
    let controller = TiltController::spawn(sensor.clone(), &Config::default().tilt);
    let handle = controller.handle();
    let mut status = controller.status();

    sensor.fail_angle_writes(Some(skeleton_viewer::backends::sensor::TiltError::Busy));
    handle.reset().unwrap();
    status.wait_for(|s| s.commands_processed == 1).await.unwrap();
    assert!(matches!(
        status.borrow().last_outcome,
        Some(TiltOutcome::Failed { angle: 0, .. })
    ));

    sensor.fail_angle_writes(None);
    handle.adjust(-1).unwrap();
    let final_status = controller.shutdown(ShutdownMode::Drain).await;
    assert_eq!(final_status.angle, -1);
    assert_eq!(sensor.angle_writes(), vec![-1]);
}

#[tokio::test(start_paused = true)]
async fn test_frames_flow_during_cooldown() {
    let sensor = VirtualSensor::connected("virtual-0");
    let mut manager = bound_manager(&sensor).await;
    let mut display = manager.display();
    let start = Instant::now();

    sensor.emit_skeletons(vec![standing_skeleton(1, 0.0, 2.5, FrameEdges::BOTTOM)]);
    sensor.emit_skeletons(vec![standing_skeleton(1, 0.0, 2.5, FrameEdges::BOTTOM)]);
    sensor.emit_skeletons(vec![standing_skeleton(1, 0.0, 2.5, FrameEdges::empty())]);

    loop {
        let output = next_skeletons(&mut display).await;
        if output.tilt_requests.is_empty() {
            assert_eq!(output.figures.len(), 6);
            break;
        }
        assert_eq!(output.tilt_requests, vec![TiltCommand::Adjust(-1)]);
    }
    assert!(start.elapsed() < Duration::from_millis(1000));
    // The second clipped frame arrived while the first adjustment was pending
    assert_eq!(manager.tilt_handle().unwrap().requested_count(), 1);
    manager.unbind_device().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_frame_levels_sensor_after_clipped_burst() {
    let sensor = VirtualSensor::connected("virtual-0");
    let mut manager = bound_manager(&sensor).await;
    let mut tilt = manager.tilt_status().unwrap();

    // About one second of 30 fps frames with the head cut off
    for _ in 0..30 {
        assert!(sensor.emit_skeletons(vec![standing_skeleton(1, 0.0, 2.5, FrameEdges::TOP)]));
        sleep(Duration::from_millis(33)).await;
    }
    assert!(sensor.emit_skeletons(Vec::new()));
    timeout(WAIT, tilt.wait_for(|s| s.last_outcome == Some(TiltOutcome::Reset)))
        .await
        .unwrap()
        .unwrap();

    sleep(Duration::from_secs(30)).await;
    assert_eq!(sensor.elevation_angle(), Ok(0));
    let writes = sensor.angle_writes();
    assert_eq!(writes.last(), Some(&0));
    // One adjustment per cool-down, no backlog replayed afterwards
    assert!(writes.len() <= 3, "angle writes: {writes:?}");
    assert!(manager.tilt_handle().unwrap().requested_count() <= 3);
    manager.unbind_device().await;
}

#[tokio::test]
async fn test_provider_lists_attached_sensors() {
    let hub = VirtualSensorHub::new();
    hub.attach(VirtualSensor::connected("virtual-0"));
    hub.attach(Arc::new(VirtualSensor::new("virtual-1", SensorStatus::Initializing)));
    let ids: Vec<String> = hub.sensors().iter().map(|s| s.id().to_string()).collect();
    assert_eq!(ids, vec!["virtual-0", "virtual-1"]);
}
