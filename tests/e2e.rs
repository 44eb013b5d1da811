//! End-to-end tracking over synthetic camera frames.

use image::{Rgba, RgbaImage};
use nalgebra::{Point3, UnitQuaternion};

use planar_ar::tracking::{AnchorSink, TargetPhase, TrackingMode};
use planar_ar::{CameraIntrinsics, PatternTracker, RigidTransform, TrackError, TrackerConfig};

#[derive(Default)]
struct RecordingSink {
    poses: Vec<(String, Point3<f64>)>,
    visibility: Vec<(String, bool)>,
    stabilized: Vec<String>,
}

impl AnchorSink for RecordingSink {
    fn set_pose(
        &mut self,
        id: &str,
        position: Point3<f64>,
        _orientation: UnitQuaternion<f64>,
        _scale: f64,
    ) {
        self.poses.push((id.to_string(), position));
    }

    fn set_visible(&mut self, id: &str, visible: bool) {
        self.visibility.push((id.to_string(), visible));
    }

    fn on_stabilized(&mut self, id: &str) {
        self.stabilized.push(id.to_string());
    }
}

impl RecordingSink {
    fn last_visible(&self, id: &str) -> Option<bool> {
        self.visibility
            .iter()
            .rev()
            .find(|(i, _)| i == id)
            .map(|(_, v)| *v)
    }
}

/// Deterministic high-contrast reference card.
fn card_image(size: u32, seed: u64) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(size, size, Rgba([128, 128, 128, 255]));
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };
    for _ in 0..60 {
        let bx = next() % size.saturating_sub(20);
        let by = next() % size.saturating_sub(20);
        let extent = 6 + next() % 12;
        let v = if next() % 2 == 0 { 20 } else { 235 };
        for y in by..(by + extent).min(size) {
            for x in bx..(bx + extent).min(size) {
                img.put_pixel(x, y, Rgba([v, v, v, 255]));
            }
        }
    }
    img
}

/// A camera frame with the card pasted at an integer offset.
fn frame_with_card(card: &RgbaImage, ox: u32, oy: u32) -> RgbaImage {
    let mut frame = RgbaImage::from_fn(320, 240, |x, y| {
        let v = (90 + (x + 2 * y) % 40) as u8;
        Rgba([v, v, v, 255])
    });
    for y in 0..card.height() {
        for x in 0..card.width() {
            frame.put_pixel(x + ox, y + oy, *card.get_pixel(x, y));
        }
    }
    frame
}

fn empty_frame() -> RgbaImage {
    RgbaImage::from_fn(320, 240, |x, y| {
        let v = (90 + (x + 2 * y) % 40) as u8;
        Rgba([v, v, v, 255])
    })
}

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::new(300.0, 300.0, 160.0, 120.0, 320, 240)
}

fn tracker_with(config: TrackerConfig) -> PatternTracker {
    PatternTracker::new(config, intrinsics()).unwrap()
}

#[test]
fn dynamic_tracking_detects_and_places_anchor() {
    let card = card_image(160, 42);
    let mut tracker = tracker_with(TrackerConfig::default());
    let mut sink = RecordingSink::default();
    tracker.add_target("card", &card, 0.15).unwrap();

    let frame = frame_with_card(&card, 60, 40);
    let result = tracker.process_frame(&frame, &RigidTransform::identity(), &mut sink);

    assert_eq!(result.detections.len(), 1);
    assert_eq!(result.detections[0].id, "card");
    assert!(result.targets[0].detected);
    assert_eq!(sink.last_visible("card"), Some(true));

    // The card sits in front of the camera: positive engine-space depth,
    // metric scale from the declared physical size.
    let (_, pos) = &sink.poses[0];
    assert!(pos.z > 0.1 && pos.z < 1.0, "depth {}", pos.z);
}

#[test]
fn absent_pattern_hides_anchor() {
    let card = card_image(160, 42);
    let mut tracker = tracker_with(TrackerConfig::default());
    let mut sink = RecordingSink::default();
    tracker.add_target("card", &card, 0.15).unwrap();

    let result = tracker.process_frame(&empty_frame(), &RigidTransform::identity(), &mut sink);

    assert!(result.detections.is_empty());
    assert!(!result.targets[0].detected);
    assert_eq!(sink.last_visible("card"), Some(false));
}

#[test]
fn registration_lifecycle() {
    let card = card_image(160, 42);
    let mut tracker = tracker_with(TrackerConfig::default());
    let mut sink = RecordingSink::default();

    tracker.add_target("card", &card, 0.15).unwrap();
    assert!(matches!(
        tracker.add_target("card", &card, 0.15),
        Err(TrackError::DuplicateTarget(_))
    ));

    tracker.remove_target("card").unwrap();
    let frame = frame_with_card(&card, 60, 40);
    let result = tracker.process_frame(&frame, &RigidTransform::identity(), &mut sink);
    assert!(result.detections.is_empty());

    // Re-registering under the freed id resumes detection.
    tracker.add_target("card", &card, 0.15).unwrap();
    let result = tracker.process_frame(&frame, &RigidTransform::identity(), &mut sink);
    assert_eq!(result.detections.len(), 1);
}

#[test]
fn plain_reference_image_is_rejected() {
    let flat = RgbaImage::from_pixel(120, 120, Rgba([180, 180, 180, 255]));
    let mut tracker = tracker_with(TrackerConfig::default());
    assert!(matches!(
        tracker.add_target("flat", &flat, 0.15),
        Err(TrackError::InsufficientKeypoints)
    ));
    assert_eq!(tracker.target_count(), 0);
}

#[test]
fn static_mode_locks_then_suspends_detection() {
    let card = card_image(160, 42);
    let config = TrackerConfig {
        tracking_mode: TrackingMode::Static,
        stability_pose_count: 3,
        ..TrackerConfig::default()
    };
    let mut tracker = tracker_with(config);
    let mut sink = RecordingSink::default();
    tracker.add_target("card", &card, 0.15).unwrap();

    let frame = frame_with_card(&card, 60, 40);
    let camera = RigidTransform::identity();

    // Hidden while accumulating.
    let r1 = tracker.process_frame(&frame, &camera, &mut sink);
    assert_eq!(r1.targets[0].phase, TargetPhase::Accumulating);
    assert_eq!(sink.last_visible("card"), Some(false));
    tracker.process_frame(&frame, &camera, &mut sink);

    // Third consistent pose locks the anchor.
    let r3 = tracker.process_frame(&frame, &camera, &mut sink);
    assert_eq!(r3.targets[0].phase, TargetPhase::Stabilized);
    assert_eq!(sink.stabilized, vec!["card".to_string()]);
    assert_eq!(sink.last_visible("card"), Some(true));

    // With a locked anchor the scheduler stops running detection.
    let r4 = tracker.process_frame(&frame, &camera, &mut sink);
    assert!(r4.detection_skipped);
    assert!(r4.detections.is_empty());
    assert_eq!(sink.stabilized.len(), 1);
}

#[test]
fn static_mode_restarts_run_when_target_moves() {
    let card = card_image(160, 42);
    let config = TrackerConfig {
        tracking_mode: TrackingMode::Static,
        stability_pose_count: 5,
        // Tight enough that a 40 px jump breaks the run.
        max_position_difference: 0.01,
        ..TrackerConfig::default()
    };
    let mut tracker = tracker_with(config);
    let mut sink = RecordingSink::default();
    tracker.add_target("card", &card, 0.15).unwrap();

    let camera = RigidTransform::identity();
    let held = frame_with_card(&card, 60, 40);
    for _ in 0..3 {
        tracker.process_frame(&held, &camera, &mut sink);
    }
    assert_eq!(tracker.target("card").unwrap().similar_count, 3);

    let moved = frame_with_card(&card, 100, 40);
    let r = tracker.process_frame(&moved, &camera, &mut sink);

    assert_eq!(r.targets[0].phase, TargetPhase::Accumulating);
    assert!(sink.stabilized.is_empty());
    assert_eq!(tracker.target("card").unwrap().similar_count, 1);
}

#[test]
fn switching_modes_resets_stabilization() {
    let card = card_image(160, 42);
    let config = TrackerConfig {
        tracking_mode: TrackingMode::Static,
        stability_pose_count: 2,
        ..TrackerConfig::default()
    };
    let mut tracker = tracker_with(config);
    let mut sink = RecordingSink::default();
    tracker.add_target("card", &card, 0.15).unwrap();

    let frame = frame_with_card(&card, 60, 40);
    let camera = RigidTransform::identity();
    tracker.process_frame(&frame, &camera, &mut sink);
    tracker.process_frame(&frame, &camera, &mut sink);
    assert_eq!(
        tracker.target("card").unwrap().phase,
        TargetPhase::Stabilized
    );

    tracker.set_mode(TrackingMode::Dynamic);
    let t = tracker.target("card").unwrap();
    assert_eq!(t.phase, TargetPhase::Accumulating);
    assert!(t.prev_pose.is_none());

    // Dynamic mode follows the feed again immediately.
    let r = tracker.process_frame(&frame, &camera, &mut sink);
    assert!(!r.detection_skipped);
    assert!(r.targets[0].detected);
}
