//! Frame-to-frame tracking orchestration.
//!
//! [`PatternTracker`] ties the whole pipeline together: pattern registry and
//! detection, pose recovery, coordinate conversion and the per-mode temporal
//! policy, emitting anchor updates through an [`AnchorSink`].

use std::collections::HashMap;

use image::RgbaImage;
use nalgebra::Point3;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::detect::{Detection, DetectorParams, MultiPatternDetector};
use crate::error::TrackError;
use crate::geometry::{CameraIntrinsics, RansacParams, RigidTransform};
use crate::pattern::Pattern;
use crate::pose;
use crate::tracking::sink::AnchorSink;
use crate::tracking::smoothing::filter_pose;
use crate::tracking::stability::{average_poses, poses_similar};
use crate::tracking::state::{TargetPhase, TrackingMode};
use crate::tracking::target::{TargetStore, TrackedTarget};

/// Per-target outcome of one processed frame.
#[derive(Debug, Clone)]
pub struct TargetStatus {
    pub id: String,
    pub detected: bool,
    pub phase: TargetPhase,
}

/// Result of processing one frame.
#[derive(Debug)]
pub struct FrameResult {
    /// Monotonic frame counter.
    pub frame: u64,
    /// Raw verified detections, before any temporal policy.
    pub detections: Vec<Detection>,
    /// True when the static-mode scheduler skipped detection entirely.
    pub detection_skipped: bool,
    pub targets: Vec<TargetStatus>,
}

/// Markerless tracker for multiple planar image targets.
pub struct PatternTracker {
    config: TrackerConfig,
    intrinsics: CameraIntrinsics,
    detector: MultiPatternDetector,
    store: TargetStore,
    frame_index: u64,
}

impl PatternTracker {
    pub fn new(config: TrackerConfig, intrinsics: CameraIntrinsics) -> Result<Self, TrackError> {
        config.validate()?;
        let params = DetectorParams {
            enable_ratio_test: config.enable_ratio_test,
            enable_refinement: config.enable_homography_refinement,
            ransac: RansacParams {
                reproj_threshold: config.homography_reprojection_threshold,
                ..RansacParams::default()
            },
            downsample_factor: config.downsample_factor,
        };
        Ok(Self {
            config,
            intrinsics,
            detector: MultiPatternDetector::new(params),
            store: TargetStore::new(),
            frame_index: 0,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn mode(&self) -> TrackingMode {
        self.config.tracking_mode
    }

    pub fn target(&self, id: &str) -> Option<&TrackedTarget> {
        self.store.get(id)
    }

    pub fn target_count(&self) -> usize {
        self.store.len()
    }

    /// Register a target: build its pattern from the reference raster and
    /// start tracking it. `physical_size` is the printed edge length in
    /// meters.
    pub fn add_target(
        &mut self,
        id: &str,
        raster: &RgbaImage,
        physical_size: f64,
    ) -> Result<(), TrackError> {
        if self.store.contains(id) {
            warn!(id, "add_target: identifier already registered");
            return Err(TrackError::DuplicateTarget(id.to_string()));
        }
        if physical_size <= 0.0 {
            return Err(TrackError::InvalidConfig(format!(
                "physical_size must be positive, got {physical_size}"
            )));
        }
        let pattern = Pattern::build(raster, self.detector.extractor())?;
        self.detector.register(id, pattern);
        self.store.insert(TrackedTarget::new(id.to_string(), physical_size));
        info!(id, physical_size, "target added");
        Ok(())
    }

    /// Remove a target and release its pattern resources.
    pub fn remove_target(&mut self, id: &str) -> Result<(), TrackError> {
        if self.store.remove(id).is_none() {
            warn!(id, "remove_target: unknown identifier");
            return Err(TrackError::UnknownTarget(id.to_string()));
        }
        self.detector.unregister(id);
        info!(id, "target removed");
        Ok(())
    }

    /// Switch the temporal policy. All stabilization progress is discarded
    /// so the new policy starts from a clean slate.
    pub fn set_mode(&mut self, mode: TrackingMode) {
        if self.config.tracking_mode == mode {
            return;
        }
        info!(?mode, "tracking mode changed");
        self.config.tracking_mode = mode;
        for target in self.store.iter_mut() {
            target.reset_stability();
            target.prev_pose = None;
        }
    }

    /// Drop one target's temporal state without unregistering its pattern.
    pub fn reset_target(&mut self, id: &str) -> Result<(), TrackError> {
        let target = self
            .store
            .get_mut(id)
            .ok_or_else(|| TrackError::UnknownTarget(id.to_string()))?;
        target.reset_stability();
        target.prev_pose = None;
        target.detected = false;
        Ok(())
    }

    /// Process one camera frame.
    ///
    /// `camera_to_world` is the camera's pose in engine world space for this
    /// frame; anchor updates are emitted through `sink`.
    pub fn process_frame(
        &mut self,
        frame: &RgbaImage,
        camera_to_world: &RigidTransform,
        sink: &mut dyn AnchorSink,
    ) -> FrameResult {
        self.frame_index += 1;
        let Self {
            config,
            intrinsics,
            detector,
            store,
            frame_index,
        } = self;

        // Once a static-mode target has locked, its anchor no longer follows
        // the camera feed, so detection work is suspended until something
        // demotes it back to accumulation.
        let any_stabilized = store.iter().any(|t| t.phase == TargetPhase::Stabilized);
        let skip = config.tracking_mode == TrackingMode::Static && any_stabilized;

        let detections = if skip {
            debug!(frame = *frame_index, "detection suspended, anchor locked");
            Vec::new()
        } else {
            detector.detect(frame)
        };

        let mut by_id: HashMap<&str, &Detection> =
            detections.iter().map(|d| (d.id.as_str(), d)).collect();

        for target in store.iter_mut() {
            if skip {
                target.detected = false;
                continue;
            }
            let world = by_id.remove(target.id.as_str()).and_then(|d| {
                let cam = pose::pose_from_contour(&d.contour, intrinsics)?;
                let engine = pose::camera_to_engine(&cam);
                Some(pose::world_pose(&engine, target.physical_size, camera_to_world))
            });
            match config.tracking_mode {
                TrackingMode::Dynamic => apply_dynamic(target, world, config, sink),
                TrackingMode::Static => apply_static(target, world, config, sink),
            }
        }

        if config.check_visibility {
            for target in store.iter_mut() {
                demote_if_out_of_view(target, camera_to_world, intrinsics, sink);
            }
        }

        FrameResult {
            frame: *frame_index,
            targets: store
                .iter()
                .map(|t| TargetStatus {
                    id: t.id.clone(),
                    detected: t.detected,
                    phase: t.phase,
                })
                .collect(),
            detections,
            detection_skipped: skip,
        }
    }
}

/// Dynamic policy: follow every detection with exponential smoothing.
fn apply_dynamic(
    target: &mut TrackedTarget,
    world: Option<RigidTransform>,
    config: &TrackerConfig,
    sink: &mut dyn AnchorSink,
) {
    match world {
        Some(raw) => {
            let filtered = match &target.prev_pose {
                Some(prev) => filter_pose(prev, &raw, config.pose_filter_coefficient),
                None => raw,
            };
            sink.set_pose(
                &target.id,
                filtered.position(),
                filtered.rotation,
                target.physical_size,
            );
            sink.set_visible(&target.id, true);
            target.prev_pose = Some(filtered);
            target.detected = true;
        }
        None => {
            target.detected = false;
            if config.hide_when_not_detected {
                sink.set_visible(&target.id, false);
            }
        }
    }
}

/// Static policy: accumulate consistent poses, then lock the averaged pose.
fn apply_static(
    target: &mut TrackedTarget,
    world: Option<RigidTransform>,
    config: &TrackerConfig,
    sink: &mut dyn AnchorSink,
) {
    if target.phase == TargetPhase::Stabilized {
        // The anchor is frozen; detections for a locked target are ignored.
        target.detected = world.is_some();
        return;
    }

    match world {
        Some(raw) => {
            target.detected = true;
            let extends_run = target
                .history
                .last()
                .map(|last| {
                    poses_similar(
                        last,
                        &raw,
                        config.max_position_difference,
                        config.max_angle_difference,
                    )
                })
                .unwrap_or(false);
            if extends_run {
                target.history.push(raw);
                target.similar_count += 1;
            } else {
                // Inconsistent with the run so far: restart from this pose.
                target.history.clear();
                target.history.push(raw);
                target.similar_count = 1;
            }

            if target.similar_count >= config.stability_pose_count {
                if let Some(locked) = average_poses(&target.history) {
                    info!(id = %target.id, samples = target.history.len(), "target stabilized");
                    sink.set_pose(
                        &target.id,
                        locked.position(),
                        locked.rotation,
                        target.physical_size,
                    );
                    sink.set_visible(&target.id, true);
                    sink.on_stabilized(&target.id);
                    target.prev_pose = Some(locked);
                    target.phase = TargetPhase::Stabilized;
                    target.history.clear();
                    target.similar_count = 0;
                }
            } else {
                sink.set_visible(&target.id, false);
            }
        }
        None => {
            // Losing the pattern mid-accumulation voids the run.
            target.detected = false;
            target.history.clear();
            target.similar_count = 0;
            sink.set_visible(&target.id, false);
        }
    }
}

/// Demote a stabilized target whose locked anchor left the camera frustum.
fn demote_if_out_of_view(
    target: &mut TrackedTarget,
    camera_to_world: &RigidTransform,
    intrinsics: &CameraIntrinsics,
    sink: &mut dyn AnchorSink,
) {
    if target.phase != TargetPhase::Stabilized {
        return;
    }
    let locked = match &target.prev_pose {
        Some(p) => p,
        None => return,
    };
    let p_engine = camera_to_world.inverse().transform_point(&locked.position());
    // Engine camera space is y up; the projection model expects y down.
    let p_cam = Point3::new(p_engine.x, -p_engine.y, p_engine.z);
    if !intrinsics.target_in_view(&p_cam, target.physical_size * 0.5) {
        info!(id = %target.id, "stabilized target left the view, re-accumulating");
        target.reset_stability();
        target.prev_pose = None;
        sink.set_visible(&target.id, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, UnitQuaternion, Vector3};

    #[derive(Default)]
    struct RecordingSink {
        poses: Vec<(String, Point3<f64>, f64)>,
        visibility: Vec<(String, bool)>,
        stabilized: Vec<String>,
    }

    impl AnchorSink for RecordingSink {
        fn set_pose(
            &mut self,
            id: &str,
            position: Point3<f64>,
            _orientation: UnitQuaternion<f64>,
            scale: f64,
        ) {
            self.poses.push((id.to_string(), position, scale));
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

    fn pose_at(x: f64, z: f64) -> RigidTransform {
        RigidTransform::from_parts(UnitQuaternion::identity(), Vector3::new(x, 0.0, z))
    }

    fn static_config(n: usize) -> TrackerConfig {
        TrackerConfig {
            tracking_mode: TrackingMode::Static,
            stability_pose_count: n,
            ..TrackerConfig::default()
        }
    }

    fn fresh_target() -> TrackedTarget {
        TrackedTarget::new("t".into(), 0.2)
    }

    #[test]
    fn dynamic_first_detection_passes_through() {
        let config = TrackerConfig::default();
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        apply_dynamic(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);

        assert!(target.detected);
        assert_eq!(sink.poses.len(), 1);
        assert_eq!(sink.poses[0].1, Point3::new(1.0, 0.0, 2.0));
        assert_eq!(sink.poses[0].2, 0.2);
        assert_eq!(sink.last_visible("t"), Some(true));
    }

    #[test]
    fn dynamic_smooths_toward_new_pose() {
        let config = TrackerConfig {
            pose_filter_coefficient: 0.5,
            ..TrackerConfig::default()
        };
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        apply_dynamic(&mut target, Some(pose_at(0.0, 2.0)), &config, &mut sink);
        apply_dynamic(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);

        // Second emitted position is halfway between the two raw poses.
        assert!((sink.poses[1].1.x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn dynamic_miss_hides_anchor() {
        let config = TrackerConfig::default();
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        apply_dynamic(&mut target, Some(pose_at(0.0, 2.0)), &config, &mut sink);
        apply_dynamic(&mut target, None, &config, &mut sink);

        assert!(!target.detected);
        assert_eq!(sink.last_visible("t"), Some(false));
    }

    #[test]
    fn dynamic_miss_keeps_anchor_when_hiding_disabled() {
        let config = TrackerConfig {
            hide_when_not_detected: false,
            ..TrackerConfig::default()
        };
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        apply_dynamic(&mut target, Some(pose_at(0.0, 2.0)), &config, &mut sink);
        apply_dynamic(&mut target, None, &config, &mut sink);

        assert_eq!(sink.last_visible("t"), Some(true));
    }

    #[test]
    fn static_locks_after_consistent_run() {
        let config = static_config(3);
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        for _ in 0..3 {
            apply_static(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);
        }

        assert_eq!(target.phase, TargetPhase::Stabilized);
        assert_eq!(sink.stabilized, vec!["t".to_string()]);
        assert_eq!(sink.last_visible("t"), Some(true));
        assert_eq!(sink.poses.len(), 1);
        assert!(target.history.is_empty());
    }

    #[test]
    fn static_stays_hidden_while_accumulating() {
        let config = static_config(5);
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        for _ in 0..3 {
            apply_static(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);
        }

        assert_eq!(target.phase, TargetPhase::Accumulating);
        assert!(sink.poses.is_empty());
        assert!(sink.stabilized.is_empty());
        assert_eq!(sink.last_visible("t"), Some(false));
    }

    #[test]
    fn static_inconsistent_pose_restarts_run() {
        let config = static_config(3);
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        apply_static(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);
        apply_static(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);
        // Jump well past max_position_difference.
        apply_static(&mut target, Some(pose_at(5.0, 2.0)), &config, &mut sink);

        assert_eq!(target.similar_count, 1);
        assert_eq!(target.phase, TargetPhase::Accumulating);
        assert!(sink.stabilized.is_empty());
    }

    #[test]
    fn static_loss_voids_accumulation() {
        let config = static_config(3);
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        apply_static(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);
        apply_static(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);
        apply_static(&mut target, None, &config, &mut sink);

        assert_eq!(target.similar_count, 0);
        assert!(target.history.is_empty());
    }

    #[test]
    fn static_stabilizes_only_once() {
        let config = static_config(2);
        let mut target = fresh_target();
        let mut sink = RecordingSink::default();

        for _ in 0..6 {
            apply_static(&mut target, Some(pose_at(1.0, 2.0)), &config, &mut sink);
        }

        assert_eq!(sink.stabilized.len(), 1);
        assert_eq!(sink.poses.len(), 1);
    }

    #[test]
    fn stabilized_target_demotes_when_out_of_view() {
        let intrinsics = CameraIntrinsics::new(300.0, 300.0, 160.0, 120.0, 320, 240);
        let mut target = fresh_target();
        target.phase = TargetPhase::Stabilized;
        target.prev_pose = Some(pose_at(0.0, 2.0));
        let mut sink = RecordingSink::default();

        // Camera still looking straight at the anchor: stays locked.
        demote_if_out_of_view(&mut target, &RigidTransform::identity(), &intrinsics, &mut sink);
        assert_eq!(target.phase, TargetPhase::Stabilized);

        // Camera moved far sideways: anchor leaves the frustum.
        let cam = RigidTransform::from_parts(
            UnitQuaternion::identity(),
            Vector3::new(10.0, 0.0, 0.0),
        );
        demote_if_out_of_view(&mut target, &cam, &intrinsics, &mut sink);
        assert_eq!(target.phase, TargetPhase::Accumulating);
        assert!(target.prev_pose.is_none());
        assert_eq!(sink.last_visible("t"), Some(false));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = TrackerConfig {
            downsample_factor: 0.0,
            ..TrackerConfig::default()
        };
        let intrinsics = CameraIntrinsics::new(300.0, 300.0, 160.0, 120.0, 320, 240);
        assert!(matches!(
            PatternTracker::new(config, intrinsics),
            Err(TrackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_target_operations_error() {
        let intrinsics = CameraIntrinsics::new(300.0, 300.0, 160.0, 120.0, 320, 240);
        let mut tracker = PatternTracker::new(TrackerConfig::default(), intrinsics).unwrap();
        assert!(matches!(
            tracker.remove_target("ghost"),
            Err(TrackError::UnknownTarget(_))
        ));
        assert!(matches!(
            tracker.reset_target("ghost"),
            Err(TrackError::UnknownTarget(_))
        ));
    }
}
