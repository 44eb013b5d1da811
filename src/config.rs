//! Tracker configuration.

use crate::error::TrackError;
use crate::tracking::TrackingMode;

/// System-wide tracking options.
///
/// One configuration applies to the whole tracker; the temporal policy
/// (`tracking_mode`) is selected per system, not per target.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Temporal policy: continuous smoothing or accumulate-then-lock.
    pub tracking_mode: TrackingMode,
    /// Frame downsampling factor applied before feature extraction (0.1..=1.0).
    pub downsample_factor: f64,
    /// Low-pass blend coefficient for the dynamic policy (0..=1).
    /// Closer to 1 means more smoothing: each frame the output moves
    /// `1 - coefficient` of the way toward the new raw pose.
    pub pose_filter_coefficient: f64,
    /// Hide the bound object on frames where its pattern is not detected.
    pub hide_when_not_detected: bool,
    /// Consecutive similar poses required before a static-mode target locks.
    pub stability_pose_count: usize,
    /// Maximum position difference (meters) for two poses to count as similar.
    pub max_position_difference: f64,
    /// Maximum orientation difference (degrees) for two poses to count as similar.
    pub max_angle_difference: f64,
    /// Use knn-2 matching with Lowe's ratio test instead of plain nearest-neighbor.
    pub enable_ratio_test: bool,
    /// Re-warp and re-match after the rough homography; all-or-nothing.
    pub enable_homography_refinement: bool,
    /// RANSAC reprojection threshold in pixels.
    pub homography_reprojection_threshold: f64,
    /// Demote a stabilized target that leaves the camera frustum.
    pub check_visibility: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracking_mode: TrackingMode::Dynamic,
            downsample_factor: 1.0,
            pose_filter_coefficient: 0.5,
            hide_when_not_detected: true,
            stability_pose_count: 10,
            max_position_difference: 0.1,
            max_angle_difference: 5.0,
            enable_ratio_test: true,
            enable_homography_refinement: true,
            homography_reprojection_threshold: 3.0,
            check_visibility: true,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        if !(0.1..=1.0).contains(&self.downsample_factor) {
            return Err(TrackError::InvalidConfig(format!(
                "downsample_factor must be in 0.1..=1.0, got {}",
                self.downsample_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.pose_filter_coefficient) {
            return Err(TrackError::InvalidConfig(format!(
                "pose_filter_coefficient must be in 0..=1, got {}",
                self.pose_filter_coefficient
            )));
        }
        if self.stability_pose_count < 1 {
            return Err(TrackError::InvalidConfig(
                "stability_pose_count must be at least 1".into(),
            ));
        }
        if self.max_position_difference <= 0.0 || self.max_angle_difference <= 0.0 {
            return Err(TrackError::InvalidConfig(
                "similarity thresholds must be positive".into(),
            ));
        }
        if self.homography_reprojection_threshold <= 0.0 {
            return Err(TrackError::InvalidConfig(
                "homography_reprojection_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}
