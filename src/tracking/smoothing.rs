//! Exponential pose smoothing for dynamic-mode tracking.

use crate::geometry::RigidTransform;

/// Blend the previous filtered pose toward a new raw pose.
///
/// `coefficient` is the damping weight in 0..1: 0 passes the raw pose
/// through, values near 1 freeze the anchor. Position is blended linearly,
/// orientation along the shortest quaternion arc; antipodal orientations,
/// where no shortest arc exists, snap to the raw pose.
pub fn filter_pose(
    prev: &RigidTransform,
    raw: &RigidTransform,
    coefficient: f64,
) -> RigidTransform {
    let t = 1.0 - coefficient;
    let translation = prev.translation.lerp(&raw.translation, t);
    let rotation = prev
        .rotation
        .try_slerp(&raw.rotation, t, 1e-9)
        .unwrap_or(raw.rotation);
    RigidTransform::from_parts(rotation, translation)
}
