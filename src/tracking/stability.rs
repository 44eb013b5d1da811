//! Pose-consistency checks and averaging for static-mode stabilization.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::geometry::RigidTransform;

/// Whether two poses agree within the given position (meters) and angle
/// (degrees) tolerances. Both bounds are inclusive.
pub fn poses_similar(
    a: &RigidTransform,
    b: &RigidTransform,
    max_position_m: f64,
    max_angle_deg: f64,
) -> bool {
    let dp = (a.translation - b.translation).norm();
    let da = a.rotation.angle_to(&b.rotation).to_degrees();
    dp <= max_position_m && da <= max_angle_deg
}

/// Average a run of mutually consistent poses into one locked pose.
///
/// Positions average arithmetically. Quaternions are summed after flipping
/// each onto the hemisphere of the first, then renormalized, which is exact
/// enough for the small angular spread the similarity gate admits.
pub fn average_poses(poses: &[RigidTransform]) -> Option<RigidTransform> {
    let first = poses.first()?;
    let mut position = Vector3::zeros();
    let mut quat = Quaternion::new(0.0, 0.0, 0.0, 0.0);
    let reference = first.rotation.into_inner();

    for p in poses {
        position += p.translation;
        let mut q = p.rotation.into_inner();
        if q.dot(&reference) < 0.0 {
            q = -q;
        }
        quat += q;
    }

    let n = poses.len() as f64;
    Some(RigidTransform::from_parts(
        UnitQuaternion::new_normalize(quat),
        position / n,
    ))
}
