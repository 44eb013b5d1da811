//! Planar pose recovery and coordinate conventions.
//!
//! A verified detection gives four pattern corners in frame pixel space.
//! From those this module recovers the rigid transform of the pattern plane
//! in camera space, converts it from the right-handed camera convention
//! (x right, y down, z forward) to the left-handed engine convention
//! (x right, y up, z forward), and places it in world space using the
//! camera's own pose.

use nalgebra::{Matrix3, Point2, Rotation3, UnitQuaternion, Vector3};

use crate::geometry::homography::homography_from_4pt;
use crate::geometry::{CameraIntrinsics, RigidTransform};
use crate::pattern::CORNERS_3D;

/// Recover the pattern pose in camera space from its frame contour.
///
/// The pattern is modeled as a unit square on the Z=0 plane, so the
/// resulting translation is in pattern-width units until scaled by the
/// target's physical size. Returns `None` when the contour is degenerate.
pub fn pose_from_contour(
    contour: &[Point2<f64>; 4],
    intrinsics: &CameraIntrinsics,
) -> Option<RigidTransform> {
    let plane = [
        Point2::new(CORNERS_3D[0].x, CORNERS_3D[0].y),
        Point2::new(CORNERS_3D[1].x, CORNERS_3D[1].y),
        Point2::new(CORNERS_3D[2].x, CORNERS_3D[2].y),
        Point2::new(CORNERS_3D[3].x, CORNERS_3D[3].y),
    ];
    let h = homography_from_4pt(&plane, contour)?;

    // Columns of K^-1 * H are proportional to r1, r2 and t.
    let a = intrinsics.inverse_matrix() * h.h;
    let a1 = a.column(0).into_owned();
    let a2 = a.column(1).into_owned();
    let a3 = a.column(2).into_owned();

    let norm_sum = a1.norm() + a2.norm();
    if norm_sum < 1e-12 {
        return None;
    }
    let lambda = 2.0 / norm_sum;

    let mut r1 = a1 * lambda;
    let mut r2 = a2 * lambda;
    let mut t = a3 * lambda;

    // The homography scale is sign-ambiguous; the pattern must sit in front
    // of the camera.
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }

    let r3 = r1.cross(&r2);
    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let rotation = nearest_rotation(&approx)?;

    Some(RigidTransform::from_parts(
        UnitQuaternion::from_rotation_matrix(&rotation),
        t,
    ))
}

/// Project an approximate rotation matrix onto SO(3) via SVD.
fn nearest_rotation(m: &Matrix3<f64>) -> Option<Rotation3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u = u;
        u.column_mut(2).neg_mut();
        r = u * v_t;
    }
    Some(Rotation3::from_matrix_unchecked(r))
}

/// Convert a camera-space pose from the right-handed camera convention to
/// the left-handed engine convention.
///
/// The conversion is a similarity sandwich with a Y flip on the outside and
/// a Z flip on the inside. Two reflections compose to a proper rotation, so
/// the result stays representable as a unit quaternion with determinant +1.
pub fn camera_to_engine(pose: &RigidTransform) -> RigidTransform {
    let flip_y = Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, 1.0));
    let flip_z = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));

    let r = flip_y * pose.rotation.to_rotation_matrix().into_inner() * flip_z;
    let t = flip_y * pose.translation;

    RigidTransform::from_parts(
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r)),
        t,
    )
}

/// Place an engine-space camera-relative pose in world space.
///
/// `physical_size` is the real-world edge length of the pattern in meters;
/// the camera-relative translation is in pattern-width units, so scaling by
/// it yields metric depth and offset before composing with the camera pose.
pub fn world_pose(
    engine_pose: &RigidTransform,
    physical_size: f64,
    camera_to_world: &RigidTransform,
) -> RigidTransform {
    let scaled = RigidTransform::from_parts(
        engine_pose.rotation,
        engine_pose.translation * physical_size,
    );
    camera_to_world.compose(&scaled)
}
