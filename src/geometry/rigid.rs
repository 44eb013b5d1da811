//! Rigid transform (rotation + translation) in the style of an SE(3) element.

use nalgebra::{Point3, UnitQuaternion, Vector3};

/// A rigid transform: `p_out = rotation * p_in + translation`.
///
/// The quaternion is kept normalized by construction; callers that build one
/// from raw components go through [`RigidTransform::from_parts`], which
/// renormalizes.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidTransform {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn from_parts(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::new_normalize(rotation.into_inner()),
            translation,
        }
    }

    /// Composition `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn inverse(&self) -> Self {
        let inv_rot = self.rotation.inverse();
        Self {
            translation: -(inv_rot * self.translation),
            rotation: inv_rot,
        }
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    pub fn position(&self) -> Point3<f64> {
        Point3::from(self.translation)
    }

    /// Rotation angle between the orientations of two transforms, in radians.
    pub fn angle_to(&self, other: &Self) -> f64 {
        self.rotation.angle_to(&other.rotation)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn compose_then_inverse_is_identity() {
        let t = RigidTransform::from_parts(
            UnitQuaternion::from_euler_angles(0.3, -0.2, 0.1),
            Vector3::new(1.0, -2.0, 3.0),
        );
        let round = t.compose(&t.inverse());
        assert_relative_eq!(round.translation.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(round.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn transform_point_applies_rotation_then_translation() {
        let t = RigidTransform::from_parts(
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vector3::new(1.0, 0.0, 0.0),
        );
        let p = t.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn composition_matches_sequential_application() {
        let a = RigidTransform::from_parts(
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
            Vector3::new(0.5, 0.0, -1.0),
        );
        let b = RigidTransform::from_parts(
            UnitQuaternion::from_euler_angles(-0.2, 0.0, 0.4),
            Vector3::new(0.0, 2.0, 1.0),
        );
        let p = Point3::new(0.3, -0.7, 1.2);
        let lhs = a.compose(&b).transform_point(&p);
        let rhs = a.transform_point(&b.transform_point(&p));
        assert_relative_eq!((lhs - rhs).norm(), 0.0, epsilon = 1e-12);
    }
}
