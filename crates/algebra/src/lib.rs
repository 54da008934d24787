//! Rigid-motion primitives for pose-chain optimization.
//!
//! Provides the [`Pose`] type used throughout the optimizer: a rotation
//! block stored as a raw 3x3 matrix plus a translation vector. The raw
//! matrix form is deliberate: the optimizer mutates the rotation and
//! translation blocks independently and lets rotations drift off SO(3)
//! between scheduled re-orthonormalizations, so the unit-norm guarantee
//! of `UnitQuaternion` would get in the way. Quaternions appear only at
//! the parse/output boundary.

use nalgebra::{Matrix3, Rotation3, Unit, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// A 3D rigid-body transform (rotation + translation).
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    rot: Matrix3<f64>,
    trans: Vector3<f64>,
}

impl Pose {
    /// Create identity transform.
    pub fn identity() -> Self {
        Self {
            rot: Matrix3::identity(),
            trans: Vector3::zeros(),
        }
    }

    /// Create from a translation and a unit quaternion.
    pub fn from_parts(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            rot: rotation.to_rotation_matrix().into_inner(),
            trans: translation,
        }
    }

    /// Create a pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rot: Matrix3::identity(),
            trans: translation,
        }
    }

    /// Create a pure rotation of `angle` radians about `axis`.
    pub fn from_axis_angle(axis: &Unit<Vector3<f64>>, angle: f64) -> Self {
        Self {
            rot: Rotation3::from_axis_angle(axis, angle).into_inner(),
            trans: Vector3::zeros(),
        }
    }

    /// Get the rotation block.
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rot
    }

    /// Get the translation component.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.trans
    }

    /// Replace the rotation block, leaving the translation untouched.
    pub fn set_rotation(&mut self, rotation: Matrix3<f64>) {
        self.rot = rotation;
    }

    /// Replace the translation, leaving the rotation block untouched.
    pub fn set_translation(&mut self, translation: Vector3<f64>) {
        self.trans = translation;
    }

    /// Extract the rotation block as a unit quaternion.
    pub fn rotation_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(self.rot))
    }

    /// Compute the general inverse, inverting the rotation block as a
    /// plain matrix. Valid even when the block has drifted off SO(3).
    pub fn inverse(&self) -> Self {
        let rot_inv = self
            .rot
            .try_inverse()
            .unwrap_or_else(|| self.rot.transpose());
        Self {
            rot: rot_inv,
            trans: -(rot_inv * self.trans),
        }
    }

    /// Compute the inverse assuming the rotation block is orthonormal,
    /// so its inverse is its transpose. Cheaper than [`Pose::inverse`].
    pub fn inverse_isometry(&self) -> Self {
        let rot_t = self.rot.transpose();
        Self {
            rot: rot_t,
            trans: -(rot_t * self.trans),
        }
    }

    /// Compose transforms: self * other.
    /// If self is A->B and other is B->C, result is A->C.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            rot: self.rot * other.rot,
            trans: self.rot * other.trans + self.trans,
        }
    }

    /// Re-orthonormalize the rotation block via a quaternion round-trip.
    pub fn normalize_rotation(&mut self) {
        let quat = UnitQuaternion::new_normalize(self.rotation_quaternion().into_inner());
        self.rot = quat.to_rotation_matrix().into_inner();
    }

    /// Rotation logarithm: the (angle, axis) pair of the rotation block,
    /// with the angle branch chosen in (-PI, PI]. A zero rotation yields
    /// angle 0 about the x axis.
    pub fn log_rotation(&self) -> (f64, Unit<Vector3<f64>>) {
        match self.rotation_quaternion().axis_angle() {
            Some((axis, angle)) => {
                let angle = if angle > PI { angle - 2.0 * PI } else { angle };
                (angle, axis)
            }
            None => (0.0, Vector3::x_axis()),
        }
    }

    /// Tangent-space interpolation of a rigid motion: returns
    /// `Translate(v * s) * Rotate(angle * t, axis)`.
    ///
    /// `s` and `t` are the translation and rotation shares in [0, 1].
    /// Translation interpolates linearly, rotation along its great
    /// circle.
    pub fn interp_rigid(
        s: f64,
        t: f64,
        v: &Vector3<f64>,
        angle: f64,
        axis: &Unit<Vector3<f64>>,
    ) -> Pose {
        Pose {
            rot: Rotation3::from_axis_angle(axis, angle * t).into_inner(),
            trans: v * s,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.compose(&rhs)
    }
}

impl std::ops::Mul<&Pose> for Pose {
    type Output = Pose;

    fn mul(self, rhs: &Pose) -> Pose {
        self.compose(rhs)
    }
}

impl std::ops::Mul<Pose> for &Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.compose(&rhs)
    }
}

impl std::ops::Mul<&Pose> for &Pose {
    type Output = Pose;

    fn mul(self, rhs: &Pose) -> Pose {
        self.compose(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_pose_eq(a: &Pose, b: &Pose, epsilon: f64) {
        assert_relative_eq!(*a.rotation(), *b.rotation(), epsilon = epsilon);
        assert_relative_eq!(*a.translation(), *b.translation(), epsilon = epsilon);
    }

    #[test]
    fn test_identity() {
        let pose = Pose::identity();
        assert_relative_eq!(pose.translation().norm(), 0.0);
        assert_relative_eq!(*pose.rotation(), Matrix3::identity());
    }

    #[test]
    fn test_compose_inverse_roundtrip() {
        let pose = Pose::from_parts(
            Vector3::new(1.0, -2.0, 0.5),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.7),
        );
        let composed = pose.compose(&pose.inverse());
        assert_pose_eq(&composed, &Pose::identity(), 1e-12);
    }

    #[test]
    fn test_isometry_inverse_matches_general_on_so3() {
        let pose = Pose::from_parts(
            Vector3::new(0.3, 1.1, -4.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 1.3),
        );
        assert_pose_eq(&pose.inverse(), &pose.inverse_isometry(), 1e-12);
    }

    #[test]
    fn test_quaternion_roundtrip() {
        let quat = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -0.9);
        let pose = Pose::from_parts(Vector3::zeros(), quat);
        let back = pose.rotation_quaternion();
        assert_relative_eq!(back.angle_to(&quat), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_compose_order() {
        // Translate (1, 0, 0) then rotate 90 degrees about z.
        let translate = Pose::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let rotate = Pose::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
        let combined = rotate.compose(&translate);
        // Point at origin of the inner frame lands at (0, 1, 0).
        assert_relative_eq!(
            *combined.translation(),
            Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_log_rotation_in_branch() {
        for angle in [0.1, 1.0, 3.0, PI - 1e-6] {
            let pose = Pose::from_axis_angle(&Vector3::z_axis(), angle);
            let (extracted, axis) = pose.log_rotation();
            assert!(extracted > -PI && extracted <= PI);
            let back = Pose::from_axis_angle(&axis, extracted);
            assert_relative_eq!(*back.rotation(), *pose.rotation(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_log_rotation_wraps_past_pi() {
        // A 3*PI/2 turn about z is the same rotation as -PI/2; the
        // extracted branch must stay in (-PI, PI] and reconstruct it.
        let pose = Pose::from_axis_angle(&Vector3::z_axis(), 3.0 * PI / 2.0);
        let (angle, axis) = pose.log_rotation();
        assert!(angle.abs() <= PI);
        let back = Pose::from_axis_angle(&axis, angle);
        assert_relative_eq!(*back.rotation(), *pose.rotation(), epsilon = 1e-9);
    }

    #[test]
    fn test_log_rotation_identity() {
        let (angle, _) = Pose::identity().log_rotation();
        assert_relative_eq!(angle, 0.0);
    }

    #[test]
    fn test_interp_rigid_endpoints() {
        let v = Vector3::new(2.0, 0.0, -1.0);
        let axis = Vector3::z_axis();
        let zero = Pose::interp_rigid(0.0, 0.0, &v, 1.2, &axis);
        assert_pose_eq(&zero, &Pose::identity(), 1e-12);

        let full = Pose::interp_rigid(1.0, 1.0, &v, 1.2, &axis);
        let expected = Pose::from_translation(v) * Pose::from_axis_angle(&axis, 1.2);
        assert_pose_eq(&full, &expected, 1e-12);
    }

    #[test]
    fn test_interp_rigid_halves_compose() {
        // Two half-steps of a pure rotation equal the full rotation.
        let axis = Vector3::y_axis();
        let half = Pose::interp_rigid(0.0, 0.5, &Vector3::zeros(), 1.0, &axis);
        let full = Pose::from_axis_angle(&axis, 1.0);
        assert_pose_eq(&(half * half), &full, 1e-12);
    }

    #[test]
    fn test_normalize_rotation_recovers_so3() {
        let mut pose = Pose::from_axis_angle(&Vector3::z_axis(), 0.4);
        let mut drifted = *pose.rotation();
        drifted[(0, 0)] += 1e-4;
        drifted[(1, 2)] -= 1e-4;
        pose.set_rotation(drifted);
        pose.normalize_rotation();
        let gram = pose.rotation().transpose() * pose.rotation();
        assert_relative_eq!(gram, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_conjugation_roundtrip() {
        // Rewriting an update into a local frame and back is lossless.
        let frame = Pose::from_parts(
            Vector3::new(0.5, -1.0, 2.0),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.8),
        );
        let update = Pose::from_parts(
            Vector3::new(-0.2, 0.1, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -0.3),
        );
        let local = frame.inverse() * &update * &frame;
        let world = &frame * local * frame.inverse();
        assert_pose_eq(&world, &update, 1e-10);
    }
}
