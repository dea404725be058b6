//! Incremental rotations.
//!
//! Orientation is carried as a unit quaternion. Each step composes a small
//! rotation built from `ω·dt` and renormalizes, so the rotation tensor stays
//! orthonormal however many steps are taken.

use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};

/// Rotation angles below this are treated as no rotation at all.
pub const MIN_ROTATION_ANGLE: f64 = 1e-12;

/// Rotation by the vector `omega * dt`.
///
/// The axis is the normalized rotation vector and the angle is its length
/// reduced modulo 2π. Below [`MIN_ROTATION_ANGLE`] the identity is returned.
#[must_use]
pub fn incremental_rotation(omega: &Vector3<f64>, dt: f64) -> UnitQuaternion<f64> {
    let rotation_vector = omega * dt;
    let angle = rotation_vector.norm();
    if !angle.is_finite() || angle < MIN_ROTATION_ANGLE {
        return UnitQuaternion::identity();
    }
    let axis = Unit::new_unchecked(rotation_vector / angle);
    UnitQuaternion::from_axis_angle(&axis, angle % std::f64::consts::TAU)
}

/// Rotation of `angle` radians about an arbitrary axis.
///
/// Returns `None` when the axis has no usable direction.
#[must_use]
pub fn axis_angle(axis: &Vector3<f64>, angle: f64) -> Option<UnitQuaternion<f64>> {
    Unit::try_new(*axis, MIN_ROTATION_ANGLE).map(|axis| UnitQuaternion::from_axis_angle(&axis, angle))
}

/// Rotate `point` about `center`.
#[must_use]
pub fn rotate_about(
    rotation: &UnitQuaternion<f64>,
    point: &Point3<f64>,
    center: &Point3<f64>,
) -> Point3<f64> {
    center + rotation * (point - center)
}

/// Compose `step` onto `orientation` and renormalize.
#[must_use]
pub fn compose(
    step: &UnitQuaternion<f64>,
    orientation: &UnitQuaternion<f64>,
) -> UnitQuaternion<f64> {
    let mut composed = step * orientation;
    composed.renormalize();
    composed
}

/// Express `inner` in a frame rotated by `outer`: `outer · inner · outer⁻¹`.
#[must_use]
pub fn conjugate(
    outer: &UnitQuaternion<f64>,
    inner: &UnitQuaternion<f64>,
) -> UnitQuaternion<f64> {
    outer * inner * outer.inverse()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_small_rotation_is_identity() {
        let q = incremental_rotation(&Vector3::new(1e-14, 0.0, 0.0), 1.0);
        assert_eq!(q, UnitQuaternion::identity());
    }

    #[test]
    fn test_quarter_turn() {
        let q = incremental_rotation(&Vector3::new(0.0, 0.0, FRAC_PI_2), 1.0);
        let v = q * Vector3::x();
        assert_relative_eq!(v, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_then_unrotate_is_identity() {
        let axis = Vector3::new(1.0, -2.0, 0.5);
        for theta in [0.1, 1.0, PI, 5.0] {
            let forward = axis_angle(&axis, theta).unwrap();
            let back = axis_angle(&axis, -theta).unwrap();
            let combined = compose(&back, &forward);
            assert_relative_eq!(combined.angle(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_angle_reduced_modulo_full_turn() {
        let omega = Vector3::new(0.0, 0.0, 1.0);
        let a = incremental_rotation(&omega, 0.5);
        let b = incremental_rotation(&omega, 0.5 + 2.0 * PI);
        assert_relative_eq!((a * Vector3::x()), (b * Vector3::x()), epsilon = 1e-9);
    }

    #[test]
    fn test_repeated_composition_stays_orthonormal() {
        let step = incremental_rotation(&Vector3::new(3.0, -1.0, 7.0), 1e-3);
        let mut q = UnitQuaternion::identity();
        for _ in 0..100_000 {
            q = compose(&step, &q);
        }
        let r = q.to_rotation_matrix().into_inner();
        let should_be_identity = r.transpose() * r;
        assert_relative_eq!(should_be_identity, nalgebra::Matrix3::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_rotate_about_center() {
        let q = axis_angle(&Vector3::z(), FRAC_PI_2).unwrap();
        let p = rotate_about(&q, &Point3::new(2.0, 1.0, 0.0), &Point3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.0, 2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_axis_rejected() {
        assert!(axis_angle(&Vector3::zeros(), 1.0).is_none());
    }
}
