//! Cyclic sector wrap.
//!
//! In a rotationally periodic domain only one sector is meshed. A particle
//! whose predicted center leaves the sector is rotated back about the
//! periodic axis as a whole: geometry, orientation, velocities and the
//! pending motion all turn by the same quaternion.

use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};
use sim_core::rotation::{compose, conjugate, rotate_about, MIN_ROTATION_ANGLE};
use sim_types::{Particle, Result, SimError};
use tracing::trace;

/// A rotationally periodic sector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclicSector {
    origin: Point3<f64>,
    axis: Unit<Vector3<f64>>,
    span: Unit<Vector3<f64>>,
    half_angle: f64,
}

impl CyclicSector {
    /// Sector around `axis` through `origin`, centered on the direction
    /// `span` and extending `sector_angle_deg` to either side.
    pub fn new(
        origin: Point3<f64>,
        axis: Vector3<f64>,
        span: Vector3<f64>,
        sector_angle_deg: f64,
    ) -> Result<Self> {
        let axis = Unit::try_new(axis, MIN_ROTATION_ANGLE)
            .ok_or_else(|| SimError::invalid_config("cyclic axis must be nonzero"))?;
        let span = Unit::try_new(span - axis.into_inner() * span.dot(&*axis), MIN_ROTATION_ANGLE)
            .ok_or_else(|| SimError::invalid_config("cyclic span must not be parallel to the axis"))?;
        if !(sector_angle_deg > 0.0 && sector_angle_deg <= 180.0) {
            return Err(SimError::invalid_config(format!(
                "sector angle {sector_angle_deg} must be in (0, 180] degrees"
            )));
        }
        Ok(Self {
            origin,
            axis,
            span,
            half_angle: sector_angle_deg.to_radians(),
        })
    }

    /// Half-angle of the sector in radians.
    #[must_use]
    pub fn half_angle(&self) -> f64 {
        self.half_angle
    }

    /// Signed angle of `point` from the span direction, measured about the axis.
    ///
    /// `None` for points on the axis.
    #[must_use]
    pub fn phi(&self, point: &Point3<f64>) -> Option<f64> {
        let axis = self.axis.into_inner();
        let span = self.span.into_inner();
        let r = point - self.origin;
        let radial = r - axis * r.dot(&axis);
        if radial.norm() < MIN_ROTATION_ANGLE {
            return None;
        }
        let sin = span.cross(&radial).dot(&axis);
        let cos = span.dot(&radial);
        Some(sin.atan2(cos))
    }

    /// Rotate `particle` back into the sector if its predicted center left it.
    ///
    /// Returns the applied rotation angle.
    pub fn wrap(&self, particle: &mut Particle) -> Option<f64> {
        let predicted = particle.state.cg + particle.pending.displacement;
        let phi = self.phi(&predicted)?;
        if phi.abs() <= self.half_angle {
            return None;
        }

        let angle = -phi;
        let q = UnitQuaternion::from_axis_angle(&self.axis, angle);
        let origin = self.origin;
        let density = particle.density();

        particle
            .surface
            .map_points(|p| rotate_about(&q, p, &origin));
        let state = &mut particle.state;
        state.cg = rotate_about(&q, &state.cg, &origin);
        state.orientation = compose(&q, &state.orientation);
        state.velocity = q * state.velocity;
        state.averaged_velocity = q * state.averaged_velocity;
        state.omega = q * state.omega;
        state.averaged_omega = q * state.averaged_omega;
        state.inertia = particle.surface.inertia_about(&state.cg, density);

        let pending = &mut particle.pending;
        pending.displacement = q * pending.displacement;
        pending.rotation = conjugate(&q, &pending.rotation);

        trace!(particle = %particle.id, angle, "cyclic wrap");
        Some(angle)
    }
}
