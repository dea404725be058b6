//! Particle-wall impact.
//!
//! The impact is resolved in a local orthonormal frame `(t, n, b)`: `n` is
//! the wall normal, `t` the direction of the tangential velocity and
//! `b = t × n`. The normal component is reversed and scaled by the
//! restitution coefficient. Tangential slip of the contact point is
//! reduced by a Coulomb impulse: if friction can stop the slip the
//! particle leaves rolling, otherwise it keeps sliding.

use nalgebra::Vector3;
use sim_core::HostMesh;
use sim_types::Particle;
use tracing::debug;

use crate::params::BounceParams;
use crate::wall::{wall_contacts, WallContact};

/// Slip reduction of a solid sphere that ends an impact rolling.
pub const ROLLING_FRACTION: f64 = 2.0 / 7.0;

const SMALL_SPEED: f64 = 1e-15;

/// Result of one impact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpactOutcome {
    /// Kinetic energy is absorbed; the particle adheres to the wall.
    Adhered,
    /// The particle rebounds.
    Rebound {
        /// Velocity after the impact.
        velocity: Vector3<f64>,
        /// Angular velocity after the impact.
        omega: Vector3<f64>,
    },
}

/// Energy budget of a normal impact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactEnergy {
    /// Kinetic energy of the normal velocity component.
    pub kinetic: f64,
    /// Energy dissipated by plastic deformation.
    pub deformation: f64,
    /// Van der Waals adhesion energy over the contact patch.
    pub adhesion: f64,
    /// Radius of the plastic contact patch.
    pub contact_radius: f64,
}

impl ImpactEnergy {
    /// Energy budget for an impact at normal speed `normal_speed`.
    #[must_use]
    pub fn new(mass: f64, radius: f64, normal_speed: f64, params: &BounceParams) -> Self {
        let e2 = params.restitution * params.restitution;
        let v2 = normal_speed * normal_speed;
        let kinetic = 0.5 * mass * v2;
        let deformation = (1.0 - e2) * kinetic;

        let contact_radius = if params.yield_pressure > 0.0 {
            (2.0 * mass * v2 * (1.0 - e2) * radius / (std::f64::consts::PI * params.yield_pressure))
                .powf(0.25)
        } else {
            0.0
        };
        let adhesion = if params.hamaker > 0.0 && params.cutoff_distance > 0.0 {
            params.hamaker * contact_radius * contact_radius
                / (12.0 * params.cutoff_distance * params.cutoff_distance)
        } else {
            0.0
        };

        Self {
            kinetic,
            deformation,
            adhesion,
            contact_radius,
        }
    }

    /// Whether the impact cannot supply enough energy to rebound.
    #[must_use]
    pub fn adheres(&self) -> bool {
        self.adhesion > 0.0 && self.kinetic <= self.deformation + self.adhesion
    }
}

/// Unit tangent along the tangential part of `velocity`, or any unit
/// vector perpendicular to `normal` when there is none.
fn tangent_direction(velocity: &Vector3<f64>, normal: &Vector3<f64>) -> Vector3<f64> {
    let tangential = velocity - normal * velocity.dot(normal);
    if let Some(t) = tangential.try_normalize(SMALL_SPEED) {
        return t;
    }
    let helper = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (helper - normal * helper.dot(normal)).normalize()
}

/// Resolve an impact of a sphere-like body of `radius` on a wall with unit
/// normal `normal` (pointing into the fluid).
///
/// The incoming velocity must approach the wall (`velocity · normal < 0`);
/// otherwise the state is returned unchanged as a rebound.
#[must_use]
pub fn impact(
    velocity: &Vector3<f64>,
    omega: &Vector3<f64>,
    normal: &Vector3<f64>,
    mass: f64,
    radius: f64,
    params: &BounceParams,
) -> ImpactOutcome {
    let n = *normal;
    let vn = velocity.dot(&n);
    if vn >= 0.0 {
        return ImpactOutcome::Rebound {
            velocity: *velocity,
            omega: *omega,
        };
    }

    if ImpactEnergy::new(mass, radius, vn.abs(), params).adheres() {
        return ImpactOutcome::Adhered;
    }

    let t = tangent_direction(velocity, &n);
    let b = t.cross(&n);
    let (vt, vb) = (velocity.dot(&t), velocity.dot(&b));
    let (wt, wb) = (omega.dot(&t), omega.dot(&b));

    let vn_after = -params.restitution * vn;

    // Slip of the contact point, which sits at -R·n from the center
    let slip = t * (vt + radius * wb) + b * (vb - radius * wt);
    let slip_speed = slip.norm();
    let friction_limit = params.friction * (1.0 + params.restitution) * vn.abs();

    let delta_tangential = if params.friction <= 0.0 || slip_speed < SMALL_SPEED {
        Vector3::zeros()
    } else if ROLLING_FRACTION * slip_speed <= friction_limit {
        -ROLLING_FRACTION * slip
    } else {
        -friction_limit * slip / slip_speed
    };

    let velocity_after = t * vt + b * vb + delta_tangential + n * vn_after;
    let omega_after = if radius > 0.0 {
        omega - (2.5 / radius) * n.cross(&delta_tangential)
    } else {
        *omega
    };

    ImpactOutcome::Rebound {
        velocity: velocity_after,
        omega: omega_after,
    }
}

/// Wall-bounce step for one particle.
///
/// Skips particles that already adhere. The closest wall the averaged
/// velocity approaches is hit; on rebound both instantaneous and averaged
/// velocities are replaced. Returns the wall that was hit.
pub fn bounce(
    particle: &mut Particle,
    host: &dyn HostMesh,
    params: &BounceParams,
) -> Option<(WallContact, ImpactOutcome)> {
    if particle.flags.sticked || particle.flags.deposited {
        return None;
    }
    let approach = particle.state.averaged_velocity;
    let hit = wall_contacts(particle, host, params.contact_distance, params.solid_threshold)
        .into_iter()
        .find(|wall| approach.dot(&wall.normal) < 0.0)?;

    let outcome = impact(
        &particle.state.averaged_velocity,
        &particle.state.averaged_omega,
        &hit.normal,
        particle.mass(),
        particle.equivalent_radius(),
        params,
    );

    match outcome {
        ImpactOutcome::Adhered => {
            particle.flags.sticked = true;
            debug!(particle = %particle.id, cell = hit.cell, "particle adhered to wall");
        }
        ImpactOutcome::Rebound { velocity, omega } => {
            let state = &mut particle.state;
            state.velocity = velocity;
            state.averaged_velocity = velocity;
            state.omega = omega;
            state.averaged_omega = omega;
            particle.flags.prescribed_velocity = true;
        }
    }
    Some((hit, outcome))
}
