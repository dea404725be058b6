//! Rigid-body kinematics for a single particle.
//!
//! One step of a free particle follows the trapezoidal half-step scheme:
//!
//! 1. [`calc_acceleration`] turns accumulated loads into `a` and `α`
//! 2. [`begin_motion`] advances the velocities by `½·dt`, records the
//!    mid-step values as the averaged velocities and plans the motion
//! 3. constraints may adjust velocities and the pending motion
//! 4. [`apply_motion`] moves the surface, center of gravity and orientation
//! 5. [`half_step`] closes the step with the second `½·dt` velocity update
//!
//! [`advance`] runs the whole sequence for an unconstrained particle.
//!
//! # Example
//!
//! ```
//! use sim_core::kinematics;
//! use sim_types::{Particle, ParticleId, PopulationId, SurfaceMesh, Vector3};
//!
//! let mut particle = Particle::new(
//!     ParticleId::new(0),
//!     PopulationId(0),
//!     0.0,
//!     SurfaceMesh::cube(0.5),
//!     1000.0,
//! )
//! .unwrap();
//!
//! // 1 kN along x on a 1000 kg body
//! particle.state.total_force = Vector3::new(1000.0, 0.0, 0.0);
//! kinematics::advance(&mut particle, 0.1).unwrap();
//!
//! assert!((particle.state.velocity.x - 0.1).abs() < 1e-12);
//! assert!((particle.state.cg.x - 0.005).abs() < 1e-12);
//! ```

use nalgebra::{Matrix3, Vector3};
use sim_types::{Particle, PendingMotion, Result, SimError};

use crate::rotation::{compose, incremental_rotation};

/// `J⁻¹ · (τ − ω × (J·ω))`.
///
/// A singular tensor is reported, never regularized.
pub fn angular_acceleration(
    inertia: &Matrix3<f64>,
    torque: &Vector3<f64>,
    omega: &Vector3<f64>,
) -> Result<Vector3<f64>> {
    let inverse = inertia
        .try_inverse()
        .ok_or_else(|| SimError::singular_inertia("angular acceleration"))?;
    let gyroscopic = omega.cross(&(inertia * omega));
    Ok(inverse * (torque - gyroscopic))
}

/// Compute linear and angular acceleration from the accumulated and
/// injected loads.
pub fn calc_acceleration(particle: &mut Particle) -> Result<()> {
    let force = particle.state.total_force + particle.injected.force;
    let torque = particle.state.total_torque + particle.injected.torque;

    let acceleration = force / particle.mass() + particle.injected.acceleration;
    let alpha = angular_acceleration(&particle.state.inertia, &torque, &particle.state.omega)
        .map_err(|_| SimError::singular_inertia(format!("inertia of {}", particle.id)))?;

    particle.state.acceleration = acceleration;
    particle.state.angular_acceleration = alpha;
    Ok(())
}

/// Advance velocity and angular velocity by half a step.
pub fn half_step(particle: &mut Particle, dt: f64) {
    let state = &mut particle.state;
    state.velocity += 0.5 * dt * state.acceleration;
    state.omega += 0.5 * dt * state.angular_acceleration;
}

/// Pending motion implied by the averaged velocities over `dt`.
#[must_use]
pub fn motion_from_averages(particle: &Particle, dt: f64) -> PendingMotion {
    PendingMotion {
        displacement: particle.state.averaged_velocity * dt,
        rotation: incremental_rotation(&particle.state.averaged_omega, dt),
    }
}

/// Replace the pending motion with the one implied by the averaged velocities.
pub fn plan_motion(particle: &mut Particle, dt: f64) {
    particle.pending = motion_from_averages(particle, dt);
}

/// First half of a free particle's step.
///
/// Velocities advance by `½·dt`; the mid-step values become the averaged
/// velocities that move the body.
pub fn begin_motion(particle: &mut Particle, dt: f64) {
    half_step(particle, dt);
    particle.state.averaged_velocity = particle.state.velocity;
    particle.state.averaged_omega = particle.state.omega;
    plan_motion(particle, dt);
}

/// Apply the pending motion and reset it.
///
/// The rotation is about the body's own center of gravity before the
/// translation. The orientation is composed and renormalized, the inertia
/// tensor is recomputed about the new center of gravity.
pub fn apply_motion(particle: &mut Particle) {
    let PendingMotion {
        displacement,
        rotation,
    } = std::mem::take(&mut particle.pending);

    let cg = particle.state.cg;
    particle.surface.transform(&rotation, &cg, &displacement);

    let state = &mut particle.state;
    state.cg += displacement;
    state.displacement += displacement;
    state.orientation = compose(&rotation, &state.orientation);

    particle.refresh_inertia();
}

/// Close the step with the second half-step unless the velocity was imposed.
pub fn finish_motion(particle: &mut Particle, dt: f64) {
    if particle.flags.prescribed_velocity || particle.flags.deposited {
        return;
    }
    half_step(particle, dt);
}

/// Run a complete unconstrained step.
pub fn advance(particle: &mut Particle, dt: f64) -> Result<()> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(SimError::InvalidTimestep(dt));
    }
    calc_acceleration(particle)?;
    begin_motion(particle, dt);
    apply_motion(particle);
    finish_motion(particle, dt);
    Ok(())
}
