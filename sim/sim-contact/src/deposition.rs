//! Wall deposition.
//!
//! A particle touching a wall cannot move into it: the wall-normal
//! component of its approach velocity is removed. Once an adhered particle
//! slows below the deposition speed it is frozen in place for good.

use nalgebra::Vector3;
use sim_core::HostMesh;
use sim_types::Particle;
use tracing::debug;

use crate::params::DepositionParams;
use crate::wall::wall_contacts;

/// What the deposition step did to one particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositionOutcome {
    /// Not near a wall.
    Free,
    /// Held against at least one wall.
    Constrained,
    /// Deposited on this call.
    Deposited,
    /// Already deposited before this call.
    Frozen,
}

fn freeze(particle: &mut Particle) {
    let state = &mut particle.state;
    state.velocity = Vector3::zeros();
    state.averaged_velocity = Vector3::zeros();
    state.omega = Vector3::zeros();
    state.averaged_omega = Vector3::zeros();
    particle.flags.prescribed_velocity = true;
}

/// Apply the deposition model to one particle at simulation time `time`.
pub fn deposit(
    particle: &mut Particle,
    host: &dyn HostMesh,
    params: &DepositionParams,
    time: f64,
) -> DepositionOutcome {
    if particle.flags.deposited {
        freeze(particle);
        return DepositionOutcome::Frozen;
    }

    let walls = wall_contacts(particle, host, params.contact_distance, params.solid_threshold);
    let mut constrained = false;
    for wall in &walls {
        let n = wall.normal;
        if particle.state.averaged_velocity.dot(&n) < 0.0 {
            let state = &mut particle.state;
            state.velocity -= n * state.velocity.dot(&n);
            state.averaged_velocity -= n * state.averaged_velocity.dot(&n);
            constrained = true;
        }
    }
    if constrained {
        particle.flags.prescribed_velocity = true;
    }

    if particle.flags.sticked
        && !walls.is_empty()
        && particle.state.averaged_velocity.norm() < params.deposition_speed
    {
        particle.flags.deposited = true;
        particle.flags.deposited_since = Some(time);
        freeze(particle);
        debug!(particle = %particle.id, time, "particle deposited");
        return DepositionOutcome::Deposited;
    }

    if constrained {
        DepositionOutcome::Constrained
    } else {
        DepositionOutcome::Free
    }
}
