//! Force-stage constraints.
//!
//! These run first in a step and build up `total_force` and
//! `total_torque` before accelerations are computed.

use nalgebra::Vector3;
use sim_types::{Dict, ForceField, Particle, Result, SimError};
use tracing::warn;

use crate::constraint::{Constraint, ConstraintCategory, ParticleSelection, StepContext};

/// Normalize a configured axis.
///
/// A near-zero axis is reported but still divided by its length, so a bad
/// configuration shows up as non-finite values rather than being masked.
pub(crate) fn configured_axis(axis: Vector3<f64>, constraint: &str) -> Vector3<f64> {
    let length = axis.norm();
    if length < 1e-12 {
        warn!(constraint, ?axis, "configured axis has near-zero length");
    }
    axis / length
}

/// Sums host face forces into total force and torque about the CG.
///
/// On a particle shared by several ranks each owner holds the forces of its
/// own part of the surface; the sums are reduced over the owners.
#[derive(Debug, Clone)]
pub struct SurfaceForce {
    selection: ParticleSelection,
    fields: Vec<ForceField>,
}

impl SurfaceForce {
    /// Registry name.
    pub const NAME: &'static str = "surfaceForce";

    /// Create from the summed fields.
    #[must_use]
    pub fn new(fields: Vec<ForceField>) -> Self {
        Self {
            selection: ParticleSelection::All,
            fields,
        }
    }

    /// Build from `fieldNames`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        let fields = dict
            .words("fieldNames", Self::NAME)?
            .iter()
            .map(|name| {
                ForceField::from_name(name).ok_or_else(|| {
                    SimError::invalid_config(format!("unknown force field '{name}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            fields,
        })
    }
}

impl Constraint for SurfaceForce {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Force
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, ctx: &StepContext<'_>) -> Result<()> {
        let cg = particle.state.cg;
        let mut sums = [0.0; 6];
        for &field in &self.fields {
            let Some(forces) = particle.face_forces(field) else {
                continue;
            };
            for (center, force) in particle.surface.face_centers().iter().zip(forces) {
                let torque = (center - cg).cross(force);
                for a in 0..3 {
                    sums[a] += force[a];
                    sums[3 + a] += torque[a];
                }
            }
        }
        if particle.owners.len() > 1 {
            ctx.comm.all_reduce_sum_within(&particle.owners, &mut sums)?;
        }
        particle.state.total_force += Vector3::new(sums[0], sums[1], sums[2]);
        particle.state.total_torque += Vector3::new(sums[3], sums[4], sums[5]);
        Ok(())
    }
}

/// Weight minus buoyancy: `F += (m − ρ_f·V)·g`.
#[derive(Debug, Clone)]
pub struct Gravity {
    selection: ParticleSelection,
    g: Vector3<f64>,
    rho_name: Option<String>,
    rho: f64,
}

impl Gravity {
    /// Registry name.
    pub const NAME: &'static str = "gravity";

    /// Gravity with a constant fluid density.
    #[must_use]
    pub fn new(g: Vector3<f64>, rho: f64) -> Self {
        Self {
            selection: ParticleSelection::All,
            g,
            rho_name: None,
            rho,
        }
    }

    /// Build from `g`, `rhoName` or `rho`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            g: dict.vector("g", Self::NAME)?,
            rho_name: dict.word_opt("rhoName")?.map(str::to_string),
            rho: dict.scalar_or("rho", 0.0)?,
        })
    }

    fn fluid_density(&self, ctx: &StepContext<'_>) -> Result<f64> {
        match &self.rho_name {
            None => Ok(self.rho),
            Some(name) => ctx.host.uniform_scalar(name).ok_or_else(|| {
                SimError::invalid_config(format!("host has no uniform field '{name}'"))
            }),
        }
    }
}

impl Constraint for Gravity {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Force
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, ctx: &StepContext<'_>) -> Result<()> {
        let rho = self.fluid_density(ctx)?;
        let effective_mass = particle.mass() - rho * particle.volume();
        particle.state.total_force += effective_mass * self.g;
        Ok(())
    }
}

/// Adds a constant force and torque.
#[derive(Debug, Clone)]
pub struct AddForce {
    selection: ParticleSelection,
    force: Vector3<f64>,
    torque: Vector3<f64>,
}

impl AddForce {
    /// Registry name.
    pub const NAME: &'static str = "addForce";

    /// Build from `addForce` and optional `addTorque`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            force: dict.vector("addForce", Self::NAME)?,
            torque: dict.vector_or("addTorque", Vector3::zeros())?,
        })
    }
}

impl Constraint for AddForce {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Force
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, _ctx: &StepContext<'_>) -> Result<()> {
        particle.state.total_force += self.force;
        particle.state.total_torque += self.torque;
        Ok(())
    }
}

/// Keeps only the force component along an axis.
#[derive(Debug, Clone)]
pub struct FixedAxisForce {
    selection: ParticleSelection,
    axis: Vector3<f64>,
}

impl FixedAxisForce {
    /// Registry name.
    pub const NAME: &'static str = "fixedAxisForce";

    /// Project onto `axis` (normalized here).
    #[must_use]
    pub fn new(axis: Vector3<f64>) -> Self {
        Self {
            selection: ParticleSelection::All,
            axis: configured_axis(axis, Self::NAME),
        }
    }

    /// Build from `fixedAxis`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            ..Self::new(dict.vector("fixedAxis", Self::NAME)?)
        })
    }
}

impl Constraint for FixedAxisForce {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Force
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, _ctx: &StepContext<'_>) -> Result<()> {
        let force = particle.state.total_force;
        particle.state.total_force = self.axis * force.dot(&self.axis);
        Ok(())
    }
}

/// Replaces the torque with a constant.
#[derive(Debug, Clone)]
pub struct StaticTorque {
    selection: ParticleSelection,
    torque: Vector3<f64>,
}

impl StaticTorque {
    /// Registry name.
    pub const NAME: &'static str = "staticTorque";

    /// Build from `staticTorque`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            torque: dict.vector("staticTorque", Self::NAME)?,
        })
    }
}

impl Constraint for StaticTorque {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Force
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, _ctx: &StepContext<'_>) -> Result<()> {
        particle.state.total_torque = self.torque;
        Ok(())
    }
}
