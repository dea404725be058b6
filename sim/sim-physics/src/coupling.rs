//! Per-particle property schema of the DEM coupling.
//!
//! A coupled DEM code pushes and pulls named per-particle arrays. Each
//! [`CouplingProperty`] maps one name to a fixed number of scalars read
//! from, or written into, a [`Particle`].
//!
//! | name | width | export | import |
//! |------|-------|--------|--------|
//! | `x` | 3 | center of gravity | moves the body rigidly |
//! | `v` | 3 | velocity | velocity and averaged velocity |
//! | `radius` | 1 | volume-equivalent radius | read-only |
//! | `omega` | 3 | angular velocity | angular and averaged angular velocity |
//! | `type` | 1 | population | read-only |
//! | `density` | 1 | density | read-only |
//! | `id` | 1 | identifier | read-only |
//! | `collforce` | 3 | injected force | injected force |
//! | `hdtorque` | 3 | hydrodynamic torque | read-only |
//! | `dispersionTime` | 1 | release time | release time |
//! | `dispersionVel` | 3 | release velocity | release velocity |
//! | `fiber_axis` | 3 | body x axis in world frame | read-only |
//! | `fiber_ends` | 6 | both ends along the fiber axis | read-only |

use std::fmt;
use std::str::FromStr;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use sim_types::{Particle, Result, SimError};

/// One named coupling property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CouplingProperty {
    /// `x`
    Position,
    /// `v`
    Velocity,
    /// `radius`
    Radius,
    /// `omega`
    Omega,
    /// `type`
    Type,
    /// `density`
    Density,
    /// `id`
    Id,
    /// `collforce`
    CollisionForce,
    /// `hdtorque`
    HydrodynamicTorque,
    /// `dispersionTime`
    DispersionTime,
    /// `dispersionVel`
    DispersionVelocity,
    /// `fiber_axis`
    FiberAxis,
    /// `fiber_ends`
    FiberEnds,
}

impl CouplingProperty {
    /// Every property.
    pub const ALL: [Self; 13] = [
        Self::Position,
        Self::Velocity,
        Self::Radius,
        Self::Omega,
        Self::Type,
        Self::Density,
        Self::Id,
        Self::CollisionForce,
        Self::HydrodynamicTorque,
        Self::DispersionTime,
        Self::DispersionVelocity,
        Self::FiberAxis,
        Self::FiberEnds,
    ];

    /// Name in the coupling schema.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "x",
            Self::Velocity => "v",
            Self::Radius => "radius",
            Self::Omega => "omega",
            Self::Type => "type",
            Self::Density => "density",
            Self::Id => "id",
            Self::CollisionForce => "collforce",
            Self::HydrodynamicTorque => "hdtorque",
            Self::DispersionTime => "dispersionTime",
            Self::DispersionVelocity => "dispersionVel",
            Self::FiberAxis => "fiber_axis",
            Self::FiberEnds => "fiber_ends",
        }
    }

    /// Look up a property by its schema name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| SimError::invalid_config(format!("unknown coupling property '{name}'")))
    }

    /// Scalars per particle.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Radius | Self::Type | Self::Density | Self::Id | Self::DispersionTime => 1,
            Self::FiberEnds => 6,
            _ => 3,
        }
    }

    /// Whether the DEM side may write this property.
    #[must_use]
    pub const fn is_importable(self) -> bool {
        matches!(
            self,
            Self::Position
                | Self::Velocity
                | Self::Omega
                | Self::CollisionForce
                | Self::DispersionTime
                | Self::DispersionVelocity
        )
    }

    /// Read the property from a particle.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // identifiers stay far below 2^53
    pub fn export(self, particle: &Particle) -> Vec<f64> {
        let state = &particle.state;
        match self {
            Self::Position => state.cg.coords.as_slice().to_vec(),
            Self::Velocity => state.velocity.as_slice().to_vec(),
            Self::Radius => vec![particle.equivalent_radius()],
            Self::Omega => state.omega.as_slice().to_vec(),
            Self::Type => vec![f64::from(particle.population.0)],
            Self::Density => vec![particle.density()],
            Self::Id => vec![particle.id.raw() as f64],
            Self::CollisionForce => particle.injected.force.as_slice().to_vec(),
            Self::HydrodynamicTorque => state.total_torque.as_slice().to_vec(),
            Self::DispersionTime => vec![particle.dispersion_time],
            Self::DispersionVelocity => particle.dispersion_velocity.as_slice().to_vec(),
            Self::FiberAxis => fiber_axis(particle).as_slice().to_vec(),
            Self::FiberEnds => {
                let axis = fiber_axis(particle);
                let half = particle.surface.bounding_radius(&state.cg);
                let head = state.cg + axis * half;
                let tail = state.cg - axis * half;
                vec![head.x, head.y, head.z, tail.x, tail.y, tail.z]
            }
        }
    }

    /// Write the property into a particle.
    ///
    /// `values` must hold exactly [`width`](Self::width) scalars.
    pub fn import(self, particle: &mut Particle, values: &[f64]) -> Result<()> {
        let read_only =
            || SimError::invalid_config(format!("coupling property '{self}' is read-only"));
        if !self.is_importable() {
            return Err(read_only());
        }
        if values.len() != self.width() {
            return Err(SimError::invalid_config(format!(
                "coupling property '{self}' takes {} values, got {}",
                self.width(),
                values.len()
            )));
        }
        let vector = || Vector3::new(values[0], values[1], values[2]);
        match self {
            Self::Position => {
                let shift = vector() - particle.state.cg.coords;
                let cg = particle.state.cg;
                particle
                    .surface
                    .transform(&UnitQuaternion::identity(), &cg, &shift);
                particle.state.cg += shift;
                particle.state.displacement += shift;
            }
            Self::Velocity => {
                particle.state.velocity = vector();
                particle.state.averaged_velocity = vector();
            }
            Self::Omega => {
                particle.state.omega = vector();
                particle.state.averaged_omega = vector();
            }
            Self::CollisionForce => particle.injected.force = vector(),
            Self::DispersionTime => particle.dispersion_time = values[0],
            Self::DispersionVelocity => particle.dispersion_velocity = vector(),
            _ => return Err(read_only()),
        }
        Ok(())
    }
}

fn fiber_axis(particle: &Particle) -> Vector3<f64> {
    particle.state.orientation * Vector3::x()
}

impl fmt::Display for CouplingProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CouplingProperty {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Export one property for a sequence of particles, flattened.
pub fn export_all<'a>(
    property: CouplingProperty,
    particles: impl IntoIterator<Item = &'a Particle>,
) -> Vec<f64> {
    particles
        .into_iter()
        .flat_map(|p| property.export(p))
        .collect()
}
