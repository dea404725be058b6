//! Velocity-stage constraints.
//!
//! Velocity constraints run after the first half-step. A constraint that
//! imposes a velocity marks the particle `prescribed_velocity`, which skips
//! the second half-step.

use std::time::Duration;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sim_contact::{bounce, deposit, BounceParams, DepositionParams};
use sim_types::{Dict, Particle, ParticleFlags, Result, SimError};

use crate::constraint::{Constraint, ConstraintCategory, ParticleSelection, StepContext};
use crate::external::{MoveSource, SupervisedCommand};

/// Imposes a constant velocity.
#[derive(Debug, Clone)]
pub struct StaticVelocity {
    selection: ParticleSelection,
    velocity: Vector3<f64>,
}

impl StaticVelocity {
    /// Registry name.
    pub const NAME: &'static str = "staticVelocity";

    /// Build from `staticVelocity`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            velocity: dict.vector("staticVelocity", Self::NAME)?,
        })
    }
}

impl Constraint for StaticVelocity {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Velocity
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, _ctx: &StepContext<'_>) -> Result<()> {
        particle.state.velocity = self.velocity;
        particle.state.averaged_velocity = self.velocity;
        particle.flags.prescribed_velocity = true;
        Ok(())
    }
}

/// Imposes a constant angular velocity.
#[derive(Debug, Clone)]
pub struct StaticOmega {
    selection: ParticleSelection,
    omega: Vector3<f64>,
}

impl StaticOmega {
    /// Registry name.
    pub const NAME: &'static str = "staticOmega";

    /// Build from `staticOmega`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            omega: dict.vector("staticOmega", Self::NAME)?,
        })
    }
}

impl Constraint for StaticOmega {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Velocity
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, _ctx: &StepContext<'_>) -> Result<()> {
        particle.state.omega = self.omega;
        particle.state.averaged_omega = self.omega;
        particle.flags.prescribed_velocity = true;
        Ok(())
    }
}

/// Drives a particle with velocities read from a file.
///
/// The acceleration is set to the change of velocity over the step, then
/// the velocities are replaced by the target.
#[derive(Debug, Clone)]
pub struct MoveFile {
    selection: ParticleSelection,
    source: MoveSource,
}

impl MoveFile {
    /// Registry name.
    pub const NAME: &'static str = "moveFile";

    /// Create from a move source.
    #[must_use]
    pub fn new(source: MoveSource) -> Self {
        Self {
            selection: ParticleSelection::All,
            source,
        }
    }

    /// Build from `moveFile` and the optional `moveUpdate*` keys.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        let mut source = MoveSource::new(dict.word("moveFile", Self::NAME)?)
            .with_interval(dict.scalar_or("moveUpdateInterval", 0.0)?);
        if let Some(command) = dict.word_opt("moveUpdateCommand")? {
            let timeout = dict.scalar_or("moveUpdateTimeout", 60.0)?;
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(SimError::invalid_config(format!(
                    "{}: moveUpdateTimeout must be positive",
                    Self::NAME
                )));
            }
            let retries = u32::try_from(dict.count_or("moveUpdateRetries", 0)?)
                .map_err(|_| SimError::invalid_config("moveUpdateRetries is too large"))?;
            source = source.with_command(
                SupervisedCommand::new(command)
                    .with_timeout(Duration::from_secs_f64(timeout))
                    .with_retries(retries),
            );
        }
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            source,
        })
    }
}

impl Constraint for MoveFile {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Velocity
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, ctx: &StepContext<'_>) -> Result<()> {
        let source = &mut self.source;
        let target = ctx.decide(particle, || source.target(ctx.time, ctx.dt))?;

        let state = &mut particle.state;
        state.acceleration = (target.velocity - state.velocity) / ctx.dt;
        state.angular_acceleration = (target.omega - state.omega) / ctx.dt;
        state.velocity = target.velocity;
        state.averaged_velocity = target.velocity;
        state.omega = target.omega;
        state.averaged_omega = target.omega;
        particle.flags.prescribed_velocity = true;
        Ok(())
    }
}

/// Velocities and flags after a wall response, as decided by one owner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WallResponse {
    velocity: Vector3<f64>,
    averaged_velocity: Vector3<f64>,
    omega: Vector3<f64>,
    averaged_omega: Vector3<f64>,
    flags: ParticleFlags,
}

impl WallResponse {
    fn capture(particle: &Particle) -> Self {
        let state = &particle.state;
        Self {
            velocity: state.velocity,
            averaged_velocity: state.averaged_velocity,
            omega: state.omega,
            averaged_omega: state.averaged_omega,
            flags: particle.flags,
        }
    }

    fn restore(self, particle: &mut Particle) {
        let state = &mut particle.state;
        state.velocity = self.velocity;
        state.averaged_velocity = self.averaged_velocity;
        state.omega = self.omega;
        state.averaged_omega = self.averaged_omega;
        particle.flags = self.flags;
    }
}

/// Runs `respond` on the deciding owner and copies its result to the others.
fn respond_on_master(
    particle: &mut Particle,
    ctx: &StepContext<'_>,
    respond: impl FnOnce(&mut Particle),
) -> Result<()> {
    let owners = particle.owners.clone();
    let response = ctx.decide_among(&owners, particle.master, || {
        respond(particle);
        Ok(WallResponse::capture(particle))
    })?;
    response.restore(particle);
    Ok(())
}

/// Restitution, friction and adhesion at walls.
#[derive(Debug, Clone)]
pub struct WallBounce {
    selection: ParticleSelection,
    params: BounceParams,
}

impl WallBounce {
    /// Registry name.
    pub const NAME: &'static str = "wallBounce";

    /// Create from bounce parameters.
    pub fn new(params: BounceParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            selection: ParticleSelection::All,
            params,
        })
    }

    /// Build from `restitution`, `friction`, `yieldPressure`, `hamaker`,
    /// `cutoffDistance`, `contactDistance` and `solidThreshold`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        let defaults = BounceParams::default();
        let params = BounceParams {
            restitution: dict.scalar("restitution", Self::NAME)?,
            friction: dict.scalar_or("friction", defaults.friction)?,
            yield_pressure: dict.scalar_or("yieldPressure", defaults.yield_pressure)?,
            hamaker: dict.scalar_or("hamaker", defaults.hamaker)?,
            cutoff_distance: dict.scalar_or("cutoffDistance", defaults.cutoff_distance)?,
            contact_distance: dict.scalar_or("contactDistance", defaults.contact_distance)?,
            solid_threshold: dict.scalar_or("solidThreshold", defaults.solid_threshold)?,
        };
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            ..Self::new(params)?
        })
    }
}

impl Constraint for WallBounce {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Velocity
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, ctx: &StepContext<'_>) -> Result<()> {
        let params = self.params;
        respond_on_master(particle, ctx, |p| {
            bounce(p, ctx.host, &params);
        })
    }
}

/// Wall-normal projection and deposition of adhered particles.
#[derive(Debug, Clone)]
pub struct Deposition {
    selection: ParticleSelection,
    params: DepositionParams,
}

impl Deposition {
    /// Registry name.
    pub const NAME: &'static str = "deposition";

    /// Create from deposition parameters.
    pub fn new(params: DepositionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            selection: ParticleSelection::All,
            params,
        })
    }

    /// Build from `contactDistance`, `solidThreshold` and `depositionSpeed`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        let defaults = DepositionParams::default();
        let params = DepositionParams {
            contact_distance: dict.scalar("contactDistance", Self::NAME)?,
            solid_threshold: dict.scalar("solidThreshold", Self::NAME)?,
            deposition_speed: dict.scalar_or("depositionSpeed", defaults.deposition_speed)?,
        };
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            ..Self::new(params)?
        })
    }
}

impl Constraint for Deposition {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Velocity
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, ctx: &StepContext<'_>) -> Result<()> {
        let params = self.params;
        respond_on_master(particle, ctx, |p| {
            deposit(p, ctx.host, &params, ctx.time);
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use sim_core::{ParticleSeed, Population, SingleRank, UniformGridMesh};
    use sim_types::{DictValue, SurfaceMesh};

    fn floor() -> UniformGridMesh {
        UniformGridMesh::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0), [10, 10, 10])
            .unwrap()
            .with_wall(Point3::new(0.0, 0.0, 0.1), Vector3::z())
            .unwrap()
    }

    fn cube_at(z: f64, velocity: Vector3<f64>) -> Particle {
        let mut population = Population::serial();
        let handle = population
            .seed(
                &ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0)
                    .displacement(Vector3::new(0.5, 0.5, z))
                    .velocity(velocity),
                0.0,
            )
            .unwrap();
        population.remove(handle).unwrap()
    }

    #[test]
    fn test_move_file_sets_target_and_acceleration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"1 2 3 4 5 6").unwrap();
        let dict = Dict::new().with(
            "moveFile",
            DictValue::Word(file.path().display().to_string()),
        );
        let mut constraint = MoveFile::from_dict(&dict).unwrap();

        let host = floor();
        let dt = 0.01;
        let ctx = StepContext::new(0.01, dt, &host, &SingleRank);
        let v0 = Vector3::new(0.5, -0.25, 0.0);
        let w0 = Vector3::new(0.0, 0.0, 1.0);
        let mut p = cube_at(0.5, v0);
        p.state.omega = w0;

        constraint.constrain(&mut p, &ctx).unwrap();
        assert_eq!(p.state.velocity, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(p.state.averaged_velocity, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(p.state.omega, Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(p.state.acceleration, (Vector3::new(1.0, 2.0, 3.0) - v0) / dt);
        assert_eq!(p.state.angular_acceleration, (Vector3::new(4.0, 5.0, 6.0) - w0) / dt);
        assert!(p.flags.prescribed_velocity);
    }

    #[test]
    fn test_static_velocity_and_omega() {
        let host = floor();
        let ctx = StepContext::new(0.0, 1e-3, &host, &SingleRank);
        let mut p = cube_at(0.5, Vector3::new(9.0, 9.0, 9.0));

        let dict = Dict::new().with("staticVelocity", DictValue::Vector([0.0, 1.0, 0.0]));
        StaticVelocity::from_dict(&dict)
            .unwrap()
            .constrain(&mut p, &ctx)
            .unwrap();
        let dict = Dict::new().with("staticOmega", DictValue::Vector([0.0, 0.0, 2.0]));
        StaticOmega::from_dict(&dict)
            .unwrap()
            .constrain(&mut p, &ctx)
            .unwrap();

        assert_eq!(p.state.velocity, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(p.state.averaged_velocity, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(p.state.averaged_omega, Vector3::new(0.0, 0.0, 2.0));
        assert!(p.flags.prescribed_velocity);
    }

    #[test]
    fn test_wall_bounce_from_dict() {
        let host = floor();
        let ctx = StepContext::new(0.0, 1e-3, &host, &SingleRank);
        let dict = Dict::new()
            .with("restitution", DictValue::Scalar(0.8))
            .with("contactDistance", DictValue::Scalar(0.005));
        let mut constraint = WallBounce::from_dict(&dict).unwrap();

        let mut p = cube_at(0.151, Vector3::new(0.0, 0.0, -1.0));
        constraint.constrain(&mut p, &ctx).unwrap();
        approx::assert_relative_eq!(p.state.velocity.z, 0.8, epsilon = 1e-12);
        assert!(p.flags.prescribed_velocity);
    }

    #[test]
    fn test_wall_bounce_requires_restitution() {
        assert!(matches!(
            WallBounce::from_dict(&Dict::new()),
            Err(SimError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_deposition_freezes_exactly() {
        let host = floor();
        let ctx = StepContext::new(0.2, 1e-3, &host, &SingleRank);
        let dict = Dict::new()
            .with("contactDistance", DictValue::Scalar(0.005))
            .with("solidThreshold", DictValue::Scalar(0.5))
            .with("depositionSpeed", DictValue::Scalar(0.1));
        let mut constraint = Deposition::from_dict(&dict).unwrap();

        let mut p = cube_at(0.151, Vector3::new(0.01, 0.0, -0.3));
        p.flags.sticked = true;
        constraint.constrain(&mut p, &ctx).unwrap();
        assert!(p.flags.deposited);
        assert_eq!(p.flags.deposited_since, Some(0.2));
        assert_eq!(p.state.velocity, Vector3::zeros());
        assert_eq!(p.state.averaged_velocity, Vector3::zeros());
    }
}
