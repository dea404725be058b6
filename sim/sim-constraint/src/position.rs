//! Position-stage constraints.
//!
//! These act on the pending motion of a step before it is applied to the
//! surface, the center of gravity and the orientation.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, UnitSphere};
use sim_contact::CyclicSector as Sector;
use sim_types::{Dict, Particle, Result, SimError};
use tracing::trace;

use crate::constraint::{Constraint, ConstraintCategory, ParticleSelection, StepContext};

/// Keeps particles inside one sector of a rotationally periodic domain.
#[derive(Debug, Clone)]
pub struct CyclicSector {
    selection: ParticleSelection,
    sector: Sector,
}

impl CyclicSector {
    /// Registry name.
    pub const NAME: &'static str = "cyclicSector";

    /// Build from `origin`, `axisRot`, `axisSpan` and `sectorAngleDeg`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        let sector = Sector::new(
            dict.point("origin", Self::NAME)?,
            dict.vector("axisRot", Self::NAME)?,
            dict.vector("axisSpan", Self::NAME)?,
            dict.scalar("sectorAngleDeg", Self::NAME)?,
        )?;
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            sector,
        })
    }
}

impl Constraint for CyclicSector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Position
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, _ctx: &StepContext<'_>) -> Result<()> {
        self.sector.wrap(particle);
        Ok(())
    }
}

/// Random displacement of a particle diffusing with coefficient `D`.
///
/// Each of `subcycles` draws has scale `σ = √(2·D·dt/subcycles)`. With
/// constant displacement every draw has length `σ·√3` in a uniformly random
/// direction; otherwise each component is normal with deviation `σ`.
#[derive(Debug, Clone)]
pub struct BrownianMotion {
    selection: ParticleSelection,
    diffusion: f64,
    subcycles: usize,
    constant_length: bool,
    rng: StdRng,
}

impl BrownianMotion {
    /// Registry name.
    pub const NAME: &'static str = "brownianMotion";

    /// Create with a seeded generator.
    pub fn new(diffusion: f64, subcycles: usize, constant_length: bool, seed: u64) -> Result<Self> {
        if !diffusion.is_finite() || diffusion < 0.0 {
            return Err(SimError::invalid_config(format!(
                "{}: diffFactor must be non-negative, got {diffusion}",
                Self::NAME
            )));
        }
        if subcycles == 0 {
            return Err(SimError::invalid_config(format!(
                "{}: subcycles must be at least 1",
                Self::NAME
            )));
        }
        Ok(Self {
            selection: ParticleSelection::All,
            diffusion,
            subcycles,
            constant_length,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Build from `diffFactor`, `subcycles`, `constDisplacement` and `seed`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            ..Self::new(
                dict.scalar("diffFactor", Self::NAME)?,
                dict.count_or("subcycles", 1)?,
                dict.bool_or("constDisplacement", false)?,
                dict.count_or("seed", 0)? as u64,
            )?
        })
    }

    /// Scale of one draw for a step of `dt`.
    #[must_use]
    pub fn sigma(&self, dt: f64) -> f64 {
        (2.0 * self.diffusion * dt / self.subcycles as f64).sqrt()
    }

    /// Total displacement over one step of `dt`.
    pub fn draw(&mut self, dt: f64) -> Result<Vector3<f64>> {
        let sigma = self.sigma(dt);
        let mut total = Vector3::zeros();
        if self.constant_length {
            let length = sigma * 3.0_f64.sqrt();
            for _ in 0..self.subcycles {
                let [x, y, z]: [f64; 3] = UnitSphere.sample(&mut self.rng);
                total += Vector3::new(x, y, z) * length;
            }
        } else {
            let normal = Normal::new(0.0, sigma)
                .map_err(|e| SimError::invalid_config(format!("{}: {e}", Self::NAME)))?;
            for _ in 0..self.subcycles {
                total += Vector3::from_fn(|_, _| normal.sample(&mut self.rng));
            }
        }
        Ok(total)
    }
}

impl Constraint for BrownianMotion {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Position
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, ctx: &StepContext<'_>) -> Result<()> {
        let displacement = ctx.decide(particle, || self.draw(ctx.dt))?;
        particle.pending.displacement += displacement;
        trace!(particle = %particle.id, ?displacement, "brownian displacement");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_core::{ParticleSeed, Population, SingleRank, UniformGridMesh};
    use sim_types::{DictValue, SurfaceMesh};

    fn particle_at(position: Vector3<f64>) -> Particle {
        let mut population = Population::serial();
        let handle = population
            .seed(
                &ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0).displacement(position),
                0.0,
            )
            .unwrap();
        population.remove(handle).unwrap()
    }

    fn host() -> UniformGridMesh {
        UniformGridMesh::new(Point3::new(-2.0, -2.0, -2.0), Point3::new(2.0, 2.0, 2.0), [4, 4, 4])
            .unwrap()
    }

    #[test]
    fn test_constant_length_draw() {
        let mut brownian = BrownianMotion::new(1e-3, 1, true, 7).unwrap();
        let dt = 0.5;
        let d = brownian.draw(dt).unwrap();
        assert_relative_eq!(d.norm(), brownian.sigma(dt) * 3.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = BrownianMotion::new(1e-2, 3, false, 42).unwrap();
        let mut b = BrownianMotion::new(1e-2, 3, false, 42).unwrap();
        for _ in 0..5 {
            assert_eq!(a.draw(0.1).unwrap(), b.draw(0.1).unwrap());
        }
        let mut c = BrownianMotion::new(1e-2, 3, false, 43).unwrap();
        assert_ne!(a.draw(0.1).unwrap(), c.draw(0.1).unwrap());
    }

    #[test]
    fn test_normal_draw_variance() {
        let diffusion = 0.5;
        let dt = 0.01;
        let mut brownian = BrownianMotion::new(diffusion, 4, false, 1).unwrap();
        let n = 20_000;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            sum_sq += brownian.draw(dt).unwrap().norm_squared();
        }
        // ⟨|d|²⟩ = 3·2·D·dt regardless of sub-cycling
        let expected = 6.0 * diffusion * dt;
        assert_relative_eq!(sum_sq / n as f64, expected, max_relative = 0.05);
    }

    #[test]
    fn test_zero_diffusion_does_not_move() {
        let host = host();
        let ctx = StepContext::new(0.0, 0.1, &host, &SingleRank);
        let mut p = particle_at(Vector3::zeros());
        BrownianMotion::new(0.0, 2, false, 0)
            .unwrap()
            .constrain(&mut p, &ctx)
            .unwrap();
        assert_eq!(p.pending.displacement, Vector3::zeros());
    }

    #[test]
    fn test_invalid_brownian() {
        assert!(BrownianMotion::new(-1.0, 1, false, 0).is_err());
        assert!(BrownianMotion::new(1.0, 0, false, 0).is_err());
    }

    #[test]
    fn test_cyclic_sector_from_dict() {
        let host = host();
        let ctx = StepContext::new(0.0, 0.1, &host, &SingleRank);
        let dict = Dict::new()
            .with("origin", DictValue::Vector([0.0, 0.0, 0.0]))
            .with("axisRot", DictValue::Vector([0.0, 0.0, 1.0]))
            .with("axisSpan", DictValue::Vector([1.0, 0.0, 0.0]))
            .with("sectorAngleDeg", DictValue::Scalar(45.0));
        let mut constraint = CyclicSector::from_dict(&dict).unwrap();

        let mut inside = particle_at(Vector3::new(1.0, 0.5, 0.0));
        constraint.constrain(&mut inside, &ctx).unwrap();
        assert_relative_eq!(inside.state.cg, Point3::new(1.0, 0.5, 0.0), epsilon = 1e-12);

        let mut outside = particle_at(Vector3::new(-1.0, 0.0, 0.0));
        outside.state.velocity = Vector3::new(0.0, 1.0, 0.0);
        constraint.constrain(&mut outside, &ctx).unwrap();
        assert_relative_eq!(outside.state.cg, Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(outside.state.velocity, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-12);
    }
}
