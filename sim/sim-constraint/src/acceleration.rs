//! Acceleration-stage constraints.

use nalgebra::Vector3;
use sim_types::{Dict, Particle, Result, SimError};

use crate::constraint::{Constraint, ConstraintCategory, ParticleSelection, StepContext};
use crate::force::configured_axis;

/// Divides linear and angular acceleration by a damping factor.
///
/// With a positive `ramp_time` the factor moves linearly from
/// `damping_factor` at `t = 0` to 1 at `t = ramp_time` and stays 1 after.
#[derive(Debug, Clone)]
pub struct InertialDamping {
    selection: ParticleSelection,
    damping_factor: f64,
    ramp_time: f64,
}

impl InertialDamping {
    /// Registry name.
    pub const NAME: &'static str = "inertialDamping";

    /// Create a damping constraint.
    pub fn new(damping_factor: f64, ramp_time: f64) -> Result<Self> {
        if !damping_factor.is_finite() || damping_factor <= 0.0 {
            return Err(SimError::invalid_config(format!(
                "{}: dampingFactor must be positive, got {damping_factor}",
                Self::NAME
            )));
        }
        Ok(Self {
            selection: ParticleSelection::All,
            damping_factor,
            ramp_time,
        })
    }

    /// Build from `dampingFactor` and `rampTime`.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        Ok(Self {
            selection: ParticleSelection::from_dict(dict, Self::NAME)?,
            ..Self::new(
                dict.scalar("dampingFactor", Self::NAME)?,
                dict.scalar_or("rampTime", 0.0)?,
            )?
        })
    }

    /// The factor in effect at `time`.
    #[must_use]
    pub fn factor_at(&self, time: f64) -> f64 {
        if self.ramp_time <= 0.0 {
            return self.damping_factor;
        }
        let progress = (time / self.ramp_time).clamp(0.0, 1.0);
        self.damping_factor + (1.0 - self.damping_factor) * progress
    }
}

impl Constraint for InertialDamping {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Acceleration
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, ctx: &StepContext<'_>) -> Result<()> {
        let factor = self.factor_at(ctx.time);
        particle.state.acceleration /= factor;
        particle.state.angular_acceleration /= factor;
        Ok(())
    }
}

/// Restricts rotation to a single axis.
#[derive(Debug, Clone)]
pub struct FixedAxisRotation {
    selection: ParticleSelection,
    axis: Vector3<f64>,
}

impl FixedAxisRotation {
    /// Registry name.
    pub const NAME: &'static str = "fixedAxisRotation";

    /// Rotate only about `axis` (normalized here).
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

impl Constraint for FixedAxisRotation {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn category(&self) -> ConstraintCategory {
        ConstraintCategory::Acceleration
    }

    fn selection(&self) -> &ParticleSelection {
        &self.selection
    }

    fn constrain(&mut self, particle: &mut Particle, _ctx: &StepContext<'_>) -> Result<()> {
        let axis = self.axis;
        let state = &mut particle.state;
        state.angular_acceleration = axis * state.angular_acceleration.dot(&axis);
        state.omega = axis * state.omega.dot(&axis);
        Ok(())
    }
}
