//! Ordered execution of configured constraints.

use sim_core::Population;
use sim_types::{Particle, PipelineConfig, Result, SimError};
use tracing::{debug, info};

use crate::constraint::{Constraint, ConstraintCategory, StepContext};
use crate::registry::ConstraintRegistry;

/// Constraints in declaration order, run one category at a time.
///
/// Within a stage every particle receives the constraints of that stage in
/// the order they were declared. Particles are visited in ascending
/// identifier order so that owners of a shared particle meet at the same
/// exchanges in the same sequence.
#[derive(Debug, Default)]
pub struct ConstraintPipeline {
    constraints: Vec<Box<dyn Constraint>>,
}

impl ConstraintPipeline {
    /// A pipeline with no constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate every declared constraint.
    ///
    /// An unknown name or an invalid dictionary fails the whole pipeline.
    pub fn from_config(config: &PipelineConfig, registry: &ConstraintRegistry) -> Result<Self> {
        let mut pipeline = Self::new();
        for spec in &config.constraints {
            pipeline.push(registry.build(spec)?);
        }
        info!(
            constraints = pipeline.len(),
            names = ?pipeline.names(),
            "constraint pipeline configured"
        );
        Ok(pipeline)
    }

    /// Parse JSON and instantiate with the built-in registry.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_config(&PipelineConfig::from_json(text)?, &ConstraintRegistry::default())
    }

    /// Append a constraint.
    pub fn push(&mut self, constraint: Box<dyn Constraint>) {
        self.constraints.push(constraint);
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether no constraints are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Constraint names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.constraints.iter().map(|c| c.name()).collect()
    }

    /// Number of constraints in one stage.
    #[must_use]
    pub fn count(&self, category: ConstraintCategory) -> usize {
        self.constraints
            .iter()
            .filter(|c| c.category() == category)
            .count()
    }

    /// Apply the constraints of one stage to one particle.
    pub fn constrain_particle(
        &mut self,
        category: ConstraintCategory,
        particle: &mut Particle,
        ctx: &StepContext<'_>,
    ) -> Result<()> {
        for constraint in &mut self.constraints {
            if constraint.category() != category || !constraint.selection().matches(particle) {
                continue;
            }
            constraint.constrain(particle, ctx)?;
        }
        Ok(())
    }

    /// Apply the constraints of one stage to every held particle.
    pub fn run_stage(
        &mut self,
        category: ConstraintCategory,
        population: &mut Population,
        ctx: &StepContext<'_>,
    ) -> Result<()> {
        if self.count(category) == 0 {
            return Ok(());
        }
        for id in population.ids() {
            let particle = population
                .by_id_mut(id)
                .ok_or_else(|| SimError::UnknownParticle(id.to_string()))?;
            self.constrain_particle(category, particle, ctx)?;
        }
        debug!(stage = %category, particles = population.len(), "constraint stage done");
        Ok(())
    }
}
