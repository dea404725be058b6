//! One time step of a particle population.
//!
//! The [`Stepper`] drives every particle held by the local rank through the
//! same sequence:
//!
//! 1. Clear per-step transients
//! 2. Register the host's contacts
//! 3. Force constraints
//! 4. Accelerations, then acceleration constraints
//! 5. Gather the contact graph over all ranks
//! 6. Solve and fan out agglomerates
//! 7. First half-step of free particles
//! 8. Velocity constraints, then re-plan the motion of free particles and
//!    of cluster members whose velocities a constraint rewrote
//! 9. Position constraints
//! 10. Apply motion and close the step
//! 11. Remove particles that left the domain or were disposed of
//! 12. Refresh ownership and synchronize owners
//!
//! Every rank must call [`Stepper::step`] once per step; stages 5, 6 and
//! 12 are collective, and shared particles exchange values with their other
//! owners inside the constraint stages.
//!
//! # Example
//!
//! ```
//! use sim_physics::prelude::*;
//!
//! let host = UniformGridMesh::new(
//!     Point3::new(-1.0, -1.0, -1.0),
//!     Point3::new(1.0, 1.0, 1.0),
//!     [4, 4, 4],
//! )
//! .unwrap();
//! let grid = BackgroundGrid::single(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
//!
//! let pipeline = ConstraintPipeline::from_json(
//!     r#"{ "constraints": [ { "type": "addForce", "addForce": [1, 0, 0] } ] }"#,
//! )
//! .unwrap();
//! let mut stepper = Stepper::new(SimulationConfig::with_timestep(0.01), pipeline).unwrap();
//!
//! let mut population = Population::serial();
//! population
//!     .seed(&ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0), 0.0)
//!     .unwrap();
//!
//! let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
//! stepper.step(&mut population, &env).unwrap();
//!
//! assert!(population.iter().all(|p| p.state.velocity.x > 0.0));
//! ```

use std::collections::BTreeMap;

use nalgebra::Vector3;
use sim_constraint::{ConstraintCategory, ConstraintPipeline, StepContext};
use sim_core::kinematics::{
    apply_motion, begin_motion, calc_acceleration, finish_motion, plan_motion,
};
use sim_core::{
    AgglomerationResolver, Communicator, ContactDetector, ContactGraph, HostMesh, OwnershipSync,
    Population, RankQuery, SyncReport,
};
use sim_types::{ContactPair, Particle, ParticleId, Result, SimError, SimulationConfig, StateSlot};
use tracing::{debug, info, warn};

/// A detector for runs without particle-particle contact.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContacts;

impl ContactDetector for NoContacts {
    fn detect(&self, _population: &Population) -> Vec<(ParticleId, ContactPair)> {
        Vec::new()
    }
}

/// The collaborators a step reads from.
#[derive(Clone, Copy)]
pub struct StepEnvironment<'a> {
    /// Host mesh of this rank.
    pub host: &'a dyn HostMesh,
    /// Narrow-phase contact detection.
    pub detector: &'a dyn ContactDetector,
    /// Background grid deciding rank ownership.
    pub ranks: &'a dyn RankQuery,
    /// Communicator over all ranks.
    pub comm: &'a dyn Communicator,
}

impl std::fmt::Debug for StepEnvironment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepEnvironment")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .finish_non_exhaustive()
    }
}

impl<'a> StepEnvironment<'a> {
    /// Bundle the collaborators.
    #[must_use]
    pub fn new(
        host: &'a dyn HostMesh,
        detector: &'a dyn ContactDetector,
        ranks: &'a dyn RankQuery,
        comm: &'a dyn Communicator,
    ) -> Self {
        Self {
            host,
            detector,
            ranks,
            comm,
        }
    }
}

/// Why a particle left the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Its center of gravity is outside the host mesh.
    LeftDomain,
    /// It stayed deposited longer than the disposal time.
    Disposed,
}

/// What one step did on the local rank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Simulation time at the end of the step.
    pub time: f64,
    /// Agglomerates resolved.
    pub clusters: usize,
    /// Particles removed by this rank, with the reason.
    pub removed: Vec<(ParticleId, RemovalReason)>,
    /// Owner synchronization.
    pub sync: SyncReport,
}

/// Advances a population one step at a time.
#[derive(Debug)]
pub struct Stepper {
    config: SimulationConfig,
    pipeline: ConstraintPipeline,
    resolver: AgglomerationResolver,
    ownership: OwnershipSync,
    time: f64,
    steps: u64,
}

impl Stepper {
    /// Create a stepper starting at time zero.
    pub fn new(config: SimulationConfig, pipeline: ConstraintPipeline) -> Result<Self> {
        config.validate()?;
        info!(
            dt = config.timestep,
            constraints = pipeline.len(),
            "particle stepper created"
        );
        Ok(Self {
            resolver: AgglomerationResolver::new(config.timestep)?,
            ownership: OwnershipSync::new(config.ownership_search_radius),
            config,
            pipeline,
            time: 0.0,
            steps: 0,
        })
    }

    /// Start from `time` instead of zero.
    #[must_use]
    pub fn starting_at(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The constraint pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &ConstraintPipeline {
        &self.pipeline
    }

    /// Simulation time at the end of the last step.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Steps taken.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Rewind the clock, e.g. after restoring saved states.
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Advance every particle by one time step.
    pub fn step(
        &mut self,
        population: &mut Population,
        env: &StepEnvironment<'_>,
    ) -> Result<StepReport> {
        let dt = self.config.timestep;
        let time = self.time + dt;
        let ctx = StepContext::new(time, dt, env.host, env.comm);

        population.begin_step();
        for (id, pair) in env.detector.detect(population) {
            population.register_contact(id, pair)?;
        }

        self.pipeline
            .run_stage(ConstraintCategory::Force, population, &ctx)?;

        for particle in population.iter_mut() {
            calc_acceleration(particle)?;
        }
        self.pipeline
            .run_stage(ConstraintCategory::Acceleration, population, &ctx)?;

        let graph = ContactGraph::gather(population, env.comm)?;
        let solutions = self.resolver.resolve(&graph, population, env.comm)?;

        for particle in population.iter_mut().filter(|p| !p.calculated_agglo()) {
            begin_motion(particle, dt);
        }

        let cluster_motion: BTreeMap<ParticleId, (Vector3<f64>, Vector3<f64>)> = population
            .iter()
            .filter(|p| p.calculated_agglo())
            .map(|p| (p.id, (p.state.averaged_velocity, p.state.averaged_omega)))
            .collect();
        self.pipeline
            .run_stage(ConstraintCategory::Velocity, population, &ctx)?;
        // A member whose velocities a constraint rewrote leaves the rigid motion
        for particle in population.iter_mut() {
            let keeps_cluster_motion = cluster_motion.get(&particle.id).is_some_and(|&averaged| {
                averaged == (particle.state.averaged_velocity, particle.state.averaged_omega)
            });
            if !keeps_cluster_motion {
                plan_motion(particle, dt);
            }
        }

        self.pipeline
            .run_stage(ConstraintCategory::Position, population, &ctx)?;

        for particle in population.iter_mut() {
            apply_motion(particle);
            finish_motion(particle, dt);
        }

        if self.config.check_divergence {
            check_divergence(population)?;
        }

        let removed = self.remove_expired(population, env.host, time);
        let sync = self
            .ownership
            .synchronize(population, env.comm, env.ranks)?;

        self.time = time;
        self.steps += 1;
        debug!(
            step = self.steps,
            time,
            particles = population.len(),
            clusters = solutions.len(),
            "particle step done"
        );
        Ok(StepReport {
            time,
            clusters: solutions.len(),
            removed,
            sync,
        })
    }

    /// Take `n` steps.
    pub fn run(
        &mut self,
        population: &mut Population,
        env: &StepEnvironment<'_>,
        n: usize,
    ) -> Result<Vec<StepReport>> {
        (0..n).map(|_| self.step(population, env)).collect()
    }

    /// Decide removal on authoritative copies only. Slave copies of a
    /// removed particle are dropped by the following synchronization.
    fn remove_expired(
        &self,
        population: &mut Population,
        host: &dyn HostMesh,
        time: f64,
    ) -> Vec<(ParticleId, RemovalReason)> {
        let doomed: Vec<(ParticleId, RemovalReason)> = population
            .iter()
            .filter(|p| p.role.is_authoritative())
            .filter_map(|p| self.removal_reason(p, host, time).map(|r| (p.id, r)))
            .collect();
        for &(id, reason) in &doomed {
            if population.remove_id(id).is_some() {
                info!(particle = %id, ?reason, time, "particle removed");
            }
        }
        doomed
    }

    fn removal_reason(
        &self,
        particle: &Particle,
        host: &dyn HostMesh,
        time: f64,
    ) -> Option<RemovalReason> {
        if self.config.remove_on_exit && host.find_cell(&particle.state.cg).is_none() {
            return Some(RemovalReason::LeftDomain);
        }
        let after = self.config.dispose_deposited_after?;
        let since = particle.flags.deposited_since?;
        (particle.flags.deposited && time - since >= after).then_some(RemovalReason::Disposed)
    }
}

/// Fail on the first particle whose state is no longer finite.
pub fn check_divergence(population: &Population) -> Result<()> {
    for particle in population.iter() {
        if !particle.state.is_finite() {
            warn!(particle = %particle.id, "non-finite particle state");
            return Err(SimError::diverged(format!(
                "{} has a non-finite state",
                particle.id
            )));
        }
    }
    Ok(())
}

/// Save every particle into one checkpoint slot.
pub fn save_states(population: &mut Population, slot: StateSlot, with_points: bool) {
    for particle in population.iter_mut() {
        particle.save_state(slot, with_points);
    }
}

/// Restore every particle from one checkpoint slot.
pub fn restore_states(population: &mut Population, slot: StateSlot) -> Result<()> {
    for particle in population.iter_mut() {
        particle.restore_state(slot)?;
    }
    Ok(())
}
