//! Contact clusters moving as one rigid body.
//!
//! For every cluster of the step's [`ContactGraph`] the resolver computes a
//! single [`ClusterSolution`]:
//!
//! 1. Total mass, common center of gravity and mass-weighted velocity
//! 2. Inertia of every member about the common center, summed
//! 3. Summed force, torque about the common center and angular momentum,
//!    taken from each member's accelerations after the acceleration stage
//! 4. Common angular velocity `ω = J⁻¹·L`
//! 5. Accelerations and the trapezoidal half-steps of the whole cluster
//! 6. One rigid motion (rotation about the common center plus translation)
//!
//! Members may live on several ranks. Each member contributes its partial
//! sums from the rank holding its authoritative copy, and the sums are
//! reduced over the communicator in two phases (the inertia and moments in
//! phase two need the common center from phase one).
//!
//! The solution is then fanned out: every local copy of every member gets
//! its share of the rigid motion and its final velocity. Fan-out is
//! idempotent; a member that already carries a result is left untouched.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use sim_types::{CommonFields, Particle, ParticleId, PendingMotion, Result, SimError};
use tracing::debug;

use crate::comm::Communicator;
use crate::contact_graph::ContactGraph;
use crate::population::Population;
use crate::rotation::incremental_rotation;

/// Floor of a cluster's mass sum.
pub const MASS_FLOOR: f64 = f64::MIN_POSITIVE;

const PHASE_ONE: usize = 7;
const PHASE_TWO: usize = 18;

/// Merged kinematics of one cluster for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSolution {
    /// Cluster index in the step's contact graph.
    pub index: usize,
    /// Members, ascending.
    pub members: Vec<ParticleId>,
    /// Total mass.
    pub mass: f64,
    /// Common center of gravity at the start of the step.
    pub cg: Point3<f64>,
    /// Inertia about `cg`.
    pub inertia: Matrix3<f64>,
    /// Summed effective force (`Σ m·a` of the members).
    pub force: Vector3<f64>,
    /// Summed effective torque about `cg`.
    pub torque: Vector3<f64>,
    /// Linear acceleration.
    pub acceleration: Vector3<f64>,
    /// Angular acceleration.
    pub angular_acceleration: Vector3<f64>,
    /// Mid-step velocity (moves the cluster).
    pub mid_velocity: Vector3<f64>,
    /// Mid-step angular velocity (rotates the cluster).
    pub mid_omega: Vector3<f64>,
    /// Velocity at the end of the step.
    pub velocity: Vector3<f64>,
    /// Angular velocity at the end of the step.
    pub omega: Vector3<f64>,
    /// Rotation of the cluster about `cg` over the step.
    pub rotation: UnitQuaternion<f64>,
    /// Translation of `cg` over the step.
    pub translation: Vector3<f64>,
}

impl ClusterSolution {
    /// Values recorded on every member.
    #[must_use]
    pub fn common_fields(&self) -> CommonFields {
        CommonFields {
            cluster: self.index,
            mass: self.mass,
            cg: self.cg,
            inertia: self.inertia,
            force: self.force,
            torque: self.torque,
            velocity: self.velocity,
            omega: self.omega,
        }
    }

    /// Where a member's center of gravity ends up after the rigid motion.
    #[must_use]
    pub fn moved_cg(&self, member_cg: &Point3<f64>) -> Point3<f64> {
        self.cg + self.translation + self.rotation * (member_cg - self.cg)
    }

    /// Write this solution into one member.
    ///
    /// Returns `false` (and changes nothing) when the member already
    /// carries a result for this step.
    pub fn apply_to(&self, particle: &mut Particle, dt: f64) -> bool {
        if particle.calculated_agglo() {
            return false;
        }
        let cg = particle.state.cg;
        let new_cg = self.moved_cg(&cg);
        let lever = new_cg - (self.cg + self.translation);

        particle.pending = PendingMotion {
            displacement: new_cg - cg,
            rotation: self.rotation,
        };

        let state = &mut particle.state;
        state.averaged_velocity = (new_cg - cg) / dt;
        state.averaged_omega = self.mid_omega;
        state.velocity = self.velocity + self.omega.cross(&lever);
        state.omega = self.omega;
        state.acceleration = self.acceleration;
        state.angular_acceleration = self.angular_acceleration;

        particle.flags.prescribed_velocity = true;
        particle.agglomeration = Some(self.common_fields());
        true
    }
}

/// Loads that reproduce a member's accelerations after the acceleration
/// stage: `m·a` and `J·α + ω×(J·ω)` about its own center.
///
/// Without acceleration constraints these equal the accumulated plus
/// injected force and torque. Damped or axis-locked members pass their
/// constrained response on to the cluster.
fn effective_loads(p: &Particle) -> (Vector3<f64>, Vector3<f64>) {
    let state = &p.state;
    let force = state.acceleration * p.mass();
    let torque = state.inertia * state.angular_acceleration
        + state.omega.cross(&(state.inertia * state.omega));
    (force, torque)
}

/// Computes and distributes cluster solutions.
#[derive(Debug, Clone, Copy)]
pub struct AgglomerationResolver {
    dt: f64,
}

impl AgglomerationResolver {
    /// Create a resolver for steps of length `dt`.
    pub fn new(dt: f64) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        Ok(Self { dt })
    }

    /// The step length.
    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Compute one solution per cluster.
    ///
    /// Collective: every rank must call it with the same graph.
    pub fn solve(
        &self,
        graph: &ContactGraph,
        population: &Population,
        comm: &dyn Communicator,
    ) -> Result<Vec<ClusterSolution>> {
        let clusters = graph.clusters();
        if clusters.is_empty() {
            return Ok(Vec::new());
        }

        let contributors = |members: &[ParticleId]| -> Vec<&Particle> {
            members
                .iter()
                .filter_map(|&id| population.by_id(id))
                .filter(|p| p.role.is_authoritative())
                .collect()
        };

        // Phase one: mass, first moment, linear momentum
        let mut first = vec![0.0; PHASE_ONE * clusters.len()];
        for (c, cluster) in clusters.iter().enumerate() {
            let sums = &mut first[PHASE_ONE * c..PHASE_ONE * (c + 1)];
            for p in contributors(&cluster.members) {
                let m = p.mass();
                sums[0] += m;
                for a in 0..3 {
                    sums[1 + a] += m * p.state.cg[a];
                    sums[4 + a] += m * p.state.velocity[a];
                }
            }
        }
        comm.all_reduce_sum(&mut first)?;

        let centers: Vec<(f64, Point3<f64>, Vector3<f64>)> = first
            .chunks_exact(PHASE_ONE)
            .map(|s| {
                let mass = s[0].max(MASS_FLOOR);
                let cg = Point3::new(s[1], s[2], s[3]) / mass;
                let velocity = Vector3::new(s[4], s[5], s[6]) / mass;
                (mass, cg, velocity)
            })
            .collect();

        // Phase two: inertia, force, torque and angular momentum about the common center
        let mut second = vec![0.0; PHASE_TWO * clusters.len()];
        for (c, cluster) in clusters.iter().enumerate() {
            let (_, common_cg, _) = centers[c];
            let sums = &mut second[PHASE_TWO * c..PHASE_TWO * (c + 1)];
            for p in contributors(&cluster.members) {
                let inertia = p.inertia_about(&common_cg);
                let (force, spin_torque) = effective_loads(p);
                let lever = p.state.cg - common_cg;
                let torque = spin_torque + lever.cross(&force);
                let momentum = lever.cross(&(p.state.velocity * p.mass()))
                    + p.state.inertia * p.state.omega;

                for (s, v) in sums[..9].iter_mut().zip(inertia.as_slice()) {
                    *s += v;
                }
                for a in 0..3 {
                    sums[9 + a] += force[a];
                    sums[12 + a] += torque[a];
                    sums[15 + a] += momentum[a];
                }
            }
        }
        comm.all_reduce_sum(&mut second)?;

        let mut solutions = Vec::with_capacity(clusters.len());
        for (c, cluster) in clusters.iter().enumerate() {
            let (mass, cg, velocity) = centers[c];
            let s = &second[PHASE_TWO * c..PHASE_TWO * (c + 1)];
            let inertia = Matrix3::from_column_slice(&s[..9]);
            let force = Vector3::new(s[9], s[10], s[11]);
            let torque = Vector3::new(s[12], s[13], s[14]);
            let momentum = Vector3::new(s[15], s[16], s[17]);

            let inverse = inertia.try_inverse().ok_or_else(|| {
                SimError::singular_inertia(format!(
                    "cluster {c} of {} particles",
                    cluster.members.len()
                ))
            })?;
            let omega = inverse * momentum;
            let acceleration = force / mass;
            let angular_acceleration = inverse * (torque - omega.cross(&(inertia * omega)));

            let dt = self.dt;
            let mid_velocity = velocity + 0.5 * dt * acceleration;
            let mid_omega = omega + 0.5 * dt * angular_acceleration;

            solutions.push(ClusterSolution {
                index: c,
                members: cluster.members.clone(),
                mass,
                cg,
                inertia,
                force,
                torque,
                acceleration,
                angular_acceleration,
                mid_velocity,
                mid_omega,
                velocity: mid_velocity + 0.5 * dt * acceleration,
                omega: mid_omega + 0.5 * dt * angular_acceleration,
                rotation: incremental_rotation(&mid_omega, dt),
                translation: mid_velocity * dt,
            });
        }

        debug!(clusters = solutions.len(), "agglomerates solved");
        Ok(solutions)
    }

    /// Solve every cluster and write the results into all local member copies.
    ///
    /// Returns the solutions; members resolved earlier in the step keep
    /// their results.
    pub fn resolve(
        &self,
        graph: &ContactGraph,
        population: &mut Population,
        comm: &dyn Communicator,
    ) -> Result<Vec<ClusterSolution>> {
        let solutions = self.solve(graph, population, comm)?;
        for solution in &solutions {
            for &id in &solution.members {
                if let Some(particle) = population.by_id_mut(id) {
                    solution.apply_to(particle, self.dt);
                }
            }
        }
        Ok(solutions)
    }

    /// Fan a cached solution out to one particle, if it belongs to a cluster.
    ///
    /// Returns whether anything was written.
    pub fn resolve_particle(
        &self,
        graph: &ContactGraph,
        solutions: &[ClusterSolution],
        particle: &mut Particle,
    ) -> bool {
        graph
            .cluster_of(particle.id)
            .and_then(|c| solutions.get(c))
            .is_some_and(|solution| solution.apply_to(particle, self.dt))
    }
}
