//! Immersed rigid particle simulation.
//!
//! This crate drives the complete particle stack:
//!
//! - [`sim_types`] - Particle record, surfaces, saved states, configuration
//! - [`sim_core`] - Kinematics, contact clusters, agglomeration, rank ownership
//! - [`sim_contact`] - Wall bounce, adhesion, deposition, cyclic sectors
//! - [`sim_constraint`] - Configurable constraint stages
//!
//! and adds the [`Stepper`] that runs one time step over a population plus
//! the [`CouplingProperty`] schema used to exchange particle data with a
//! coupled DEM code.
//!
//! # Quick Start
//!
//! ```
//! use sim_physics::prelude::*;
//!
//! let host = UniformGridMesh::new(
//!     Point3::new(-1.0, -1.0, -1.0),
//!     Point3::new(1.0, 1.0, 1.0),
//!     [8, 8, 8],
//! )
//! .unwrap()
//! .with_scalar("rho", 1.2);
//! let grid = BackgroundGrid::single(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
//!
//! // Weight minus buoyancy, motion restricted to the z axis
//! let pipeline = ConstraintPipeline::from_json(
//!     r#"{ "constraints": [
//!         { "type": "gravity", "g": [0, 0, -9.81], "rhoName": "rho" },
//!         { "type": "fixedAxisForce", "fixedAxis": [0, 0, 1] }
//!     ] }"#,
//! )
//! .unwrap();
//!
//! let mut population = Population::serial();
//! population
//!     .seed(&ParticleSeed::new(SurfaceMesh::icosahedron(0.02), 2500.0), 0.0)
//!     .unwrap();
//!
//! let mut stepper = Stepper::new(SimulationConfig::with_timestep(1e-3), pipeline).unwrap();
//! let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
//! stepper.run(&mut population, &env, 10).unwrap();
//!
//! let particle = population.iter().next().unwrap();
//! assert!(particle.state.velocity.z < 0.0);
//! assert!(particle.state.velocity.x.abs() < 1e-12);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      sim-physics (this crate)                   │
//! │              Stepper, coupling schema, re-exports               │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                    ┌─────────────┴─────────────┐
//!                    ▼                           ▼
//!          ┌─────────────────┐         ┌─────────────────┐
//!          │  sim-constraint │────────▶│   sim-contact   │
//!          │ Staged pipeline │         │  Wall response  │
//!          └────────┬────────┘         └────────┬────────┘
//!                   │                           │
//!                   └─────────────┬─────────────┘
//!                                 ▼
//!                       ┌─────────────────┐
//!                       │    sim-core     │
//!                       │ Kinematics, MPI │
//!                       └────────┬────────┘
//!                                │
//!                                ▼
//!                       ┌─────────────────┐
//!                       │   sim-types     │
//!                       │  Data structs   │
//!                       └─────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/sim-physics/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // Many methods can't be const due to nalgebra
    clippy::missing_errors_doc,   // Error docs added where non-obvious
)]

pub mod coupling;
pub mod stepper;

pub use coupling::{export_all, CouplingProperty};
pub use stepper::{
    check_divergence, restore_states, save_states, NoContacts, RemovalReason, StepEnvironment,
    StepReport, Stepper,
};

// Re-export sub-crates
pub use sim_constraint;
pub use sim_contact;
pub use sim_core;
pub use sim_types;

// Re-export nalgebra for convenience
pub use nalgebra;

/// Prelude module for convenient imports.
///
/// ```
/// use sim_physics::prelude::*;
/// ```
pub mod prelude {
    // ========================================================================
    // Data model from sim-types
    // ========================================================================

    pub use sim_types::{
        ContactPair, ForceField, KinematicState, Particle, ParticleHandle, ParticleId,
        ParticleRole, PopulationId, SavedState, StateSlot, SurfaceMesh,
    };

    // Configuration
    pub use sim_types::{ConstraintSpec, Dict, DictValue, PipelineConfig, SimulationConfig};

    // Errors
    pub use sim_types::SimError;

    // ========================================================================
    // Engine from sim-core
    // ========================================================================

    pub use sim_core::{
        AgglomerationResolver, BackgroundGrid, BoundingSphereDetector, ClusterSolution,
        Communicator, ContactDetector, ContactGraph, HostMesh, LocalGroup, OwnershipSync,
        ParticleSeed, Population, RankQuery, SingleRank, UniformGridMesh,
    };

    // ========================================================================
    // Wall response from sim-contact
    // ========================================================================

    pub use sim_contact::{BounceParams, DepositionParams, ImpactOutcome};

    // ========================================================================
    // Constraints from sim-constraint
    // ========================================================================

    pub use sim_constraint::{
        Constraint, ConstraintCategory, ConstraintPipeline, ConstraintRegistry,
        ParticleSelection, StepContext,
    };

    // ========================================================================
    // Stepping and coupling
    // ========================================================================

    pub use crate::coupling::CouplingProperty;
    pub use crate::stepper::{NoContacts, StepEnvironment, StepReport, Stepper};

    // Math
    pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
}
