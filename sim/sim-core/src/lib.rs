//! Rigid particle engine core.
//!
//! This crate moves immersed rigid particles through one time step and
//! keeps their copies consistent across ranks. It builds on [`sim_types`]
//! for the data model.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      AgglomerationResolver                   │
//! │  Clusters of touching particles → one rigid body per step    │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//! ┌──────────────────────────────┐  ┌───────────────────────────┐
//! │        ContactGraph          │  │        kinematics         │
//! │  partners, closure, clusters │  │  half-steps, quaternions  │
//! └──────────────┬───────────────┘  └─────────────┬─────────────┘
//!                │                                │
//!                ▼                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Population                           │
//! │  Arena of local copies, addressed by {rank, slot} handles    │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Communicator + OwnershipSync                    │
//! │  Collectives, owner sets, master → owner copies              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The host fluid solver is reached only through the traits in [`host`]
//! and the [`RankQuery`] ownership query.
//!
//! # Quick Start
//!
//! ```
//! use sim_core::{kinematics, ParticleSeed, Population};
//! use sim_types::{SurfaceMesh, Vector3};
//!
//! let mut population = Population::serial();
//! let handle = population
//!     .seed(&ParticleSeed::new(SurfaceMesh::cube(0.5), 1000.0), 0.0)
//!     .unwrap();
//!
//! let particle = population.get_mut(handle).unwrap();
//! particle.state.total_force = Vector3::new(0.0, 0.0, -9810.0);
//! kinematics::advance(particle, 0.01).unwrap();
//!
//! assert!(particle.state.velocity.z < 0.0);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

pub mod agglomeration;
pub mod comm;
pub mod contact_graph;
pub mod host;
pub mod kinematics;
pub mod ownership;
pub mod population;
pub mod rotation;

pub use agglomeration::{AgglomerationResolver, ClusterSolution};
pub use comm::{distribute_value, Communicator, LocalGroup, SingleRank};
pub use contact_graph::{Cluster, ContactGraph};
pub use host::{BoundingSphereDetector, CellId, ContactDetector, HostMesh, UniformGridMesh, Wall};
pub use ownership::{BackgroundGrid, Ownership, OwnershipSync, RankQuery, SyncReport};
pub use population::{ParticleSeed, Population};

// Re-export key types from sim-types for convenience
pub use sim_types::{
    CommonFields, ContactPair, Particle, ParticleHandle, ParticleId, ParticleRole, Result,
    SimError, SurfaceMesh,
};
