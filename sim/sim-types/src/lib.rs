//! Core types for immersed rigid particle simulation.
//!
//! This crate provides the data model shared by the particle engine:
//!
//! - [`Particle`] - A rigid body with a closed triangulated surface
//! - [`KinematicState`] - Center of gravity, orientation, velocities, loads
//! - [`SurfaceMesh`] - Surface with cached face geometry and volume integrals
//! - [`StateStore`] - Four independent saved-state slots per particle
//! - [`ParticleHandle`] - `{rank, slot}` location of a particle's authoritative copy
//! - [`Dict`] / [`PipelineConfig`] - Constraint configuration dictionaries
//! - [`SimulationConfig`] - Settings shared by every particle on a rank
//!
//! # Design Philosophy
//!
//! These types carry no integration logic. The kinematics engine, the
//! agglomeration resolver and the constraint pipeline all operate on them,
//! and the same values travel between ranks as serialized payloads.
//!
//! # Example
//!
//! ```
//! use sim_types::{Particle, ParticleId, PopulationId, SurfaceMesh};
//!
//! // A 1 m cube of density 1000 kg/m³
//! let particle = Particle::new(
//!     ParticleId::new(0),
//!     PopulationId(0),
//!     0.0,
//!     SurfaceMesh::cube(0.5),
//!     1000.0,
//! )
//! .unwrap();
//!
//! assert!((particle.mass() - 1000.0).abs() < 1e-9);
//! assert!(particle.state.velocity.norm() < 1e-12);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod config;
mod contact;
mod dict;
mod error;
mod handle;
mod particle;
mod snapshot;
mod state;
mod surface;

pub use config::{ConstraintSpec, PipelineConfig, SimulationConfig};
pub use contact::ContactPair;
pub use dict::{Dict, DictValue};
pub use error::SimError;
pub use handle::{ParticleHandle, ParticleId, ParticleRole, PopulationId};
pub use particle::Particle;
pub use snapshot::{SavedState, StateSlot, StateStore};
pub use state::{
    CommonFields, ForceField, InjectedLoads, KinematicState, ParticleFlags, PendingMotion,
};
pub use surface::SurfaceMesh;

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, Unit, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
