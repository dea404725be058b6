//! Configurable per-particle constraints.
//!
//! A step runs four constraint stages, each after the engine has produced
//! the quantity the stage modifies:
//!
//! | Stage | Runs after | Built-in constraints |
//! |-------|------------|----------------------|
//! | [`ConstraintCategory::Force`] | face forces are known | `surfaceForce`, `gravity`, `addForce`, `fixedAxisForce`, `staticTorque` |
//! | [`ConstraintCategory::Acceleration`] | accelerations are computed | `inertialDamping`, `fixedAxisRotation` |
//! | [`ConstraintCategory::Velocity`] | the first half-step | `staticVelocity`, `staticOmega`, `moveFile`, `wallBounce`, `deposition` |
//! | [`ConstraintCategory::Position`] | motion is planned | `cyclicSector`, `brownianMotion` |
//!
//! Constraints are declared in a [`PipelineConfig`] as an ordered list of
//! dictionaries, each naming its type. The [`ConstraintRegistry`] maps names
//! to constructors; user constraints can be registered next to the
//! built-ins.
//!
//! # Shared particles
//!
//! A particle overlapping several ranks is stepped redundantly by all of
//! them. Anything that depends on rank-local data (the host mesh partition,
//! an external file, a random stream) is decided by the particle's master
//! and distributed through [`StepContext::decide`], so every copy leaves a
//! stage in the same state.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{ConstraintCategory, ConstraintPipeline};
//!
//! let pipeline = ConstraintPipeline::from_json(
//!     r#"{ "constraints": [
//!         { "type": "gravity", "g": [0, 0, -9.81], "rho": 1.2 },
//!         { "type": "fixedAxisForce", "fixedAxis": [0, 0, 1] },
//!         { "type": "inertialDamping", "dampingFactor": 0.5 }
//!     ] }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(pipeline.count(ConstraintCategory::Force), 2);
//! assert_eq!(pipeline.count(ConstraintCategory::Acceleration), 1);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-constraint/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // Many methods can't be const due to nalgebra
    clippy::cast_precision_loss,  // usize to f64 is fine for counts
    clippy::missing_errors_doc,   // Error docs added where non-obvious
)]

mod acceleration;
mod constraint;
mod external;
mod force;
mod pipeline;
mod position;
mod registry;
mod velocity;

pub use acceleration::{FixedAxisRotation, InertialDamping};
pub use constraint::{Constraint, ConstraintCategory, ParticleSelection, StepContext};
pub use external::{MoveSource, MoveTarget, SupervisedCommand};
pub use force::{AddForce, FixedAxisForce, Gravity, StaticTorque, SurfaceForce};
pub use pipeline::ConstraintPipeline;
pub use position::{BrownianMotion, CyclicSector};
pub use registry::{ConstraintBuilder, ConstraintRegistry};
pub use velocity::{Deposition, MoveFile, StaticOmega, StaticVelocity, WallBounce};

// Re-export types needed to configure a pipeline
pub use sim_types::{ConstraintSpec, Dict, DictValue, PipelineConfig};
