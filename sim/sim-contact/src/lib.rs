//! Wall response of immersed rigid particles.
//!
//! Particles interact with the host domain's walls through three models:
//!
//! - **Bounce**: an impact reverses the wall-normal velocity scaled by the
//!   restitution coefficient `e`, and a Coulomb impulse reduces the slip of
//!   the contact point. A particle leaves either rolling or sliding.
//! - **Adhesion**: plastic deformation and van der Waals attraction can
//!   absorb the normal kinetic energy, in which case the particle sticks.
//! - **Deposition**: a stuck particle that slows below a threshold speed is
//!   frozen on the wall for good.
//!
//! See [`BounceParams`] for the adhesion criterion.
//!
//! Rotationally periodic domains use [`CyclicSector`] to bring particles
//! that leave the meshed sector back into it.
//!
//! # Example
//!
//! ```
//! use sim_contact::{impact, BounceParams, ImpactOutcome};
//! use nalgebra::Vector3;
//!
//! let params = BounceParams::default().with_restitution(0.5);
//! let outcome = impact(
//!     &Vector3::new(1.0, 0.0, -2.0),
//!     &Vector3::zeros(),
//!     &Vector3::z(),
//!     1.0e-9,
//!     1.0e-4,
//!     &params,
//! );
//!
//! let ImpactOutcome::Rebound { velocity, .. } = outcome else {
//!     panic!("no adhesion configured");
//! };
//! assert!((velocity.z - 1.0).abs() < 1e-12);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-contact/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,     // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,   // Error docs added where non-obvious
)]

mod bounce;
mod cyclic;
mod deposition;
mod params;
mod wall;

pub use bounce::{bounce, impact, ImpactEnergy, ImpactOutcome, ROLLING_FRACTION};
pub use cyclic::CyclicSector;
pub use deposition::{deposit, DepositionOutcome};
pub use params::{BounceParams, DepositionParams};
pub use wall::{wall_contacts, WallContact};
