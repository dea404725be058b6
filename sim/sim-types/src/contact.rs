//! Transient contact relations discovered during one step.

use serde::{Deserialize, Serialize};

use crate::handle::{ParticleHandle, ParticleId};

/// One contact of a particle, valid only for the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactPair {
    /// Face-to-face contact with another particle.
    Particle {
        /// Face index on this particle's surface.
        own_face: usize,
        /// Arena location of the other particle.
        partner: ParticleHandle,
        /// Identifier of the other particle.
        partner_id: ParticleId,
        /// Face index on the partner's surface.
        partner_face: usize,
    },
    /// Contact with an immersed-boundary face of the fluid mesh.
    Boundary {
        /// Host mesh face (or cell) index.
        mesh_face: usize,
        /// Whether the indexed cell lies on the solid side of the boundary.
        solid_side: bool,
    },
}

impl ContactPair {
    /// Partner handle for particle-particle contacts.
    #[must_use]
    pub const fn partner(&self) -> Option<ParticleHandle> {
        match self {
            Self::Particle { partner, .. } => Some(*partner),
            Self::Boundary { .. } => None,
        }
    }

    /// Partner identifier for particle-particle contacts.
    #[must_use]
    pub const fn partner_id(&self) -> Option<ParticleId> {
        match self {
            Self::Particle { partner_id, .. } => Some(*partner_id),
            Self::Boundary { .. } => None,
        }
    }
}
