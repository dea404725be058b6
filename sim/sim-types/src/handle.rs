//! Particle identifiers and arena handles.
//!
//! A [`ParticleId`] names a particle for its whole life and is the same on
//! every rank that knows about it. A [`ParticleHandle`] is a location: the
//! rank whose population arena holds the authoritative copy, and the slot in
//! that arena. Handles are plain values; they never grant access to memory
//! on another rank.

use serde::{Deserialize, Serialize};

/// Globally unique particle identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticleId(pub u64);

impl ParticleId {
    /// Create a new particle ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for ParticleId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Particle({})", self.0)
    }
}

/// Identifier of the population (seeding group) a particle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PopulationId(pub u32);

impl std::fmt::Display for PopulationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Population({})", self.0)
    }
}

/// Location of a particle's authoritative copy: `{rank, slot}`.
///
/// Ordering is by rank, then slot, which gives every rank the same
/// deterministic ordering of cluster members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticleHandle {
    /// Rank that holds the slot.
    pub rank: usize,
    /// Slot index in that rank's population arena.
    pub slot: usize,
}

impl ParticleHandle {
    /// Create a handle.
    #[must_use]
    pub const fn new(rank: usize, slot: usize) -> Self {
        Self { rank, slot }
    }

    /// Whether the handle points into the given rank's arena.
    #[must_use]
    pub const fn is_local_to(self, rank: usize) -> bool {
        self.rank == rank
    }
}

impl std::fmt::Display for ParticleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.rank, self.slot)
    }
}

/// Role of a particle copy on the local rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParticleRole {
    /// Known to exactly one rank.
    #[default]
    Free,
    /// Authoritative copy of a particle shared by several ranks.
    Master,
    /// Mirror of a particle whose master lives on another rank.
    Slave,
}

impl ParticleRole {
    /// Whether this copy computes values that other owners receive.
    #[must_use]
    pub const fn is_authoritative(self) -> bool {
        matches!(self, Self::Free | Self::Master)
    }
}
