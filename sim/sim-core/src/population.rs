//! Arena of the particles known to one rank.
//!
//! Particles live in slots; a [`ParticleHandle`] names a slot on a given
//! rank. Handles from other ranks are never dereferenced here; values of
//! remote particles are exchanged by message instead.

use std::collections::BTreeMap;

use nalgebra::{UnitQuaternion, Vector3};
use sim_types::{
    ContactPair, Particle, ParticleHandle, ParticleId, PopulationId, Result, SimError, SurfaceMesh,
};
use tracing::debug;

/// Initial placement of a new particle.
///
/// The template surface is scaled and rotated about the origin of its own
/// coordinates, then displaced.
#[derive(Debug, Clone)]
pub struct ParticleSeed {
    /// Population the particle joins.
    pub population: PopulationId,
    /// Template surface.
    pub template: SurfaceMesh,
    /// Material density.
    pub density: f64,
    /// Uniform scale applied to the template.
    pub scale: f64,
    /// Initial orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Translation applied after scaling and rotation.
    pub displacement: Vector3<f64>,
    /// Initial velocity.
    pub velocity: Vector3<f64>,
    /// Initial angular velocity.
    pub omega: Vector3<f64>,
}

impl ParticleSeed {
    /// Seed a template at the origin, at rest.
    #[must_use]
    pub fn new(template: SurfaceMesh, density: f64) -> Self {
        Self {
            population: PopulationId::default(),
            template,
            density,
            scale: 1.0,
            orientation: UnitQuaternion::identity(),
            displacement: Vector3::zeros(),
            velocity: Vector3::zeros(),
            omega: Vector3::zeros(),
        }
    }

    /// Set the population.
    #[must_use]
    pub fn population(mut self, population: PopulationId) -> Self {
        self.population = population;
        self
    }

    /// Set the scale.
    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the orientation.
    #[must_use]
    pub fn orientation(mut self, orientation: UnitQuaternion<f64>) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the displacement.
    #[must_use]
    pub fn displacement(mut self, displacement: Vector3<f64>) -> Self {
        self.displacement = displacement;
        self
    }

    /// Set the initial velocity.
    #[must_use]
    pub fn velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the initial angular velocity.
    #[must_use]
    pub fn omega(mut self, omega: Vector3<f64>) -> Self {
        self.omega = omega;
        self
    }

    fn build(&self, id: ParticleId, time: f64) -> Result<Particle> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(SimError::invalid_config(format!(
                "seed scale must be positive, got {}",
                self.scale
            )));
        }
        let mut surface = self.template.clone();
        let origin = nalgebra::Point3::origin();
        surface.scale_about(self.scale, &origin);
        surface.transform(&self.orientation, &origin, &self.displacement);

        let mut particle = Particle::new(id, self.population, time, surface, self.density)?;
        particle.state.orientation = self.orientation;
        particle.state.velocity = self.velocity;
        particle.state.averaged_velocity = self.velocity;
        particle.state.omega = self.omega;
        particle.state.averaged_omega = self.omega;
        particle.dispersion_velocity = self.velocity;
        Ok(particle)
    }
}

/// The particles held by one rank, masters and slaves alike.
#[derive(Debug, Clone)]
pub struct Population {
    rank: usize,
    ranks: usize,
    slots: Vec<Option<Particle>>,
    free_slots: Vec<usize>,
    index: BTreeMap<ParticleId, usize>,
    next_serial: u64,
}

impl Population {
    /// Create an empty population for `rank` out of `ranks`.
    ///
    /// Identifiers allocated by [`Population::seed`] are interleaved by rank
    /// so that ranks never collide.
    #[must_use]
    pub fn new(rank: usize, ranks: usize) -> Self {
        Self {
            rank,
            ranks: ranks.max(1),
            slots: Vec::new(),
            free_slots: Vec::new(),
            index: BTreeMap::new(),
            next_serial: 0,
        }
    }

    /// A population for a serial run.
    #[must_use]
    pub fn serial() -> Self {
        Self::new(0, 1)
    }

    /// The local rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of particles held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no particles are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Create a particle from a seed and insert it.
    pub fn seed(&mut self, seed: &ParticleSeed, time: f64) -> Result<ParticleHandle> {
        let id = self.allocate_id();
        let particle = seed.build(id, time)?;
        self.insert(particle)
    }

    fn allocate_id(&mut self) -> ParticleId {
        loop {
            let id = ParticleId::new(self.next_serial * self.ranks as u64 + self.rank as u64);
            self.next_serial += 1;
            if !self.index.contains_key(&id) {
                return id;
            }
        }
    }

    /// Insert a particle. Its identifier must be new to this rank.
    pub fn insert(&mut self, mut particle: Particle) -> Result<ParticleHandle> {
        if self.index.contains_key(&particle.id) {
            return Err(SimError::invalid_config(format!(
                "{} is already present on rank {}",
                particle.id, self.rank
            )));
        }
        if particle.owners.is_empty() {
            particle.owners.insert(self.rank);
            particle.master = self.rank;
        }
        Ok(self.place(particle))
    }

    /// Insert a particle or replace the copy with the same identifier.
    pub fn upsert(&mut self, particle: Particle) -> ParticleHandle {
        self.place(particle)
    }

    fn place(&mut self, mut particle: Particle) -> ParticleHandle {
        let slot = match self.index.get(&particle.id) {
            Some(&slot) => slot,
            None => self.free_slots.pop().unwrap_or(self.slots.len()),
        };
        let handle = ParticleHandle::new(self.rank, slot);
        if particle.role.is_authoritative() {
            particle.handle = handle;
        }
        self.index.insert(particle.id, slot);
        if slot == self.slots.len() {
            self.slots.push(Some(particle));
        } else {
            self.slots[slot] = Some(particle);
        }
        handle
    }

    fn local_slot(&self, handle: ParticleHandle) -> Result<usize> {
        if !handle.is_local_to(self.rank) {
            return Err(SimError::ForeignHandle {
                handle: handle.to_string(),
                owner: handle.rank,
                local: self.rank,
            });
        }
        Ok(handle.slot)
    }

    /// Particle at a local handle.
    pub fn get(&self, handle: ParticleHandle) -> Result<&Particle> {
        let slot = self.local_slot(handle)?;
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or_else(|| SimError::UnknownParticle(handle.to_string()))
    }

    /// Mutable particle at a local handle.
    pub fn get_mut(&mut self, handle: ParticleHandle) -> Result<&mut Particle> {
        let slot = self.local_slot(handle)?;
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or_else(|| SimError::UnknownParticle(handle.to_string()))
    }

    /// Local handle of the copy with this identifier.
    #[must_use]
    pub fn handle_of(&self, id: ParticleId) -> Option<ParticleHandle> {
        self.index
            .get(&id)
            .map(|&slot| ParticleHandle::new(self.rank, slot))
    }

    /// Local copy with this identifier.
    #[must_use]
    pub fn by_id(&self, id: ParticleId) -> Option<&Particle> {
        let slot = *self.index.get(&id)?;
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Mutable local copy with this identifier.
    pub fn by_id_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        let slot = *self.index.get(&id)?;
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Remove the particle at a local handle.
    pub fn remove(&mut self, handle: ParticleHandle) -> Result<Particle> {
        let slot = self.local_slot(handle)?;
        let particle = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or_else(|| SimError::UnknownParticle(handle.to_string()))?;
        self.index.remove(&particle.id);
        self.free_slots.push(slot);
        debug!(particle = %particle.id, rank = self.rank, "particle removed");
        Ok(particle)
    }

    /// Remove the copy with this identifier, if present.
    pub fn remove_id(&mut self, id: ParticleId) -> Option<Particle> {
        let handle = self.handle_of(id)?;
        self.remove(handle).ok()
    }

    /// Identifiers of all held particles, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<ParticleId> {
        self.index.keys().copied().collect()
    }

    /// Held particles in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.index
            .values()
            .filter_map(|&slot| self.slots.get(slot).and_then(Option::as_ref))
    }

    /// Mutable access to every held particle, in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Clear per-step transients on every particle.
    pub fn begin_step(&mut self) {
        for particle in self.iter_mut() {
            particle.begin_step();
        }
    }

    /// Record a contact discovered for the particle `id`.
    pub fn register_contact(&mut self, id: ParticleId, pair: ContactPair) -> Result<()> {
        let particle = self
            .by_id_mut(id)
            .ok_or_else(|| SimError::UnknownParticle(id.to_string()))?;
        particle.contacts.push(pair);
        Ok(())
    }

    /// Total mass of the authoritative copies held here.
    #[must_use]
    pub fn authoritative_mass(&self) -> f64 {
        self.iter()
            .filter(|p| p.role.is_authoritative())
            .map(Particle::mass)
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_types::ParticleRole;

    fn seed() -> ParticleSeed {
        ParticleSeed::new(SurfaceMesh::cube(0.5), 1000.0)
    }

    #[test]
    fn test_seed_places_particle() {
        let mut population = Population::serial();
        let handle = population
            .seed(
                &seed()
                    .scale(2.0)
                    .displacement(Vector3::new(1.0, 2.0, 3.0))
                    .velocity(Vector3::new(0.5, 0.0, 0.0)),
                0.25,
            )
            .unwrap();
        let p = population.get(handle).unwrap();
        assert_relative_eq!(p.state.cg, Point3::new(1.0, 2.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(p.mass(), 8000.0, epsilon = 1e-9);
        assert_eq!(p.birth_time, 0.25);
        assert_eq!(p.state.averaged_velocity, Vector3::new(0.5, 0.0, 0.0));
        assert_eq!(p.handle, handle);
        assert!(p.owners.contains(&0));
    }

    #[test]
    fn test_ids_interleave_by_rank() {
        let mut a = Population::new(0, 2);
        let mut b = Population::new(1, 2);
        let ha = a.seed(&seed(), 0.0).unwrap();
        let hb = b.seed(&seed(), 0.0).unwrap();
        let hb2 = b.seed(&seed(), 0.0).unwrap();
        assert_eq!(a.get(ha).unwrap().id, ParticleId::new(0));
        assert_eq!(b.get(hb).unwrap().id, ParticleId::new(1));
        assert_eq!(b.get(hb2).unwrap().id, ParticleId::new(3));
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let population = Population::new(1, 2);
        let err = population.get(ParticleHandle::new(0, 0)).unwrap_err();
        assert!(matches!(err, SimError::ForeignHandle { owner: 0, local: 1, .. }));
    }

    #[test]
    fn test_remove_reuses_slot() {
        let mut population = Population::serial();
        let first = population.seed(&seed(), 0.0).unwrap();
        let _second = population.seed(&seed(), 0.0).unwrap();
        let removed = population.remove(first).unwrap();
        assert_eq!(population.len(), 1);
        assert!(population.by_id(removed.id).is_none());
        assert!(matches!(
            population.get(first),
            Err(SimError::UnknownParticle(_))
        ));

        let third = population.seed(&seed(), 0.0).unwrap();
        assert_eq!(third.slot, first.slot);
    }

    #[test]
    fn test_upsert_replaces_copy() {
        let mut population = Population::serial();
        let handle = population.seed(&seed(), 0.0).unwrap();
        let mut copy = population.get(handle).unwrap().clone();
        copy.state.velocity = Vector3::new(9.0, 0.0, 0.0);
        copy.role = ParticleRole::Slave;
        let again = population.upsert(copy);
        assert_eq!(again, handle);
        assert_eq!(population.len(), 1);
        assert_eq!(population.get(handle).unwrap().state.velocity.x, 9.0);
    }

    #[test]
    fn test_register_contact_unknown_particle() {
        let mut population = Population::serial();
        let err = population
            .register_contact(
                ParticleId::new(42),
                ContactPair::Boundary {
                    mesh_face: 0,
                    solid_side: true,
                },
            )
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownParticle(_)));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut population = Population::serial();
        let handle = population.seed(&seed(), 0.0).unwrap();
        let copy = population.get(handle).unwrap().clone();
        assert!(population.insert(copy).is_err());
    }
}
