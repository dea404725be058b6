//! The particle record.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::contact::ContactPair;
use crate::handle::{ParticleHandle, ParticleId, ParticleRole, PopulationId};
use crate::snapshot::{SavedState, StateSlot, StateStore};
use crate::state::{
    CommonFields, ForceField, InjectedLoads, KinematicState, ParticleFlags, PendingMotion,
};
use crate::surface::SurfaceMesh;
use crate::{Result, SimError};

/// A finite-size rigid body immersed in the fluid mesh.
///
/// The particle exclusively owns its surface and its saved states. Contact
/// partners are stored as handles and never imply ownership; they are
/// cleared by [`Particle::begin_step`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    /// Global identifier.
    pub id: ParticleId,
    /// Seeding population.
    pub population: PopulationId,
    /// Simulation time of seeding.
    pub birth_time: f64,
    /// Role of this copy.
    pub role: ParticleRole,
    /// Arena location of the authoritative copy.
    pub handle: ParticleHandle,
    mass: f64,
    density: f64,
    /// Kinematic state.
    pub state: KinematicState,
    /// Triangulated surface in world coordinates.
    pub surface: SurfaceMesh,
    face_forces: BTreeMap<ForceField, Vec<Vector3<f64>>>,
    /// Loads injected by a coupled DEM code.
    pub injected: InjectedLoads,
    /// Contacts discovered this step.
    pub contacts: SmallVec<[ContactPair; 4]>,
    /// Cluster result written this step.
    pub agglomeration: Option<CommonFields>,
    /// Motion to apply at the end of this step.
    pub pending: PendingMotion,
    /// Status flags.
    pub flags: ParticleFlags,
    /// Saved states.
    pub saved: StateStore,
    /// Ranks that currently need to know about this particle.
    pub owners: BTreeSet<usize>,
    /// Owner holding the authoritative copy; decides values that must
    /// agree on every owner.
    pub master: usize,
    /// Time since the particle was released into the flow (coupling property).
    pub dispersion_time: f64,
    /// Release velocity (coupling property).
    pub dispersion_velocity: Vector3<f64>,
}

impl Particle {
    /// Create a particle from a closed surface and a density.
    ///
    /// Mass, center of gravity and inertia are integrated from the surface.
    pub fn new(
        id: ParticleId,
        population: PopulationId,
        birth_time: f64,
        surface: SurfaceMesh,
        density: f64,
    ) -> Result<Self> {
        if !density.is_finite() || density <= 0.0 {
            return Err(SimError::invalid_mass(format!(
                "density of {id} must be positive, got {density}"
            )));
        }
        let volume = surface.volume();
        let mass = density * volume;
        if !mass.is_finite() || mass <= 0.0 {
            return Err(SimError::invalid_mass(format!(
                "{id} encloses volume {volume}; mass must be positive"
            )));
        }
        let cg = surface.centroid();
        let inertia = surface.inertia_about(&cg, density);

        Ok(Self {
            id,
            population,
            birth_time,
            role: ParticleRole::Free,
            handle: ParticleHandle::new(0, 0),
            mass,
            density,
            state: KinematicState {
                cg,
                inertia,
                ..KinematicState::default()
            },
            surface,
            face_forces: BTreeMap::new(),
            injected: InjectedLoads::default(),
            contacts: SmallVec::new(),
            agglomeration: None,
            pending: PendingMotion::default(),
            flags: ParticleFlags::default(),
            saved: StateStore::new(),
            owners: BTreeSet::new(),
            master: 0,
            dispersion_time: 0.0,
            dispersion_velocity: Vector3::zeros(),
        })
    }

    /// Mass (always positive).
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Material density.
    #[must_use]
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Enclosed volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.mass / self.density
    }

    /// Radius of the sphere with the same volume.
    #[must_use]
    pub fn equivalent_radius(&self) -> f64 {
        (3.0 * self.volume() / (4.0 * std::f64::consts::PI)).cbrt()
    }

    /// Reset everything that must not outlive a step.
    pub fn begin_step(&mut self) {
        self.contacts.clear();
        self.agglomeration = None;
        self.pending = PendingMotion::default();
        self.flags.prescribed_velocity = false;
        self.state.total_force = Vector3::zeros();
        self.state.total_torque = Vector3::zeros();
    }

    /// Handles of particle partners touching this particle, deduplicated.
    #[must_use]
    pub fn partners(&self) -> Vec<ParticleHandle> {
        let mut partners: Vec<ParticleHandle> =
            self.contacts.iter().filter_map(ContactPair::partner).collect();
        partners.sort();
        partners.dedup();
        partners
    }

    /// Identifiers of particle partners touching this particle, deduplicated.
    #[must_use]
    pub fn partner_ids(&self) -> Vec<ParticleId> {
        let mut ids: Vec<ParticleId> =
            self.contacts.iter().filter_map(ContactPair::partner_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Whether the agglomeration result has been written this step.
    #[must_use]
    pub fn calculated_agglo(&self) -> bool {
        self.agglomeration.is_some()
    }

    /// Per-face values of a host force field.
    #[must_use]
    pub fn face_forces(&self, field: ForceField) -> Option<&[Vector3<f64>]> {
        self.face_forces.get(&field).map(Vec::as_slice)
    }

    /// Set per-face values of a host force field (one vector per face).
    pub fn set_face_forces(&mut self, field: ForceField, forces: Vec<Vector3<f64>>) -> Result<()> {
        if forces.len() != self.surface.face_count() {
            return Err(SimError::invalid_config(format!(
                "{} field for {} has {} values, surface has {} faces",
                field.name(),
                self.id,
                forces.len(),
                self.surface.face_count()
            )));
        }
        self.face_forces.insert(field, forces);
        Ok(())
    }

    /// Recompute the inertia tensor about the current center of gravity.
    pub fn refresh_inertia(&mut self) {
        self.state.inertia = self.surface.inertia_about(&self.state.cg, self.density);
    }

    /// Inertia of this body about an arbitrary point.
    #[must_use]
    pub fn inertia_about(&self, reference: &Point3<f64>) -> nalgebra::Matrix3<f64> {
        self.surface.inertia_about(reference, self.density)
    }

    /// Save the kinematic state, optionally with the surface points.
    pub fn save_state(&mut self, slot: StateSlot, with_points: bool) {
        let points = with_points.then(|| self.surface.points().to_vec());
        self.saved
            .save(slot, SavedState::capture(&self.state, points));
    }

    /// Restore a previously saved state.
    pub fn restore_state(&mut self, slot: StateSlot) -> Result<()> {
        let saved = self.saved.get(slot)?.clone();
        saved.apply_to(&mut self.state);
        if let Some(points) = saved.points {
            self.surface.set_points(points);
        }
        Ok(())
    }

    /// Translational plus rotational kinetic energy.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        let v = &self.state.velocity;
        let w = &self.state.omega;
        0.5 * self.mass * v.norm_squared() + 0.5 * w.dot(&(self.state.inertia * w))
    }
}
