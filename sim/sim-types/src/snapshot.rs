//! Saved kinematic states for nested iteration levels.
//!
//! Every particle carries four independent checkpoints. The outer solver
//! nests its loops arbitrarily (motion sub-steps inside coupling
//! iterations inside collision sub-steps), so saving one slot must never
//! disturb another.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::state::KinematicState;
use crate::{Result, SimError};

/// Addressable checkpoint slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateSlot {
    /// Motion sub-stepping.
    Subcycling,
    /// Generic save/restore around constraint evaluation.
    Intermediate,
    /// Multi-substep resolution of deep penetration.
    PreCollision,
    /// Repeated fluid-solid coupling iterations within one step.
    IterativeCoupling,
}

impl StateSlot {
    /// All slots.
    pub const ALL: [Self; 4] = [
        Self::Subcycling,
        Self::Intermediate,
        Self::PreCollision,
        Self::IterativeCoupling,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Subcycling => 0,
            Self::Intermediate => 1,
            Self::PreCollision => 2,
            Self::IterativeCoupling => 3,
        }
    }

    /// Slot name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Subcycling => "subcycling",
            Self::Intermediate => "intermediate",
            Self::PreCollision => "pre-collision",
            Self::IterativeCoupling => "iterative-coupling",
        }
    }
}

/// Point-in-time copy of a particle's kinematics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    /// Center of gravity.
    pub cg: Point3<f64>,
    /// Net displacement.
    pub displacement: Vector3<f64>,
    /// Inertia tensor.
    pub inertia: Matrix3<f64>,
    /// Linear velocity.
    pub velocity: Vector3<f64>,
    /// Averaged linear velocity.
    pub averaged_velocity: Vector3<f64>,
    /// Angular velocity.
    pub omega: Vector3<f64>,
    /// Averaged angular velocity.
    pub averaged_omega: Vector3<f64>,
    /// Accumulated force.
    pub total_force: Vector3<f64>,
    /// Accumulated torque.
    pub total_torque: Vector3<f64>,
    /// Orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Surface points, when requested at save time.
    pub points: Option<Vec<Point3<f64>>>,
}

impl SavedState {
    /// Capture the kinematic part of a state.
    #[must_use]
    pub fn capture(state: &KinematicState, points: Option<Vec<Point3<f64>>>) -> Self {
        Self {
            cg: state.cg,
            displacement: state.displacement,
            inertia: state.inertia,
            velocity: state.velocity,
            averaged_velocity: state.averaged_velocity,
            omega: state.omega,
            averaged_omega: state.averaged_omega,
            total_force: state.total_force,
            total_torque: state.total_torque,
            orientation: state.orientation,
            points,
        }
    }

    /// Write the captured values back. Accelerations are left untouched.
    pub fn apply_to(&self, state: &mut KinematicState) {
        state.cg = self.cg;
        state.displacement = self.displacement;
        state.inertia = self.inertia;
        state.velocity = self.velocity;
        state.averaged_velocity = self.averaged_velocity;
        state.omega = self.omega;
        state.averaged_omega = self.averaged_omega;
        state.total_force = self.total_force;
        state.total_torque = self.total_torque;
        state.orientation = self.orientation;
    }
}

/// Four independent checkpoints owned by one particle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateStore {
    slots: [Option<SavedState>; 4],
}

impl StateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot, replacing whatever the slot held.
    pub fn save(&mut self, slot: StateSlot, saved: SavedState) {
        self.slots[slot.index()] = Some(saved);
    }

    /// Read a slot without consuming it.
    pub fn get(&self, slot: StateSlot) -> Result<&SavedState> {
        self.slots[slot.index()]
            .as_ref()
            .ok_or(SimError::SnapshotMissing { slot: slot.name() })
    }

    /// Whether the slot holds a snapshot.
    #[must_use]
    pub fn is_saved(&self, slot: StateSlot) -> bool {
        self.slots[slot.index()].is_some()
    }

    /// Drop a slot's snapshot.
    pub fn clear(&mut self, slot: StateSlot) {
        self.slots[slot.index()] = None;
    }
}
