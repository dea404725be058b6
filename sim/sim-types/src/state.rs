//! Kinematic state of a rigid particle.
//!
//! Everything the integrator reads or writes lives in [`KinematicState`].
//! Values are expressed in world coordinates; angular quantities refer to
//! the particle's center of gravity.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Named per-face force field populated by the host solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ForceField {
    /// Pressure and viscous stresses of the fluid.
    Fluid,
    /// Solid-solid contact stresses resolved by the host.
    Solid,
    /// Thermophoretic forces.
    Thermal,
    /// Electromagnetic forces.
    Electromagnetic,
    /// Contact forces reported by a coupled DEM code.
    Contact,
}

impl ForceField {
    /// All fields, in summation order.
    pub const ALL: [Self; 5] = [
        Self::Fluid,
        Self::Solid,
        Self::Thermal,
        Self::Electromagnetic,
        Self::Contact,
    ];

    /// Parse a configuration word.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fluid" => Some(Self::Fluid),
            "solid" => Some(Self::Solid),
            "thermal" => Some(Self::Thermal),
            "electromagnetic" | "em" => Some(Self::Electromagnetic),
            "contact" => Some(Self::Contact),
            _ => None,
        }
    }

    /// Configuration word for this field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fluid => "fluid",
            Self::Solid => "solid",
            Self::Thermal => "thermal",
            Self::Electromagnetic => "electromagnetic",
            Self::Contact => "contact",
        }
    }
}

/// Position, orientation and their derivatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    /// Center of gravity.
    pub cg: Point3<f64>,
    /// Orientation relative to the seeded template.
    pub orientation: UnitQuaternion<f64>,
    /// Net translation since seeding.
    pub displacement: Vector3<f64>,
    /// Inertia tensor about `cg` in world coordinates.
    pub inertia: Matrix3<f64>,
    /// Instantaneous linear velocity.
    pub velocity: Vector3<f64>,
    /// Velocity averaged over the current step (the one that moves the body).
    pub averaged_velocity: Vector3<f64>,
    /// Instantaneous angular velocity.
    pub omega: Vector3<f64>,
    /// Angular velocity averaged over the current step.
    pub averaged_omega: Vector3<f64>,
    /// Linear acceleration.
    pub acceleration: Vector3<f64>,
    /// Angular acceleration.
    pub angular_acceleration: Vector3<f64>,
    /// Force accumulated by force constraints this step.
    pub total_force: Vector3<f64>,
    /// Torque about `cg` accumulated by force constraints this step.
    pub total_torque: Vector3<f64>,
}

impl Default for KinematicState {
    fn default() -> Self {
        Self {
            cg: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            displacement: Vector3::zeros(),
            inertia: Matrix3::zeros(),
            velocity: Vector3::zeros(),
            averaged_velocity: Vector3::zeros(),
            omega: Vector3::zeros(),
            averaged_omega: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            angular_acceleration: Vector3::zeros(),
            total_force: Vector3::zeros(),
            total_torque: Vector3::zeros(),
        }
    }
}

impl KinematicState {
    /// Rotation tensor of the current orientation.
    #[must_use]
    pub fn orientation_matrix(&self) -> Matrix3<f64> {
        self.orientation.to_rotation_matrix().into_inner()
    }

    /// Velocity of a material point rigidly attached to the body.
    #[must_use]
    pub fn velocity_at(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.velocity + self.omega.cross(&(point - self.cg))
    }

    /// Check if the state contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cg.coords.iter().all(|x| x.is_finite())
            && self.orientation.coords.iter().all(|x| x.is_finite())
            && self.velocity.iter().all(|x| x.is_finite())
            && self.omega.iter().all(|x| x.is_finite())
    }
}

/// Forces injected from outside the constraint pipeline (coupled DEM code).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InjectedLoads {
    /// Extra force.
    pub force: Vector3<f64>,
    /// Extra torque about the center of gravity.
    pub torque: Vector3<f64>,
    /// Extra linear acceleration.
    pub acceleration: Vector3<f64>,
}

impl Default for InjectedLoads {
    fn default() -> Self {
        Self {
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            acceleration: Vector3::zeros(),
        }
    }
}

/// Motion computed for the current step, applied once after position constraints.
///
/// The rotation is about the particle's own center of gravity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingMotion {
    /// Translation of the center of gravity.
    pub displacement: Vector3<f64>,
    /// Incremental rotation.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for PendingMotion {
    fn default() -> Self {
        Self {
            displacement: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// Quantities shared by every member of a contact cluster for one step.
///
/// Presence on a particle means the cluster result has been computed and
/// written; absence means no cluster result exists yet this step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonFields {
    /// Index of the cluster in this step's contact graph.
    pub cluster: usize,
    /// Total cluster mass.
    pub mass: f64,
    /// Common center of gravity at the start of the step.
    pub cg: Point3<f64>,
    /// Inertia tensor of the cluster about `cg`.
    pub inertia: Matrix3<f64>,
    /// Summed force.
    pub force: Vector3<f64>,
    /// Summed torque about `cg`.
    pub torque: Vector3<f64>,
    /// Cluster velocity at the end of the step.
    pub velocity: Vector3<f64>,
    /// Cluster angular velocity at the end of the step.
    pub omega: Vector3<f64>,
}

/// Per-step and persistent status flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleFlags {
    /// Adhered to a wall after an impact (persistent).
    pub sticked: bool,
    /// Deposited on a wall (persistent).
    pub deposited: bool,
    /// Simulation time at which the particle deposited.
    pub deposited_since: Option<f64>,
    /// Velocity was imposed this step; skip the closing half-step.
    pub prescribed_velocity: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_force_field_names_round_trip() {
        for field in ForceField::ALL {
            assert_eq!(ForceField::from_name(field.name()), Some(field));
        }
        assert_eq!(ForceField::from_name("em"), Some(ForceField::Electromagnetic));
        assert_eq!(ForceField::from_name("gravity"), None);
    }

    #[test]
    fn test_velocity_at_point() {
        let state = KinematicState {
            omega: Vector3::new(0.0, 0.0, 1.0),
            ..Default::default()
        };
        let v = state.velocity_at(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_default_orientation_matrix_is_identity() {
        let state = KinematicState::default();
        assert_relative_eq!(state.orientation_matrix(), Matrix3::identity(), epsilon = 1e-12);
        assert!(state.is_finite());
    }
}
