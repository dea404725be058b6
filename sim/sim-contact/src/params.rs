//! Wall-contact parameters.
//!
//! These parameters map to material properties of the particle and the
//! wall it hits.

use serde::{Deserialize, Serialize};
use sim_types::{Result, SimError};

/// Parameters of the wall-bounce model.
///
/// # Bounce Model
///
/// On impact with normal speed `vₙ` the plastic contact radius is
///
/// ```text
/// a = (2·m·vₙ²·(1 − e²)·R / (π·p_y))^¼
/// ```
///
/// The impact dissipates `W_def = (1 − e²)·½·m·vₙ²` in plastic deformation
/// and van der Waals attraction over the contact patch holds
/// `W_adh = A·a² / (12·z₀²)`. The particle adheres when its normal kinetic
/// energy does not exceed `W_def + W_adh`; otherwise it rebounds with
/// normal speed `e·vₙ` and Coulomb friction on the tangential slip.
///
/// # Example
///
/// ```
/// use sim_contact::BounceParams;
///
/// let params = BounceParams::default()
///     .with_restitution(0.8)
///     .with_friction(0.3);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BounceParams {
    /// Coefficient of restitution `e` in `[0, 1]`.
    pub restitution: f64,

    /// Coulomb friction coefficient `μ`.
    ///
    /// Zero leaves the tangential velocity and the spin untouched.
    pub friction: f64,

    /// Yield pressure of the softer material `p_y` (Pa).
    ///
    /// Zero disables the plastic contact patch and with it adhesion.
    pub yield_pressure: f64,

    /// Hamaker constant `A` (J).
    pub hamaker: f64,

    /// Van der Waals cutoff distance `z₀` (m).
    pub cutoff_distance: f64,

    /// Largest surface-to-wall gap still treated as contact (m).
    pub contact_distance: f64,

    /// Immersed-boundary indicator above which a cell counts as wall.
    pub solid_threshold: f64,
}

impl Default for BounceParams {
    fn default() -> Self {
        Self {
            restitution: 0.9,
            friction: 0.0,
            yield_pressure: 0.0,
            hamaker: 0.0,
            cutoff_distance: 4.0e-10, // typical van der Waals cutoff
            contact_distance: 0.0,
            solid_threshold: 0.5,
        }
    }
}

impl BounceParams {
    /// Perfectly elastic, frictionless, non-adhesive walls.
    #[must_use]
    pub fn elastic() -> Self {
        Self {
            restitution: 1.0,
            ..Self::default()
        }
    }

    /// Soot-like particles on a metal wall: low rebound, strong adhesion.
    #[must_use]
    pub fn soot_on_steel() -> Self {
        Self {
            restitution: 0.4,
            friction: 0.3,
            yield_pressure: 1.0e8,
            hamaker: 1.0e-19,
            ..Self::default()
        }
    }

    /// Set the restitution (clamped to `[0, 1]`).
    #[must_use]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Set yield pressure and Hamaker constant.
    #[must_use]
    pub fn with_adhesion(mut self, yield_pressure: f64, hamaker: f64) -> Self {
        self.yield_pressure = yield_pressure;
        self.hamaker = hamaker;
        self
    }

    /// Set the contact distance.
    #[must_use]
    pub fn with_contact_distance(mut self, distance: f64) -> Self {
        self.contact_distance = distance;
        self
    }

    /// Set the solid threshold.
    #[must_use]
    pub fn with_solid_threshold(mut self, threshold: f64) -> Self {
        self.solid_threshold = threshold;
        self
    }

    /// Validate parameters.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::invalid_config("restitution must be in [0, 1]"));
        }
        if self.friction < 0.0 {
            return Err(SimError::invalid_config("friction cannot be negative"));
        }
        if self.yield_pressure < 0.0 || self.hamaker < 0.0 {
            return Err(SimError::invalid_config(
                "yield pressure and Hamaker constant cannot be negative",
            ));
        }
        if self.hamaker > 0.0 && self.cutoff_distance <= 0.0 {
            return Err(SimError::invalid_config(
                "adhesion needs a positive cutoff distance",
            ));
        }
        if self.contact_distance < 0.0 {
            return Err(SimError::invalid_config("contact distance cannot be negative"));
        }
        if !(0.0..=1.0).contains(&self.solid_threshold) {
            return Err(SimError::invalid_config("solid threshold must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Parameters of the deposition model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepositionParams {
    /// Largest surface-to-wall gap still treated as contact (m).
    pub contact_distance: f64,
    /// Immersed-boundary indicator above which a cell counts as wall.
    pub solid_threshold: f64,
    /// An adhered particle slower than this deposits (m/s).
    pub deposition_speed: f64,
}

impl Default for DepositionParams {
    fn default() -> Self {
        Self {
            contact_distance: 0.0,
            solid_threshold: 0.5,
            deposition_speed: 0.0,
        }
    }
}

impl DepositionParams {
    /// Validate parameters.
    pub fn validate(&self) -> Result<()> {
        if self.contact_distance < 0.0 || self.deposition_speed < 0.0 {
            return Err(SimError::invalid_config(
                "contact distance and deposition speed cannot be negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.solid_threshold) {
            return Err(SimError::invalid_config("solid threshold must be in [0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(BounceParams::default().validate().is_ok());
        assert!(BounceParams::elastic().validate().is_ok());
        assert!(BounceParams::soot_on_steel().validate().is_ok());
        assert!(DepositionParams::default().validate().is_ok());
    }

    #[test]
    fn test_restitution_clamped() {
        assert_eq!(BounceParams::default().with_restitution(1.5).restitution, 1.0);
        assert_eq!(BounceParams::default().with_restitution(-0.5).restitution, 0.0);
    }

    #[test]
    fn test_invalid_params() {
        assert!(BounceParams::default().with_friction(-1.0).validate().is_err());
        let mut params = BounceParams::default().with_adhesion(1e8, 1e-19);
        params.cutoff_distance = 0.0;
        assert!(params.validate().is_err());
        assert!(BounceParams::default()
            .with_solid_threshold(2.0)
            .validate()
            .is_err());
    }
}
