//! Configuration types for particle stepping.
//!
//! Constraint dictionaries configure individual behaviours; this module
//! holds the settings shared by every particle on a rank.

use serde::{Deserialize, Serialize};

use crate::dict::Dict;

/// Global settings for a particle run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Time step of the particle integration (seconds).
    pub timestep: f64,
    /// Extra radius added to a particle's bounding radius when asking the
    /// background grid which ranks overlap it.
    pub ownership_search_radius: f64,
    /// Remove deposited particles after this many seconds on the wall.
    pub dispose_deposited_after: Option<f64>,
    /// Remove particles whose center of gravity leaves the fluid mesh.
    pub remove_on_exit: bool,
    /// Abort the step when a particle state becomes non-finite.
    pub check_divergence: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0e-4,
            ownership_search_radius: 0.0,
            dispose_deposited_after: None,
            remove_on_exit: true,
            check_divergence: true,
        }
    }
}

impl SimulationConfig {
    /// Create a config with the given timestep.
    #[must_use]
    pub fn with_timestep(timestep: f64) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }

    /// Set the ownership search radius.
    #[must_use]
    pub fn ownership_search_radius(mut self, radius: f64) -> Self {
        self.ownership_search_radius = radius;
        self
    }

    /// Dispose of deposited particles after the given time.
    #[must_use]
    pub fn dispose_deposited_after(mut self, seconds: f64) -> Self {
        self.dispose_deposited_after = Some(seconds);
        self
    }

    /// Keep particles that leave the fluid mesh.
    #[must_use]
    pub fn keep_exited(mut self) -> Self {
        self.remove_on_exit = false;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(crate::SimError::InvalidTimestep(self.timestep));
        }
        if !self.ownership_search_radius.is_finite() || self.ownership_search_radius < 0.0 {
            return Err(crate::SimError::invalid_config(
                "ownership search radius must be finite and non-negative",
            ));
        }
        if let Some(t) = self.dispose_deposited_after {
            if !t.is_finite() || t < 0.0 {
                return Err(crate::SimError::invalid_config(
                    "disposal time must be finite and non-negative",
                ));
            }
        }
        Ok(())
    }
}

/// One configured constraint: its registry name plus its dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    /// Registry name, e.g. `fixedAxisForce`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Remaining keys.
    #[serde(flatten)]
    pub dict: Dict,
}

impl ConstraintSpec {
    /// Create a spec.
    #[must_use]
    pub fn new(type_name: impl Into<String>, dict: Dict) -> Self {
        Self {
            type_name: type_name.into(),
            dict,
        }
    }
}

/// The declared, ordered list of constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Constraints in declaration order.
    pub constraints: Vec<ConstraintSpec>,
}

impl PipelineConfig {
    /// Parse a pipeline from JSON text.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::SimError::invalid_config(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_timestep() {
        let config = SimulationConfig::with_timestep(0.0);
        assert!(matches!(
            config.validate(),
            Err(crate::SimError::InvalidTimestep(_))
        ));
        let config = SimulationConfig::with_timestep(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = SimulationConfig::with_timestep(1e-3)
            .ownership_search_radius(0.01)
            .dispose_deposited_after(0.5)
            .keep_exited();
        assert_eq!(config.dispose_deposited_after, Some(0.5));
        assert!(!config.remove_on_exit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_from_json() {
        let config = PipelineConfig::from_json(
            r#"{ "constraints": [
                { "type": "fixedAxisForce", "fixedAxis": [0, 0, 1] },
                { "type": "inertialDamping", "dampingFactor": 0.5, "rampTime": 0 }
            ] }"#,
        )
        .unwrap();
        assert_eq!(config.constraints.len(), 2);
        assert_eq!(config.constraints[0].type_name, "fixedAxisForce");
        assert!(config.constraints[1].dict.contains("rampTime"));
        assert!(!config.constraints[1].dict.contains("type"));
    }

    #[test]
    fn test_simulation_config_from_json() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "timestep": 0.001, "disposeDepositedAfter": 2.0 }"#)
                .unwrap();
        assert_eq!(config.timestep, 0.001);
        assert_eq!(config.dispose_deposited_after, Some(2.0));
        assert!(config.remove_on_exit);
    }
}
