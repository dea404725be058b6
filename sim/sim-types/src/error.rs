//! Error types for particle simulation.

use thiserror::Error;

/// Errors that can occur while building or stepping a particle population.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A constraint type name has no registered constructor.
    #[error("unknown constraint type: {name}")]
    UnknownConstraint {
        /// The configured type name.
        name: String,
    },

    /// A particle selection mode is not one of the supported modes.
    #[error("invalid particle selection mode: {mode}")]
    InvalidSelection {
        /// The configured selection word.
        mode: String,
    },

    /// A required configuration key is absent.
    #[error("missing configuration key '{key}' for {context}")]
    MissingKey {
        /// The missing key.
        key: String,
        /// What was being configured.
        context: String,
    },

    /// A configuration key holds a value of the wrong kind.
    #[error("configuration key '{key}' must be a {expected}")]
    WrongValueType {
        /// The offending key.
        key: String,
        /// Expected value kind.
        expected: &'static str,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMass {
        /// Description of what's wrong.
        reason: String,
    },

    /// An inertia tensor could not be inverted.
    #[error("singular inertia tensor: {context}")]
    SingularInertia {
        /// Where the inversion was attempted.
        context: String,
    },

    /// A saved state was restored before it was ever saved.
    #[error("no saved state in slot {slot}")]
    SnapshotMissing {
        /// Name of the empty slot.
        slot: &'static str,
    },

    /// A handle owned by another rank was dereferenced locally.
    #[error("handle {handle} belongs to rank {owner}, local rank is {local}")]
    ForeignHandle {
        /// Display form of the handle.
        handle: String,
        /// Rank that owns the slot.
        owner: usize,
        /// The local rank.
        local: usize,
    },

    /// No particle lives at the referenced handle or id.
    #[error("unknown particle: {0}")]
    UnknownParticle(String),

    /// An external update command failed or timed out.
    #[error("external command '{command}' failed: {reason}")]
    ExternalCommand {
        /// The command line.
        command: String,
        /// What went wrong.
        reason: String,
    },

    /// A motion file could not be read or parsed.
    #[error("move file '{path}': {reason}")]
    MoveFile {
        /// Path of the file.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// Inter-rank communication failed.
    #[error("communication failure: {reason}")]
    Communication {
        /// Description of the failure.
        reason: String,
    },

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMass {
            reason: reason.into(),
        }
    }

    /// Create a singular inertia error.
    #[must_use]
    pub fn singular_inertia(context: impl Into<String>) -> Self {
        Self::SingularInertia {
            context: context.into(),
        }
    }

    /// Create a missing key error.
    #[must_use]
    pub fn missing_key(key: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingKey {
            key: key.into(),
            context: context.into(),
        }
    }

    /// Create a communication error.
    #[must_use]
    pub fn communication(reason: impl Into<String>) -> Self {
        Self::Communication {
            reason: reason.into(),
        }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    ///
    /// Configuration errors abort the run at startup.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::UnknownConstraint { .. }
                | Self::InvalidSelection { .. }
                | Self::MissingKey { .. }
                | Self::WrongValueType { .. }
        )
    }
}
