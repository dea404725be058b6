//! The constraint abstraction.

use std::collections::BTreeSet;
use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use sim_core::{distribute_value, Communicator, HostMesh};
use sim_types::{Dict, Particle, ParticleId, PopulationId, Result, SimError};

/// The stage of a step in which a constraint runs.
///
/// Stages run in declaration order of this enum; within a stage,
/// constraints run in configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintCategory {
    /// Modifies total force and torque.
    Force,
    /// Modifies linear and angular acceleration.
    Acceleration,
    /// Modifies velocities after the first half-step.
    Velocity,
    /// Modifies the pending motion before it is applied.
    Position,
}

impl ConstraintCategory {
    /// All categories in stage order.
    pub const ALL: [Self; 4] = [
        Self::Force,
        Self::Acceleration,
        Self::Velocity,
        Self::Position,
    ];

    /// Lower-case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::Acceleration => "acceleration",
            Self::Velocity => "velocity",
            Self::Position => "position",
        }
    }
}

impl fmt::Display for ConstraintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which particles a constraint applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParticleSelection {
    /// Every particle.
    #[default]
    All,
    /// Particles with these identifiers.
    Ids(BTreeSet<ParticleId>),
    /// Particles seeded by these populations.
    Populations(BTreeSet<PopulationId>),
}

impl ParticleSelection {
    /// Read the optional `selection` key.
    ///
    /// `ids` reads the `ids` list and `population` the `populations` list.
    pub fn from_dict(dict: &Dict, context: &str) -> Result<Self> {
        match dict.word_opt("selection")? {
            None | Some("all") => Ok(Self::All),
            Some("ids") => Ok(Self::Ids(
                dict.counts("ids", context)?
                    .into_iter()
                    .map(ParticleId::new)
                    .collect(),
            )),
            Some("population") => {
                let mut populations = BTreeSet::new();
                for raw in dict.counts("populations", context)? {
                    let id = u32::try_from(raw).map_err(|_| {
                        SimError::invalid_config(format!("population {raw} is out of range"))
                    })?;
                    populations.insert(PopulationId(id));
                }
                Ok(Self::Populations(populations))
            }
            Some(other) => Err(SimError::InvalidSelection {
                mode: other.to_string(),
            }),
        }
    }

    /// Whether `particle` is selected.
    #[must_use]
    pub fn matches(&self, particle: &Particle) -> bool {
        match self {
            Self::All => true,
            Self::Ids(ids) => ids.contains(&particle.id),
            Self::Populations(populations) => populations.contains(&particle.population),
        }
    }
}

/// Everything a constraint may read besides the particle itself.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Simulation time at the end of the step.
    pub time: f64,
    /// Time step.
    pub dt: f64,
    /// The host mesh of this rank.
    pub host: &'a dyn HostMesh,
    /// Communicator over all ranks.
    pub comm: &'a dyn Communicator,
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("time", &self.time)
            .field("dt", &self.dt)
            .field("rank", &self.comm.rank())
            .finish_non_exhaustive()
    }
}

impl<'a> StepContext<'a> {
    /// Create a context.
    #[must_use]
    pub fn new(time: f64, dt: f64, host: &'a dyn HostMesh, comm: &'a dyn Communicator) -> Self {
        Self {
            time,
            dt,
            host,
            comm,
        }
    }

    /// Whether this rank decides values for `particle`.
    #[must_use]
    pub fn decides(&self, particle: &Particle) -> bool {
        particle.owners.len() <= 1 || particle.master == self.comm.rank()
    }

    /// Compute a value on the deciding owner of `particle` and make it known
    /// to every owner.
    ///
    /// Every owner must call this for the same particle in the same order.
    /// A failure on the deciding rank is reported on every owner.
    pub fn decide<T, F>(&self, particle: &Particle, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        self.decide_among(&particle.owners, particle.master, compute)
    }

    /// [`decide`](Self::decide) for an owner set held apart from the
    /// particle, so that `compute` may mutate the particle.
    pub fn decide_among<T, F>(&self, owners: &BTreeSet<usize>, master: usize, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if owners.len() <= 1 {
            return compute();
        }
        if self.comm.rank() == master {
            match compute() {
                Ok(value) => {
                    let shared: std::result::Result<T, String> = Ok(value);
                    distribute_value(self.comm, master, owners, Some(shared))?
                        .map_err(SimError::communication)
                }
                Err(err) => {
                    let shared: std::result::Result<T, String> = Err(err.to_string());
                    distribute_value(self.comm, master, owners, Some(shared))?;
                    Err(err)
                }
            }
        } else {
            distribute_value::<std::result::Result<T, String>, _>(self.comm, master, owners, None)?
                .map_err(|reason| {
                    SimError::communication(format!("deciding rank {master} failed: {reason}"))
                })
        }
    }
}

/// A configured per-particle modification.
pub trait Constraint: fmt::Debug + Send {
    /// Registry name, e.g. `fixedAxisForce`.
    fn name(&self) -> &'static str;

    /// Stage the constraint runs in.
    fn category(&self) -> ConstraintCategory;

    /// Particles the constraint applies to.
    fn selection(&self) -> &ParticleSelection;

    /// Apply the constraint to one selected particle.
    fn constrain(&mut self, particle: &mut Particle, ctx: &StepContext<'_>) -> Result<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use sim_types::DictValue;

    #[test]
    fn test_selection_modes() {
        let all = ParticleSelection::from_dict(&Dict::new(), "test").unwrap();
        assert_eq!(all, ParticleSelection::All);

        let ids = Dict::new()
            .with("selection", DictValue::Word("ids".into()))
            .with(
                "ids",
                DictValue::List(vec![DictValue::Scalar(3.0), DictValue::Scalar(7.0)]),
            );
        assert_eq!(
            ParticleSelection::from_dict(&ids, "test").unwrap(),
            ParticleSelection::Ids(BTreeSet::from([ParticleId::new(3), ParticleId::new(7)]))
        );

        let populations = Dict::new()
            .with("selection", DictValue::Word("population".into()))
            .with("populations", DictValue::Scalar(2.0));
        assert_eq!(
            ParticleSelection::from_dict(&populations, "test").unwrap(),
            ParticleSelection::Populations(BTreeSet::from([PopulationId(2)]))
        );
    }

    #[test]
    fn test_unknown_selection_is_fatal() {
        let dict = Dict::new().with("selection", DictValue::Word("nearest".into()));
        let err = ParticleSelection::from_dict(&dict, "test").unwrap_err();
        assert!(matches!(err, SimError::InvalidSelection { mode } if mode == "nearest"));
    }

    #[test]
    fn test_ids_selection_needs_ids() {
        let dict = Dict::new().with("selection", DictValue::Word("ids".into()));
        assert!(matches!(
            ParticleSelection::from_dict(&dict, "test"),
            Err(SimError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_stage_order() {
        let mut categories = ConstraintCategory::ALL;
        categories.reverse();
        categories.sort();
        assert_eq!(categories, ConstraintCategory::ALL);
        assert_eq!(ConstraintCategory::Velocity.to_string(), "velocity");
    }
}
