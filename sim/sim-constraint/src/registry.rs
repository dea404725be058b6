//! Name-to-constructor registry.

use std::collections::BTreeMap;

use sim_types::{ConstraintSpec, Dict, Result, SimError};

use crate::acceleration::{FixedAxisRotation, InertialDamping};
use crate::constraint::Constraint;
use crate::force::{AddForce, FixedAxisForce, Gravity, StaticTorque, SurfaceForce};
use crate::position::{BrownianMotion, CyclicSector};
use crate::velocity::{Deposition, MoveFile, StaticOmega, StaticVelocity, WallBounce};

/// Builds a constraint from its dictionary.
pub type ConstraintBuilder = fn(&Dict) -> Result<Box<dyn Constraint>>;

/// Constraint constructors keyed by configuration name.
#[derive(Debug, Clone)]
pub struct ConstraintRegistry {
    builders: BTreeMap<String, ConstraintBuilder>,
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ConstraintRegistry {
    /// A registry with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// A registry with every built-in constraint.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(SurfaceForce::NAME, |d| Ok(Box::new(SurfaceForce::from_dict(d)?)));
        registry.register(Gravity::NAME, |d| Ok(Box::new(Gravity::from_dict(d)?)));
        registry.register(AddForce::NAME, |d| Ok(Box::new(AddForce::from_dict(d)?)));
        registry.register(FixedAxisForce::NAME, |d| Ok(Box::new(FixedAxisForce::from_dict(d)?)));
        registry.register(StaticTorque::NAME, |d| Ok(Box::new(StaticTorque::from_dict(d)?)));
        registry.register(InertialDamping::NAME, |d| Ok(Box::new(InertialDamping::from_dict(d)?)));
        registry.register(FixedAxisRotation::NAME, |d| {
            Ok(Box::new(FixedAxisRotation::from_dict(d)?))
        });
        registry.register(StaticVelocity::NAME, |d| Ok(Box::new(StaticVelocity::from_dict(d)?)));
        registry.register(StaticOmega::NAME, |d| Ok(Box::new(StaticOmega::from_dict(d)?)));
        registry.register(MoveFile::NAME, |d| Ok(Box::new(MoveFile::from_dict(d)?)));
        registry.register(WallBounce::NAME, |d| Ok(Box::new(WallBounce::from_dict(d)?)));
        registry.register(Deposition::NAME, |d| Ok(Box::new(Deposition::from_dict(d)?)));
        registry.register(CyclicSector::NAME, |d| Ok(Box::new(CyclicSector::from_dict(d)?)));
        registry.register(BrownianMotion::NAME, |d| Ok(Box::new(BrownianMotion::from_dict(d)?)));
        registry
    }

    /// Register or replace a constructor.
    pub fn register(&mut self, name: impl Into<String>, builder: ConstraintBuilder) {
        self.builders.insert(name.into(), builder);
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// Build one configured constraint.
    pub fn build(&self, spec: &ConstraintSpec) -> Result<Box<dyn Constraint>> {
        let builder = self
            .builders
            .get(&spec.type_name)
            .ok_or_else(|| SimError::UnknownConstraint {
                name: spec.type_name.clone(),
            })?;
        builder(&spec.dict)
    }
}
