//! Configuration dictionaries.
//!
//! Each constraint is built from a flat dictionary of named values, for
//! example
//!
//! ```json
//! { "type": "fixedAxisForce", "fixedAxis": [0, 0, 1], "selection": "all" }
//! ```
//!
//! Accessors report missing keys and wrong value kinds as
//! [`SimError`] so that a bad dictionary aborts the run at startup.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Result, SimError};

/// A single dictionary value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DictValue {
    /// `true` / `false`.
    Bool(bool),
    /// A number.
    Scalar(f64),
    /// Exactly three numbers.
    Vector([f64; 3]),
    /// A bare word or path.
    Word(String),
    /// A list of values.
    List(Vec<DictValue>),
}

/// Named values describing one configured object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dict {
    entries: BTreeMap<String, DictValue>,
}

impl Dict {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: DictValue) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    /// Insert a value.
    pub fn insert(&mut self, key: impl Into<String>, value: DictValue) {
        self.entries.insert(key.into(), value);
    }

    /// Whether the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Raw value lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DictValue> {
        self.entries.get(key)
    }

    fn required(&self, key: &str, context: &str) -> Result<&DictValue> {
        self.entries
            .get(key)
            .ok_or_else(|| SimError::missing_key(key, context))
    }

    /// Required scalar.
    pub fn scalar(&self, key: &str, context: &str) -> Result<f64> {
        match self.required(key, context)? {
            DictValue::Scalar(v) => Ok(*v),
            _ => Err(wrong(key, "scalar")),
        }
    }

    /// Optional scalar with a default.
    pub fn scalar_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.entries.get(key) {
            None => Ok(default),
            Some(DictValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(wrong(key, "scalar")),
        }
    }

    /// Required non-negative integer.
    pub fn count(&self, key: &str, context: &str) -> Result<usize> {
        let v = self.scalar(key, context)?;
        to_count(key, v)
    }

    /// Optional non-negative integer with a default.
    pub fn count_or(&self, key: &str, default: usize) -> Result<usize> {
        match self.entries.get(key) {
            None => Ok(default),
            Some(DictValue::Scalar(v)) => to_count(key, *v),
            Some(_) => Err(wrong(key, "non-negative integer")),
        }
    }

    /// Required 3-vector.
    pub fn vector(&self, key: &str, context: &str) -> Result<Vector3<f64>> {
        match self.required(key, context)? {
            DictValue::Vector([x, y, z]) => Ok(Vector3::new(*x, *y, *z)),
            _ => Err(wrong(key, "vector of three scalars")),
        }
    }

    /// Optional 3-vector with a default.
    pub fn vector_or(&self, key: &str, default: Vector3<f64>) -> Result<Vector3<f64>> {
        match self.entries.get(key) {
            None => Ok(default),
            Some(DictValue::Vector([x, y, z])) => Ok(Vector3::new(*x, *y, *z)),
            Some(_) => Err(wrong(key, "vector of three scalars")),
        }
    }

    /// Required point.
    pub fn point(&self, key: &str, context: &str) -> Result<Point3<f64>> {
        self.vector(key, context).map(Point3::from)
    }

    /// Required word.
    pub fn word(&self, key: &str, context: &str) -> Result<&str> {
        match self.required(key, context)? {
            DictValue::Word(w) => Ok(w),
            _ => Err(wrong(key, "word")),
        }
    }

    /// Optional word.
    pub fn word_opt(&self, key: &str) -> Result<Option<&str>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(DictValue::Word(w)) => Ok(Some(w)),
            Some(_) => Err(wrong(key, "word")),
        }
    }

    /// Optional boolean with a default.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.entries.get(key) {
            None => Ok(default),
            Some(DictValue::Bool(b)) => Ok(*b),
            Some(DictValue::Word(w)) => match w.as_str() {
                "true" | "yes" | "on" => Ok(true),
                "false" | "no" | "off" => Ok(false),
                _ => Err(wrong(key, "boolean")),
            },
            Some(_) => Err(wrong(key, "boolean")),
        }
    }

    /// Required list of words.
    pub fn words(&self, key: &str, context: &str) -> Result<Vec<String>> {
        match self.required(key, context)? {
            DictValue::List(items) => items
                .iter()
                .map(|item| match item {
                    DictValue::Word(w) => Ok(w.clone()),
                    _ => Err(wrong(key, "list of words")),
                })
                .collect(),
            DictValue::Word(w) => Ok(vec![w.clone()]),
            _ => Err(wrong(key, "list of words")),
        }
    }

    /// Required list of non-negative integers.
    pub fn counts(&self, key: &str, context: &str) -> Result<Vec<u64>> {
        let as_u64 = |v: f64| -> Result<u64> {
            to_count(key, v).map(|n| n as u64)
        };
        match self.required(key, context)? {
            DictValue::List(items) => items
                .iter()
                .map(|item| match item {
                    DictValue::Scalar(v) => as_u64(*v),
                    _ => Err(wrong(key, "list of integers")),
                })
                .collect(),
            DictValue::Scalar(v) => Ok(vec![as_u64(*v)?]),
            // three integers deserialize as a vector
            DictValue::Vector(v) => v.iter().map(|x| as_u64(*x)).collect(),
            _ => Err(wrong(key, "list of integers")),
        }
    }
}

fn wrong(key: &str, expected: &'static str) -> SimError {
    SimError::WrongValueType {
        key: key.to_string(),
        expected,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_count(key: &str, v: f64) -> Result<usize> {
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
        Ok(v as usize)
    } else {
        Err(wrong(key, "non-negative integer"))
    }
}
