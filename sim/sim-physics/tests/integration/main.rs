//! Integration tests for the particle stack.
//!
//! These tests drive complete steps through [`sim_physics::Stepper`]:
//! - Constraint stages in order (gravity, damping, prescribed motion)
//! - Contact clusters moving as one rigid body
//! - Wall bounce, deposition and cyclic sectors
//! - Shared particles on several in-process ranks

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

mod agglomeration;
mod distributed;
mod pipeline_flow;
mod wall_response;
