//! Constraint stages seen through whole steps.

use approx::assert_relative_eq;
use serde_json::json;
use sim_physics::prelude::*;

fn host() -> UniformGridMesh {
    UniformGridMesh::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0), [4, 4, 4])
        .unwrap()
}

fn grid() -> BackgroundGrid {
    BackgroundGrid::single(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
}

fn pipeline(constraints: serde_json::Value) -> ConstraintPipeline {
    let config: PipelineConfig =
        serde_json::from_value(json!({ "constraints": constraints })).unwrap();
    ConstraintPipeline::from_config(&config, &ConstraintRegistry::default()).unwrap()
}

fn one_cube(density: f64) -> Population {
    let mut population = Population::serial();
    population
        .seed(&ParticleSeed::new(SurfaceMesh::cube(0.05), density), 0.0)
        .unwrap();
    population
}

/// Weight minus buoyancy gives a constant acceleration of `(1 − ρ_f/ρ_p)·g`.
#[test]
fn buoyant_fall_matches_closed_form() {
    let host = host();
    let grid = grid();
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let pipeline = pipeline(json!([
        { "type": "gravity", "g": [0, 0, -9.81], "rho": 1000.0 }
    ]));
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(0.01), pipeline).unwrap();
    let mut population = one_cube(2000.0);

    stepper.run(&mut population, &env, 10).unwrap();

    let p = population.iter().next().unwrap();
    assert_relative_eq!(p.state.acceleration.z, -4.905, epsilon = 1e-9);
    assert_relative_eq!(p.state.velocity.z, -0.4905, epsilon = 1e-9);
    assert_relative_eq!(p.state.cg.z, -0.024525, epsilon = 1e-9);
    assert_relative_eq!(p.state.cg.x, 0.0, epsilon = 1e-12);
}

/// Damping divides the acceleration before the velocity is advanced.
#[test]
fn inertial_damping_scales_response() {
    let host = host();
    let grid = grid();
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let pipeline = pipeline(json!([
        { "type": "addForce", "addForce": [1.0, 0, 0] },
        { "type": "inertialDamping", "dampingFactor": 0.5 }
    ]));
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(0.1), pipeline).unwrap();
    // 2 kg body, undamped acceleration 0.5
    let mut population = one_cube(2000.0);

    stepper.step(&mut population, &env).unwrap();

    let p = population.iter().next().unwrap();
    assert_relative_eq!(p.state.acceleration.x, 0.5 / 0.5, epsilon = 1e-9);
    assert_relative_eq!(p.state.velocity.x, 0.1, epsilon = 1e-9);
}

/// A move file prescribes both velocities; the step honors them exactly.
#[test]
fn move_file_prescribes_motion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("motion.txt");
    std::fs::write(&path, "1 2 3 4 5 6\n").unwrap();

    let host = host();
    let grid = grid();
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let dt = 0.01;
    let pipeline = pipeline(json!([
        { "type": "moveFile", "moveFile": path.to_str().unwrap() }
    ]));
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(dt), pipeline).unwrap();
    let mut population = one_cube(1000.0);

    stepper.step(&mut population, &env).unwrap();

    let p = population.iter().next().unwrap();
    let velocity = Vector3::new(1.0, 2.0, 3.0);
    let omega = Vector3::new(4.0, 5.0, 6.0);
    assert_eq!(p.state.velocity, velocity);
    assert_eq!(p.state.omega, omega);
    assert_relative_eq!(p.state.acceleration, velocity / dt, epsilon = 1e-9);
    assert_relative_eq!(p.state.angular_acceleration, omega / dt, epsilon = 1e-9);
    // the rotation is about the center of gravity, so only the translation moves it
    assert_relative_eq!(p.state.cg, Point3::from(velocity * dt), epsilon = 1e-12);
}

/// A missing move file stops the step with a move-file error.
#[test]
fn missing_move_file_fails_the_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");

    let host = host();
    let grid = grid();
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let pipeline = pipeline(json!([
        { "type": "moveFile", "moveFile": path.to_str().unwrap() }
    ]));
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(0.01), pipeline).unwrap();
    let mut population = one_cube(1000.0);

    let err = stepper.step(&mut population, &env).unwrap_err();
    assert!(matches!(err, SimError::MoveFile { .. }));
}

/// Only selected particles receive a constraint.
#[test]
fn population_selection() {
    let host = host();
    let grid = grid();
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let pipeline = pipeline(json!([
        { "type": "staticVelocity", "staticVelocity": [0, 0, 1.0],
          "selection": "population", "populations": [1] }
    ]));
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(0.01), pipeline).unwrap();

    let mut population = Population::serial();
    for (kind, x) in [(0, -0.5), (1, 0.5)] {
        let seed = ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0)
            .population(PopulationId(kind))
            .displacement(Vector3::new(x, 0.0, 0.0));
        population.seed(&seed, 0.0).unwrap();
    }

    stepper.step(&mut population, &env).unwrap();

    for p in population.iter() {
        let expected = if p.population == PopulationId(1) { 1.0 } else { 0.0 };
        assert_eq!(p.state.velocity.z, expected);
    }
}
