//! Walls and rotationally periodic sectors during a full step.

use approx::assert_relative_eq;
use sim_physics::prelude::*;
use std::f64::consts::FRAC_1_SQRT_2;

fn floor() -> UniformGridMesh {
    UniformGridMesh::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0), [10, 10, 10])
        .unwrap()
        .with_wall(Point3::new(0.0, 0.0, 0.1), Vector3::z())
        .unwrap()
}

fn unit_grid() -> BackgroundGrid {
    BackgroundGrid::single(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
}

#[test]
fn particle_bounces_off_floor() {
    let host = floor();
    let grid = unit_grid();
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let pipeline = ConstraintPipeline::from_json(
        r#"{ "constraints": [
            { "type": "wallBounce", "restitution": 0.5, "contactDistance": 0.02 }
        ] }"#,
    )
    .unwrap();
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(0.001), pipeline).unwrap();

    let mut population = Population::serial();
    population
        .seed(
            &ParticleSeed::new(SurfaceMesh::icosahedron(0.05), 1000.0)
                .displacement(Vector3::new(0.5, 0.5, 0.152))
                .velocity(Vector3::new(0.0, 0.0, -1.0)),
            0.0,
        )
        .unwrap();

    stepper.step(&mut population, &env).unwrap();
    let p = population.iter().next().unwrap();
    assert_relative_eq!(p.state.velocity.z, 0.5, epsilon = 1e-12);
    assert!(p.state.cg.z > 0.152);

    // Receding from the wall, the next step leaves it alone
    stepper.step(&mut population, &env).unwrap();
    let p = population.iter().next().unwrap();
    assert_relative_eq!(p.state.velocity.z, 0.5, epsilon = 1e-12);
}

#[test]
fn slow_sticked_particle_deposits() {
    let host = floor();
    let grid = unit_grid();
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let pipeline = ConstraintPipeline::from_json(
        r#"{ "constraints": [
            { "type": "deposition", "contactDistance": 0.005, "solidThreshold": 0.5,
              "depositionSpeed": 0.1 }
        ] }"#,
    )
    .unwrap();
    let dt = 0.01;
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(dt), pipeline).unwrap();

    let mut population = Population::serial();
    population
        .seed(
            &ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0)
                .displacement(Vector3::new(0.5, 0.5, 0.151))
                .velocity(Vector3::new(0.01, 0.02, -0.5)),
            0.0,
        )
        .unwrap();
    for p in population.iter_mut() {
        p.flags.sticked = true;
    }
    let start = population.iter().next().unwrap().state.cg;

    stepper.run(&mut population, &env, 3).unwrap();

    let p = population.iter().next().unwrap();
    assert!(p.flags.deposited);
    assert_eq!(p.flags.deposited_since, Some(dt));
    assert_eq!(p.state.velocity, Vector3::zeros());
    assert_eq!(p.state.averaged_velocity, Vector3::zeros());
    assert_eq!(p.state.omega, Vector3::zeros());
    assert_eq!(p.state.cg, start);
}

#[test]
fn cyclic_sector_wraps_particle_back() {
    let host = UniformGridMesh::new(
        Point3::new(-1.0, -1.0, -1.0),
        Point3::new(1.0, 1.0, 1.0),
        [4, 4, 4],
    )
    .unwrap();
    let grid = BackgroundGrid::single(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let pipeline = ConstraintPipeline::from_json(
        r#"{ "constraints": [
            { "type": "cyclicSector", "origin": [0, 0, 0], "axisRot": [0, 0, 1],
              "axisSpan": [1, 0, 0], "sectorAngleDeg": 30 }
        ] }"#,
    )
    .unwrap();
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(0.05), pipeline).unwrap();

    // Heads for 45 degrees, outside the 30 degree sector
    let mut population = Population::serial();
    population
        .seed(
            &ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0)
                .displacement(Vector3::new(0.5, 0.0, 0.0))
                .velocity(Vector3::new(0.0, 10.0, 0.0)),
            0.0,
        )
        .unwrap();

    stepper.step(&mut population, &env).unwrap();

    let p = population.iter().next().unwrap();
    let radius = 0.5_f64.hypot(0.5);
    assert_relative_eq!(p.state.cg, Point3::new(radius, 0.0, 0.0), epsilon = 1e-9);
    assert_relative_eq!(
        p.state.velocity,
        Vector3::new(10.0 * FRAC_1_SQRT_2, 10.0 * FRAC_1_SQRT_2, 0.0),
        epsilon = 1e-9
    );
    assert_relative_eq!(p.surface.centroid(), p.state.cg, epsilon = 1e-9);
}
