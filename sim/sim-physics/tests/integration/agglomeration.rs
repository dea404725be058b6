//! Touching particles merged into one rigid body for a step.

use approx::assert_relative_eq;
use sim_physics::prelude::*;

fn host() -> UniformGridMesh {
    UniformGridMesh::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0), [4, 4, 4])
        .unwrap()
}

fn grid() -> BackgroundGrid {
    BackgroundGrid::single(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
}

/// Cubes of 2 kg and 3 kg side by side, moving in different directions.
fn touching_pair() -> Population {
    let mut population = Population::serial();
    population
        .seed(
            &ParticleSeed::new(SurfaceMesh::cube(0.05), 2000.0).velocity(Vector3::x()),
            0.0,
        )
        .unwrap();
    population
        .seed(
            &ParticleSeed::new(SurfaceMesh::cube(0.05), 3000.0)
                .displacement(Vector3::new(0.1, 0.0, 0.0))
                .velocity(Vector3::y()),
            0.0,
        )
        .unwrap();
    population
}

#[test]
fn touching_pair_moves_as_one_body() {
    let host = host();
    let grid = grid();
    let detector = BoundingSphereDetector::new(0.0);
    let env = StepEnvironment::new(&host, &detector, &grid, &SingleRank);
    let mut stepper =
        Stepper::new(SimulationConfig::with_timestep(0.01), ConstraintPipeline::new()).unwrap();
    let mut population = touching_pair();

    let report = stepper.step(&mut population, &env).unwrap();
    assert_eq!(report.clusters, 1);

    let a = population.by_id(ParticleId::new(0)).unwrap();
    let b = population.by_id(ParticleId::new(1)).unwrap();

    // Both members carry the same cluster values
    let common_a = a.agglomeration.as_ref().unwrap();
    let common_b = b.agglomeration.as_ref().unwrap();
    assert_eq!(common_a, common_b);
    assert_relative_eq!(common_a.mass, 5.0, epsilon = 1e-9);
    assert_relative_eq!(common_a.velocity, Vector3::new(0.4, 0.6, 0.0), epsilon = 1e-9);

    // Linear momentum is conserved without external force
    let momentum = a.state.velocity * a.mass() + b.state.velocity * b.mass();
    assert_relative_eq!(momentum, Vector3::new(2.0, 3.0, 0.0), epsilon = 1e-9);

    // Member velocities differ only by the common rotation
    assert_eq!(a.state.omega, b.state.omega);
    let relative = b.state.velocity - a.state.velocity;
    let lever = b.state.cg - a.state.cg;
    assert_relative_eq!(relative, a.state.omega.cross(&lever), epsilon = 1e-9);
    assert!(a.state.omega.z.abs() > 0.0);
}

#[test]
fn separated_particles_move_freely() {
    let host = host();
    let grid = grid();
    let detector = BoundingSphereDetector::new(0.0);
    let env = StepEnvironment::new(&host, &detector, &grid, &SingleRank);
    let mut stepper =
        Stepper::new(SimulationConfig::with_timestep(0.01), ConstraintPipeline::new()).unwrap();

    let mut population = Population::serial();
    for x in [-0.5, 0.5] {
        population
            .seed(
                &ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0)
                    .displacement(Vector3::new(x, 0.0, 0.0))
                    .velocity(Vector3::z()),
                0.0,
            )
            .unwrap();
    }

    let report = stepper.step(&mut population, &env).unwrap();
    assert_eq!(report.clusters, 0);
    for p in population.iter() {
        assert!(p.agglomeration.is_none());
        assert_relative_eq!(p.state.velocity, Vector3::z(), epsilon = 1e-12);
    }
}

fn step_once(population: &mut Population, pipeline: &str, dt: f64) -> StepReport {
    let host = host();
    let grid = grid();
    let detector = BoundingSphereDetector::new(0.0);
    let env = StepEnvironment::new(&host, &detector, &grid, &SingleRank);
    let pipeline = ConstraintPipeline::from_json(pipeline).unwrap();
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(dt), pipeline).unwrap();
    stepper.step(population, &env).unwrap()
}

#[test]
fn deposited_particle_stays_out_of_cluster() {
    let mut population = touching_pair();
    population.by_id_mut(ParticleId::new(0)).unwrap().flags.deposited = true;
    let start_a = population.by_id(ParticleId::new(0)).unwrap().state.cg;
    let start_b = population.by_id(ParticleId::new(1)).unwrap().state.cg;

    let report = step_once(
        &mut population,
        r#"{ "constraints": [
            { "type": "deposition", "contactDistance": 0.005, "solidThreshold": 0.5,
              "depositionSpeed": 0.1 }
        ] }"#,
        0.01,
    );
    assert_eq!(report.clusters, 0);

    let a = population.by_id(ParticleId::new(0)).unwrap();
    assert!(a.agglomeration.is_none());
    assert_eq!(a.state.velocity, Vector3::zeros());
    assert_eq!(a.state.cg, start_a);

    // The partner keeps its own velocity instead of being dragged along
    let b = population.by_id(ParticleId::new(1)).unwrap();
    assert!(b.agglomeration.is_none());
    assert_relative_eq!(b.state.velocity, Vector3::y(), epsilon = 1e-12);
    assert_relative_eq!(b.state.cg, start_b + Vector3::y() * 0.01, epsilon = 1e-12);
}

#[test]
fn pinned_member_does_not_follow_cluster_motion() {
    let mut population = touching_pair();
    let start_a = population.by_id(ParticleId::new(0)).unwrap().state.cg;
    let start_b = population.by_id(ParticleId::new(1)).unwrap().state.cg;

    let report = step_once(
        &mut population,
        r#"{ "constraints": [
            { "type": "staticVelocity", "staticVelocity": [0, 0, 0],
              "selection": "ids", "ids": [0] }
        ] }"#,
        0.01,
    );
    assert_eq!(report.clusters, 1);

    let a = population.by_id(ParticleId::new(0)).unwrap();
    assert_eq!(a.state.velocity, Vector3::zeros());
    assert_relative_eq!(a.state.cg, start_a, epsilon = 1e-15);
    assert_relative_eq!(a.surface.centroid(), start_a, epsilon = 1e-12);

    // The unconstrained member still moves with the cluster
    let b = population.by_id(ParticleId::new(1)).unwrap();
    let common = b.agglomeration.as_ref().unwrap();
    assert_relative_eq!(common.velocity, Vector3::new(0.4, 0.6, 0.0), epsilon = 1e-9);
    assert!((b.state.cg - start_b).norm() > 1e-3);
}

#[test]
fn damped_members_pass_damping_to_cluster() {
    // Two 1 kg cubes at rest, each pushed by 1 N
    let mut population = Population::serial();
    for x in [0.0, 0.1] {
        population
            .seed(
                &ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0)
                    .displacement(Vector3::new(x, 0.0, 0.0)),
                0.0,
            )
            .unwrap();
    }

    let report = step_once(
        &mut population,
        r#"{ "constraints": [
            { "type": "addForce", "addForce": [1.0, 0, 0] },
            { "type": "inertialDamping", "dampingFactor": 0.5 }
        ] }"#,
        0.1,
    );
    assert_eq!(report.clusters, 1);

    for p in population.iter() {
        let common = p.agglomeration.as_ref().unwrap();
        assert_relative_eq!(common.force, Vector3::new(4.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(p.state.acceleration, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(p.state.velocity, Vector3::new(0.2, 0.0, 0.0), epsilon = 1e-9);
    }
}
