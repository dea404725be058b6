//! Two in-process ranks splitting the domain into slabs along x.
//!
//! Each rank runs in its own thread with a [`LocalGroup`] communicator.
//! Rank 0 seeds the particle; rank 1 learns of it through ownership
//! synchronization.

use approx::assert_relative_eq;
use sim_physics::prelude::*;
use sim_physics::RemovalReason;

fn domain() -> UniformGridMesh {
    UniformGridMesh::new(Point3::origin(), Point3::new(2.0, 1.0, 1.0), [8, 4, 4]).unwrap()
}

fn two_slabs() -> BackgroundGrid {
    BackgroundGrid::slabs(Point3::origin(), Point3::new(2.0, 1.0, 1.0), 0, 2).unwrap()
}

fn cube_at(position: Vector3<f64>, velocity: Vector3<f64>) -> ParticleSeed {
    ParticleSeed::new(SurfaceMesh::cube(0.05), 1000.0)
        .displacement(position)
        .velocity(velocity)
}

/// Step both ranks `steps` times and return each rank's population and reports.
fn run_two_ranks(
    pipeline: &str,
    dt: f64,
    steps: usize,
    seed: &ParticleSeed,
) -> Vec<(Population, Vec<StepReport>)> {
    let host = domain();
    let grid = two_slabs();
    std::thread::scope(|scope| {
        let handles: Vec<_> = LocalGroup::create(2)
            .into_iter()
            .map(|comm| {
                let host = &host;
                let grid = &grid;
                scope.spawn(move || {
                    let rank = comm.rank();
                    let mut population = Population::new(rank, comm.size());
                    if rank == 0 {
                        population.seed(seed, 0.0).unwrap();
                    }
                    let pipeline = ConstraintPipeline::from_json(pipeline).unwrap();
                    let mut stepper =
                        Stepper::new(SimulationConfig::with_timestep(dt), pipeline).unwrap();
                    let env = StepEnvironment::new(host, &NoContacts, grid, &comm);
                    let reports = stepper.run(&mut population, &env, steps).unwrap();
                    (population, reports)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

fn run_serial(pipeline: &str, dt: f64, steps: usize, seed: &ParticleSeed) -> Population {
    let host = domain();
    let grid = BackgroundGrid::single(Point3::origin(), Point3::new(2.0, 1.0, 1.0));
    let env = StepEnvironment::new(&host, &NoContacts, &grid, &SingleRank);
    let pipeline = ConstraintPipeline::from_json(pipeline).unwrap();
    let mut stepper = Stepper::new(SimulationConfig::with_timestep(dt), pipeline).unwrap();
    let mut population = Population::serial();
    population.seed(seed, 0.0).unwrap();
    stepper.run(&mut population, &env, steps).unwrap();
    population
}

#[test]
fn shared_particle_matches_serial_run() {
    let pipeline = r#"{ "constraints": [
        { "type": "addForce", "addForce": [0, 0.5, 0] },
        { "type": "brownianMotion", "diffFactor": 1e-6, "seed": 7 }
    ] }"#;
    // Straddles x = 1 with its center on rank 0
    let seed = cube_at(Vector3::new(0.97, 0.5, 0.5), Vector3::zeros());

    let ranks = run_two_ranks(pipeline, 0.01, 5, &seed);
    let serial = run_serial(pipeline, 0.01, 5, &seed);

    let id = ParticleId::new(0);
    let expected = serial.by_id(id).unwrap();
    let master = ranks[0].0.by_id(id).unwrap();
    let slave = ranks[1].0.by_id(id).unwrap();

    assert_eq!(master.role, ParticleRole::Master);
    assert_eq!(slave.role, ParticleRole::Slave);
    assert_eq!(master.master, 0);
    assert_eq!(slave.owners, master.owners);

    assert_relative_eq!(master.state.cg, expected.state.cg, epsilon = 1e-12);
    assert_relative_eq!(master.state.velocity, expected.state.velocity, epsilon = 1e-12);
    assert_eq!(slave.state.cg, master.state.cg);
    assert_eq!(slave.state.velocity, master.state.velocity);
    assert_relative_eq!(slave.surface.centroid(), master.surface.centroid(), epsilon = 1e-15);
}

#[test]
fn particle_migrates_to_next_rank() {
    let pipeline = r#"{ "constraints": [] }"#;
    let seed = cube_at(Vector3::new(0.9, 0.5, 0.5), Vector3::x());

    let ranks = run_two_ranks(pipeline, 0.05, 8, &seed);

    let (left, left_reports) = &ranks[0];
    let (right, _) = &ranks[1];
    assert!(left.is_empty());
    assert!(left_reports.iter().any(|r| r.sync.dropped == 1));

    let p = right.by_id(ParticleId::new(0)).unwrap();
    assert_eq!(p.role, ParticleRole::Free);
    assert_eq!(p.master, 1);
    assert_eq!(p.owners.iter().copied().collect::<Vec<_>>(), vec![1]);
    assert_relative_eq!(p.state.cg, Point3::new(1.3, 0.5, 0.5), epsilon = 1e-9);
    assert_relative_eq!(p.state.velocity, Vector3::x(), epsilon = 1e-12);
}

#[test]
fn removal_by_master_reaches_every_owner() {
    let pipeline = r#"{ "constraints": [] }"#;
    // Shared after the first step, above the domain after the second
    let seed = cube_at(Vector3::new(0.97, 0.5, 0.9), Vector3::new(0.0, 0.0, 1.5));

    let ranks = run_two_ranks(pipeline, 0.05, 2, &seed);

    let (left, left_reports) = &ranks[0];
    let (right, right_reports) = &ranks[1];
    assert!(left.is_empty());
    assert!(right.is_empty());
    assert_eq!(left_reports[0].sync.sent, 1);
    assert_eq!(
        left_reports[1].removed,
        vec![(ParticleId::new(0), RemovalReason::LeftDomain)]
    );
    assert!(right_reports[1].removed.is_empty());
    assert_eq!(right_reports[1].sync.dropped, 1);
}

/// Rank `r` seeds `seeds[r]`; an initial synchronization shares copies
/// before the first step so both ranks see every contact.
fn run_seeded_ranks(
    seeds: &[ParticleSeed; 2],
    dt: f64,
    steps: usize,
) -> Vec<(Population, Vec<StepReport>)> {
    let host = domain();
    let grid = two_slabs();
    let detector = BoundingSphereDetector::new(0.0);
    std::thread::scope(|scope| {
        let handles: Vec<_> = LocalGroup::create(2)
            .into_iter()
            .map(|comm| {
                let (host, grid, detector) = (&host, &grid, &detector);
                scope.spawn(move || {
                    let rank = comm.rank();
                    let mut population = Population::new(rank, comm.size());
                    population.seed(&seeds[rank], 0.0).unwrap();
                    let config = SimulationConfig::with_timestep(dt);
                    OwnershipSync::new(config.ownership_search_radius)
                        .synchronize(&mut population, &comm, grid)
                        .unwrap();
                    let mut stepper = Stepper::new(config, ConstraintPipeline::new()).unwrap();
                    let env = StepEnvironment::new(host, detector, grid, &comm);
                    let reports = stepper.run(&mut population, &env, steps).unwrap();
                    (population, reports)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn cluster_across_ranks_matches_serial_run() {
    // Touching cubes of 2 kg and 3 kg on either side of x = 1
    let seeds = [
        ParticleSeed::new(SurfaceMesh::cube(0.05), 2000.0)
            .displacement(Vector3::new(0.95, 0.5, 0.5))
            .velocity(Vector3::x()),
        ParticleSeed::new(SurfaceMesh::cube(0.05), 3000.0)
            .displacement(Vector3::new(1.05, 0.5, 0.5))
            .velocity(Vector3::y()),
    ];
    let (dt, steps) = (0.01, 3);

    let ranks = run_seeded_ranks(&seeds, dt, steps);

    let host = domain();
    let grid = BackgroundGrid::single(Point3::origin(), Point3::new(2.0, 1.0, 1.0));
    let detector = BoundingSphereDetector::new(0.0);
    let env = StepEnvironment::new(&host, &detector, &grid, &SingleRank);
    let mut stepper =
        Stepper::new(SimulationConfig::with_timestep(dt), ConstraintPipeline::new()).unwrap();
    let mut serial = Population::serial();
    for seed in &seeds {
        serial.seed(seed, 0.0).unwrap();
    }
    let serial_reports = stepper.run(&mut serial, &env, steps).unwrap();
    assert!(serial_reports.iter().all(|r| r.clusters == 1));

    for (rank, (population, reports)) in ranks.iter().enumerate() {
        assert!(reports.iter().all(|r| r.clusters == 1));
        assert_eq!(population.len(), 2);
        for id in [ParticleId::new(0), ParticleId::new(1)] {
            let expected = serial.by_id(id).unwrap();
            let copy = population.by_id(id).unwrap();
            let role = if copy.master == rank { ParticleRole::Master } else { ParticleRole::Slave };
            assert_eq!(copy.role, role);
            assert_relative_eq!(copy.state.cg, expected.state.cg, epsilon = 1e-12);
            assert_relative_eq!(copy.state.velocity, expected.state.velocity, epsilon = 1e-12);
            assert_relative_eq!(copy.state.omega, expected.state.omega, epsilon = 1e-12);
        }
    }

    // Each member is summed once, so the cluster mass is not doubled
    let common = ranks[1].0.by_id(ParticleId::new(0)).unwrap().agglomeration.clone().unwrap();
    assert_relative_eq!(common.mass, 5.0, epsilon = 1e-9);
    assert_eq!(ranks[0].0.by_id(ParticleId::new(0)).unwrap().master, 0);
    assert_eq!(ranks[1].0.by_id(ParticleId::new(1)).unwrap().master, 1);
}
