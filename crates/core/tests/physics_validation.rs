//! Physics Validation Test Suite
//!
//! Checks the models against closed-form references:
//! 1. Drag-free ballistic flight returns to launch height after `2·v/g`
//! 2. Spatial hash neighbor queries equal an O(n²) brute-force scan
//! 3. Jacobi diffusion never increases total smoke mass
//! 4. Thermodynamic decay matches `T_amb + (T_0 - T_amb)·r^n`
//!
//! Run tests with: `cargo test --test physics_validation`

use approx::assert_relative_eq;
use blast_sim_core::{
    DebrisParticle, DebrisSimulator, ExplosionConfig, FireParticle, FireParticleSystem,
    PhysicsParameters, SpatialHashGrid, ThermodynamicModel, Vec3, VolumetricSmokeSimulator,
};
use ctor::ctor;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_ballistic_round_trip() {
    // At 24.5 fps the flight time 2·10/9.8 s is a whole number of frames
    let fps = 24.5f32;
    let physics = PhysicsParameters {
        fps,
        gravity: -9.8,
        debris_drag: 0.0,
        ..PhysicsParameters::default()
    };
    let cfg = ExplosionConfig::builder("ballistic")
        .physics(physics)
        .duration(60)
        .build()
        .unwrap();

    let start = Vec3::new(0.0, 0.0, 5.0);
    let piece = DebrisParticle::new(0, start, Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), 1.0);
    let mut sim = DebrisSimulator::with_particles(&cfg, vec![piece]);

    let return_frame = (2.0 * 10.0 / 9.8 * f64::from(fps)).round() as u32;
    assert_eq!(return_frame, 50);
    for frame in 1..=return_frame {
        sim.step(frame);
    }

    let p = &sim.particles()[0];
    assert_relative_eq!(p.position().z, start.z, epsilon = 1e-3);
    assert_relative_eq!(p.velocity().z, -10.0, epsilon = 1e-3);
    assert_eq!(p.bounced_count(), 0);
}

#[test]
fn test_neighbor_query_matches_brute_force() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let particles: Vec<(u32, Vec3)> = (0..100)
        .map(|id| {
            let p = Vec3::new(
                rng.random_range(-5.0..5.0),
                rng.random_range(-5.0..5.0),
                rng.random_range(-5.0..5.0),
            );
            (id, p)
        })
        .collect();

    let radius = 2.0;
    let mut grid = SpatialHashGrid::new(radius);
    grid.rebuild(particles.iter().copied());
    assert_eq!(grid.len(), 100);

    for &(_, query) in &particles {
        let expected: Vec<u32> = particles
            .iter()
            .filter(|(_, p)| (p - query).norm_squared() <= radius * radius)
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(grid.neighbors(query, radius), expected);
    }
}

#[test]
fn test_diffusion_mass_non_increase() {
    let cfg = ExplosionConfig::builder("diffusion")
        .smoke_resolution([16, 16, 16])
        .build()
        .unwrap();
    let mut smoke = VolumetricSmokeSimulator::new(&cfg, [16, 16, 16]);

    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for _ in 0..200 {
        let (x, y, z) = (
            rng.random_range(0..16),
            rng.random_range(0..16),
            rng.random_range(0..16),
        );
        smoke.set_density(x, y, z, rng.random_range(0.0..4.0));
    }

    let mut mass = smoke.total_density();
    for _ in 0..10 {
        smoke.diffuse(20);
        let next = smoke.total_density();
        assert!(next <= mass * (1.0 + 1e-5), "mass grew from {mass} to {next}");
        assert!(smoke.density().iter().all(|&d| d >= 0.0));
        mass = next;
    }
}

#[test]
fn test_cooling_curve() {
    let physics = PhysicsParameters::default();
    let model = ThermodynamicModel::from_parameters(1.0, &physics);
    for n in [0u32, 1, 5, 10, 20] {
        let expected = 300.0 + 2700.0 * 0.85f32.powi(n as i32);
        assert_relative_eq!(model.temperature(n), expected, max_relative = 1e-5);
    }
}

#[test]
fn test_fire_nan_recovery_reports_diagnostic() {
    let cfg = ExplosionConfig::builder("nan")
        .start_frame(0)
        .duration(10)
        .build()
        .unwrap();
    let particles = vec![
        FireParticle::new(0, Vec3::new(1.0, 0.0, 0.0), Vec3::zeros(), 3000.0),
        FireParticle::new(
            7,
            Vec3::new(-4.0, 0.0, 0.0),
            Vec3::new(f32::INFINITY, 0.0, 0.0),
            3000.0,
        ),
    ];
    let mut system = FireParticleSystem::with_particles(&cfg, particles);

    let diagnostics = system.step(1);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].id, 7);
    assert_eq!(diagnostics[0].frame, 1);

    // The run continues with finite state
    for frame in 2..10 {
        system.step(frame);
    }
    for p in system.particles() {
        assert!(p.position().iter().all(|c| c.is_finite()));
        assert!(p.temperature().is_finite());
    }
}
