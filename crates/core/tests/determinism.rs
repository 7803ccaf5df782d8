//! Reproducibility Validation Suite
//!
//! Identical `(config, seed)` must yield bit-identical snapshot timelines,
//! independent of how many worker threads rayon uses.
//!
//! Run tests with: `cargo test --test determinism`

use blast_sim_core::{
    record, verify_determinism, ExplosionConfig, QualityPreset, SnapshotTimeline,
};
use ctor::ctor;

#[ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(preset: QualityPreset, seed: u64) -> ExplosionConfig {
    ExplosionConfig::builder("determinism")
        .quality_preset(preset)
        .location(2.0, -1.0, 0.5)
        .fire_particle_count(200)
        .debris_particle_count(40)
        .start_frame(3)
        .duration(24)
        .seed(seed)
        .build()
        .unwrap()
}

fn record_with_threads(config: &ExplosionConfig, threads: usize) -> SnapshotTimeline {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .unwrap();
    pool.install(|| record(config.clone())).unwrap()
}

#[test]
fn test_thread_count_does_not_change_output() {
    let cfg = config(QualityPreset::Medium, 42);
    let single = record_with_threads(&cfg, 1);
    let parallel = record_with_threads(&cfg, 4);
    assert_eq!(single.len(), 24);
    verify_determinism(&single, &parallel).unwrap();
}

#[test]
fn test_smoke_grid_is_thread_count_independent() {
    let cfg = ExplosionConfig::builder("smoke-determinism")
        .quality_preset(QualityPreset::High)
        .smoke_resolution([12, 12, 16])
        .duration(16)
        .seed(7)
        .build()
        .unwrap();
    let single = record_with_threads(&cfg, 1);
    let parallel = record_with_threads(&cfg, 4);
    assert!(single.last().and_then(|s| s.smoke.as_ref()).is_some());
    verify_determinism(&single, &parallel).unwrap();
}

#[test]
fn test_repeated_runs_are_identical() {
    let cfg = config(QualityPreset::Quick, 1234);
    let a = record(cfg.clone()).unwrap();
    let b = record(cfg).unwrap();
    verify_determinism(&a, &b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_seed_changes_output() {
    let a = record(config(QualityPreset::Quick, 1)).unwrap();
    let b = record(config(QualityPreset::Quick, 2)).unwrap();
    let err = verify_determinism(&a, &b).unwrap_err();
    assert_eq!(err.frame, 3);
}
