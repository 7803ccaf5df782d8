//! Explosion Simulation Core Library
//!
//! A deterministic, frame-stepped explosion engine producing per-frame fire
//! particle, debris and volumetric smoke state for visual-effects rendering.
//!
//! ## Pipeline
//!
//! - [`ExplosionConfig`] describes one explosion and is validated on construction
//! - [`QualityPreset`] tiers fix particle counts, interaction radius and smoke resolution
//! - [`SimulationDriver`] builds the sub-systems and steps them frame by frame
//! - Each frame becomes a [`SimulationSnapshot`] handed to a [`SnapshotExporter`]
//!
//! Identical config and seed yield bit-identical snapshots regardless of the
//! number of worker threads.

// Core types and utilities
pub mod core_types;
pub mod error;

// Models and solvers
pub mod grid;
pub mod physics;
pub mod simulation;

// Re-export core types
pub use core_types::{DebrisParticle, FireParticle, SeededNoise, SpatialHashGrid, Vec3};

pub use error::{
    ConfigError, DeterminismViolationError, DriverError, EntityKind, ExportError,
    ResourceLimitError, SimulationNumericalError,
};

pub use grid::{SmokeSlice, VolumetricSmokeSimulator};
pub use physics::{ForceModel, Rgb, ThermodynamicModel};

pub use simulation::{
    record, verify_determinism, DebrisParticleState, DebrisSimulator, DriverState,
    ExplosionConfig, ExplosionConfigBuilder, FireParticleState, FireParticleSystem,
    JsonLinesExporter, PhysicsParameters, QualityParameters, QualityPreset, QualityPresetTable,
    RawExplosionConfig, ResourceLimits, SimulationDriver, SimulationEntity, SimulationSnapshot,
    SimulationState, SnapshotExporter, SnapshotTimeline,
};
