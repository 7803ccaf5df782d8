//! Core types and utilities

pub mod noise;
pub mod particle;
pub mod spatial;
pub mod vec3;

pub use noise::SeededNoise;
pub use particle::{DebrisParticle, FireParticle};
pub use spatial::SpatialHashGrid;
pub use vec3::{is_finite_vec, Vec3};
