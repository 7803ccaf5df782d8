//! Grid-based simulation modules

pub mod smoke;

pub use smoke::{SmokeSlice, VolumetricSmokeSimulator};
