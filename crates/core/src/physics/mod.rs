//! Physics models shared by the particle systems

pub mod forces;
pub mod thermodynamics;

pub use forces::ForceModel;
pub use thermodynamics::{Rgb, ThermodynamicModel};
