//! Particle state records
//!
//! Plain data owned by the particle systems. Systems mutate these between
//! frames; snapshots copy the externally visible subset.

use crate::core_types::vec3::{is_finite_vec, Vec3};
use serde::{Deserialize, Serialize};

/// A single fire particle
///
/// Spawned at the explosion's start frame, advanced every frame while
/// `alive`, and frozen in place once it cools to ambient or outlives the
/// explosion duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireParticle {
    pub(crate) id: u32,
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec3,
    /// Kelvin
    pub(crate) temperature: f32,
    /// Frames since spawn
    pub(crate) age: u32,
    pub(crate) alive: bool,
}

impl FireParticle {
    /// Create a freshly spawned, live particle
    pub fn new(id: u32, position: Vec3, velocity: Vec3, temperature: f32) -> Self {
        FireParticle {
            id,
            position,
            velocity,
            temperature,
            age: 0,
            alive: true,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Current temperature (K)
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Name of the first non-finite field, if any
    pub(crate) fn non_finite_field(&self) -> Option<&'static str> {
        if !is_finite_vec(&self.position) {
            Some("position")
        } else if !is_finite_vec(&self.velocity) {
            Some("velocity")
        } else if !self.temperature.is_finite() {
            Some("temperature")
        } else {
            None
        }
    }
}

/// A single piece of debris on a ballistic trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebrisParticle {
    pub(crate) id: u32,
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec3,
    /// rad/s about each world axis
    pub(crate) angular_velocity: Vec3,
    /// Accumulated Euler rotation (radians)
    pub(crate) rotation: Vec3,
    /// kg
    pub(crate) mass: f32,
    pub(crate) bounced_count: u32,
    pub(crate) age: u32,
    /// Consecutive frames spent below the settle speed
    pub(crate) still_frames: u32,
    pub(crate) settled: bool,
}

impl DebrisParticle {
    /// Create a new, airborne debris particle
    pub fn new(id: u32, position: Vec3, velocity: Vec3, angular_velocity: Vec3, mass: f32) -> Self {
        DebrisParticle {
            id,
            position,
            velocity,
            angular_velocity,
            rotation: Vec3::zeros(),
            mass,
            bounced_count: 0,
            age: 0,
            still_frames: 0,
            settled: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Mass (kg)
    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn bounced_count(&self) -> u32 {
        self.bounced_count
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    /// Settled debris is at rest and no longer integrated
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub(crate) fn non_finite_field(&self) -> Option<&'static str> {
        if !is_finite_vec(&self.position) {
            Some("position")
        } else if !is_finite_vec(&self.velocity) {
            Some("velocity")
        } else if !is_finite_vec(&self.angular_velocity) {
            Some("angular_velocity")
        } else if !is_finite_vec(&self.rotation) {
            Some("rotation")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_particle_spawn_state() {
        let p = FireParticle::new(3, Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), 3000.0);
        assert!(p.is_alive());
        assert_eq!(p.age(), 0);
        assert_eq!(p.non_finite_field(), None);
    }

    #[test]
    fn test_non_finite_field_reports_first_bad_field() {
        let mut p = FireParticle::new(0, Vec3::zeros(), Vec3::zeros(), 3000.0);
        p.temperature = f32::NAN;
        assert_eq!(p.non_finite_field(), Some("temperature"));
        p.position.z = f32::INFINITY;
        assert_eq!(p.non_finite_field(), Some("position"));

        let mut d = DebrisParticle::new(1, Vec3::zeros(), Vec3::zeros(), Vec3::zeros(), 1.0);
        d.angular_velocity.x = f32::NEG_INFINITY;
        assert_eq!(d.non_finite_field(), Some("angular_velocity"));
    }
}
