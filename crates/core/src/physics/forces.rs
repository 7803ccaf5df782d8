//! Particle force model
//!
//! Sums the accelerations acting on a particle:
//!
//! 1. **Radial push** - outward from the explosion origin, decaying exponentially
//!    ```text
//!    a_r = dir × (intensity × initial_speed) × e^(-decay × frame_offset)
//!    ```
//! 2. **Gravity** - constant `(0, 0, g)`
//! 3. **Drag** - quadratic in speed
//!    ```text
//!    a_d = -v × |v| × C_d
//!    ```
//! 4. **Turbulence** - seeded value noise indexed by position and frame
//!
//! Integrators never add the drag term explicitly: it overshoots once
//! `C_d × |v| × dt > 1`. They take [`ForceModel::explicit_acceleration`] and
//! then apply drag implicitly, linearized about the kicked speed:
//! ```text
//! v' = v* / (1 + C_d × |v*| × dt)
//! ```
//! The divisor never drops below one, so drag only ever slows a particle and
//! stays stable however large the launch speed gets.
//!
//! The model holds only immutable parameters, so it can be shared across
//! worker threads and every call is a pure function of its arguments.

use crate::core_types::{FireParticle, SeededNoise, Vec3};
use crate::simulation::config::{ExplosionConfig, PhysicsParameters};

/// Below this length a direction vector is treated as undefined
const MIN_DIRECTION_NORM: f32 = 1e-6;

/// Stateless acceleration model for one explosion instance
#[derive(Debug, Clone)]
pub struct ForceModel {
    origin: Vec3,
    /// `intensity × initial_speed` (m/s², applied per unit time)
    launch_strength: f32,
    radial_decay: f32,
    gravity: Vec3,
    drag_coefficient: f32,
    turbulence_strength: f32,
    noise: SeededNoise,
}

impl ForceModel {
    /// Build the model for a validated config
    pub fn new(config: &ExplosionConfig) -> Self {
        Self::from_parameters(
            config.location(),
            config.intensity(),
            config.seed(),
            config.physics(),
        )
    }

    /// Build the model from raw parts
    pub fn from_parameters(
        origin: Vec3,
        intensity: f32,
        seed: u64,
        physics: &PhysicsParameters,
    ) -> Self {
        ForceModel {
            origin,
            launch_strength: intensity * physics.initial_speed,
            radial_decay: physics.radial_decay,
            gravity: Vec3::new(0.0, 0.0, physics.gravity),
            drag_coefficient: physics.fire_drag,
            turbulence_strength: physics.turbulence_strength,
            noise: SeededNoise::new(seed, physics.turbulence_scale, physics.turbulence_period),
        }
    }

    /// Outward push from the explosion origin.
    ///
    /// A particle sitting exactly on the origin is pushed along its own
    /// velocity; a particle with neither offset nor velocity gets no push.
    pub fn radial(&self, position: Vec3, velocity: Vec3, frame_offset: u32) -> Vec3 {
        let offset = position - self.origin;
        let direction = if offset.norm() > MIN_DIRECTION_NORM {
            offset.normalize()
        } else if velocity.norm() > MIN_DIRECTION_NORM {
            velocity.normalize()
        } else {
            return Vec3::zeros();
        };

        let decay = (-self.radial_decay * frame_offset as f32).exp();
        direction * (self.launch_strength * decay)
    }

    /// Constant gravitational acceleration
    #[inline]
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Quadratic drag `-v × |v| × coefficient`
    #[inline]
    pub fn drag(velocity: Vec3, coefficient: f32) -> Vec3 {
        -velocity * velocity.norm() * coefficient
    }

    /// Apply quadratic drag to `velocity` over one step of `dt` (implicit)
    #[inline]
    pub fn damp(velocity: Vec3, coefficient: f32, dt: f32) -> Vec3 {
        velocity / (1.0 + coefficient * velocity.norm() * dt)
    }

    /// [`Self::damp`] with the fire particle drag coefficient
    #[inline]
    pub fn damp_fire(&self, velocity: Vec3, dt: f32) -> Vec3 {
        Self::damp(velocity, self.drag_coefficient, dt)
    }

    /// Deterministic turbulent acceleration at `position` and `frame`
    pub fn turbulence(&self, position: Vec3, frame: u32) -> Vec3 {
        if self.turbulence_strength == 0.0 {
            return Vec3::zeros();
        }
        self.noise.sample_vec(position, frame) * self.turbulence_strength
    }

    /// Total acceleration on a fire particle `frame_offset` frames after the blast
    pub fn acceleration(&self, particle: &FireParticle, frame_offset: u32) -> Vec3 {
        self.explicit_acceleration(particle, frame_offset)
            + Self::drag(particle.velocity, self.drag_coefficient)
    }

    /// [`Self::acceleration`] without the drag term, for integrators that
    /// follow up with [`Self::damp_fire`]
    pub fn explicit_acceleration(&self, particle: &FireParticle, frame_offset: u32) -> Vec3 {
        self.radial(particle.position, particle.velocity, frame_offset)
            + self.gravity
            + self.turbulence(particle.position, frame_offset)
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }
}
