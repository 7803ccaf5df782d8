//! Fire particle population
//!
//! Each step:
//! 1. Rebuild the spatial hash from live particles (barrier before any query)
//! 2. Per particle, in parallel against the read-only previous state:
//!    acceleration from [`ForceModel`] plus short-range repulsion,
//!    semi-implicit Euler with implicit drag
//!    (`v = damp(v + a·dt); p += v·dt`), temperature from
//!    [`ThermodynamicModel`]
//! 3. Collect the next state in ascending id order
//!
//! Dead particles stay in the population, frozen at their last state.

use crate::core_types::{FireParticle, SpatialHashGrid, Vec3};
use crate::error::{EntityKind, SimulationNumericalError};
use crate::physics::{ForceModel, ThermodynamicModel};
use crate::simulation::config::ExplosionConfig;
use crate::simulation::snapshot::FireParticleState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::f32::consts::TAU;
use tracing::{debug, warn};

/// RNG stream reserved for fire spawning
const FIRE_STREAM: u64 = 1;

/// Neighbors closer than this have no usable separation direction
const MIN_SEPARATION: f32 = 1e-6;

/// Uniformly distributed unit vector
pub(crate) fn random_unit_vector(rng: &mut ChaCha8Rng) -> Vec3 {
    let z: f32 = rng.random_range(-1.0..=1.0);
    let phi: f32 = rng.random_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Owns and advances the fire particles of one explosion
#[derive(Debug, Clone)]
pub struct FireParticleSystem {
    particles: Vec<FireParticle>,
    forces: ForceModel,
    thermo: ThermodynamicModel,
    grid: SpatialHashGrid,
    interaction_radius: f32,
    repulsion_strength: f32,
    dt: f32,
    start_frame: u32,
    duration: u32,
}

impl FireParticleSystem {
    /// Spawn `fire_particle_count` particles around the explosion origin
    pub fn new(config: &ExplosionConfig) -> Self {
        let physics = config.physics();
        let thermo = ThermodynamicModel::new(config);
        let launch_speed = physics.initial_speed * config.intensity();

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed());
        rng.set_stream(FIRE_STREAM);

        let particles = (0..config.fire_particle_count())
            .map(|id| {
                let direction = random_unit_vector(&mut rng);
                // Cube root keeps spawn density uniform inside the sphere
                let radius = physics.spawn_radius * rng.random_range(0.0f32..=1.0).cbrt();
                let speed = launch_speed * rng.random_range(0.6f32..=1.0);
                FireParticle::new(
                    id,
                    config.location() + direction * radius,
                    direction * speed,
                    thermo.initial(),
                )
            })
            .collect();

        Self::with_particles(config, particles)
    }

    /// Build the system around an explicit population.
    ///
    /// Particles are reordered by ascending id.
    pub fn with_particles(config: &ExplosionConfig, mut particles: Vec<FireParticle>) -> Self {
        particles.sort_by_key(|p| p.id);
        let interaction_radius = config.quality().interaction_radius;
        FireParticleSystem {
            particles,
            forces: ForceModel::new(config),
            thermo: ThermodynamicModel::new(config),
            grid: SpatialHashGrid::new(interaction_radius),
            interaction_radius,
            repulsion_strength: config.physics().repulsion_strength,
            dt: config.physics().dt(),
            start_frame: config.start_frame(),
            duration: config.duration(),
        }
    }

    /// Advance every live particle to `frame`.
    ///
    /// The spawn frame itself is never stepped. Returns the numerical
    /// recoveries performed this frame.
    pub fn step(&mut self, frame: u32) -> Vec<SimulationNumericalError> {
        if frame <= self.start_frame {
            return Vec::new();
        }
        let age = frame - self.start_frame;

        self.grid.rebuild(
            self.particles
                .iter()
                .filter(|p| p.alive)
                .map(|p| (p.id, p.position)),
        );

        let this = &*self;
        let results: Vec<(FireParticle, Option<&'static str>)> = this
            .particles
            .par_iter()
            .map(|p| this.advance(p, age))
            .collect();

        let mut diagnostics = Vec::new();
        let mut next = Vec::with_capacity(results.len());
        for (particle, bad_field) in results {
            if let Some(field) = bad_field {
                warn!(
                    "Fire particle {} produced non-finite {} at frame {}, clamped",
                    particle.id, field, frame
                );
                diagnostics.push(SimulationNumericalError {
                    frame,
                    entity: EntityKind::Fire,
                    id: particle.id,
                    field: field.to_string(),
                });
            }
            next.push(particle);
        }
        self.particles = next;

        debug!(
            "Fire step frame {}: {}/{} alive",
            frame,
            self.live_count(),
            self.particles.len()
        );
        diagnostics
    }

    /// Next state of one particle, read against the frozen previous frame
    fn advance(&self, p: &FireParticle, age: u32) -> (FireParticle, Option<&'static str>) {
        if !p.alive {
            return (p.clone(), None);
        }

        let frame_offset = age.saturating_sub(1);
        let accel = self.forces.explicit_acceleration(p, frame_offset) + self.repulsion(p);

        let mut next = p.clone();
        next.velocity = self.forces.damp_fire(p.velocity + accel * self.dt, self.dt);
        next.position += next.velocity * self.dt;
        next.age = age;
        // min() keeps the sequence non-increasing even across a recovery
        next.temperature = self.thermo.temperature(age).min(p.temperature);

        let bad_field = next.non_finite_field();
        if bad_field.is_some() {
            next.position = p.position;
            next.velocity = Vec3::zeros();
            next.temperature = p.temperature;
        }

        if self.thermo.is_extinguished(next.temperature) || next.age > self.duration {
            next.alive = false;
        }

        (next, bad_field)
    }

    /// Short-range push away from nearby live particles, linear falloff to zero at the radius
    fn repulsion(&self, p: &FireParticle) -> Vec3 {
        if self.repulsion_strength == 0.0 {
            return Vec3::zeros();
        }

        let mut push = Vec3::zeros();
        for (id, other) in self.grid.neighbor_entries(p.position, self.interaction_radius) {
            if id == p.id {
                continue;
            }
            let offset = p.position - other;
            let dist = offset.norm();
            if dist < MIN_SEPARATION {
                continue;
            }
            let falloff = 1.0 - dist / self.interaction_radius;
            push += offset * (self.repulsion_strength * falloff / dist);
        }
        push
    }

    pub fn particles(&self) -> &[FireParticle] {
        &self.particles
    }

    pub fn live_count(&self) -> usize {
        self.particles.iter().filter(|p| p.alive).count()
    }

    /// Snapshot view of every particle, dead ones included
    pub fn states(&self) -> Vec<FireParticleState> {
        self.particles
            .iter()
            .map(|p| FireParticleState {
                id: p.id,
                position: p.position,
                temperature: p.temperature,
                color: ThermodynamicModel::color(p.temperature),
                alive: p.alive,
            })
            .collect()
    }
}
