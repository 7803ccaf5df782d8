//! Ballistic debris
//!
//! Debris is launched into the upper hemisphere and integrated under gravity
//! and mass-scaled quadratic drag. The gravity kick is explicit, drag is
//! applied implicitly through [`ForceModel::damp`], and the position takes
//! the mean of the old and new velocity:
//!
//! ```text
//! v' = (v + g·dt) / (1 + (C_d / m)·|v + g·dt|·dt)
//! p' = p + ½·(v + v')·dt
//! ```
//!
//! which is exact when drag is zero and stable at any launch speed. Contact with the ground plane reflects
//! the vertical velocity by the restitution coefficient, applies friction to
//! the horizontal velocity and converts the horizontal impact speed into
//! spin. A piece that stays below the settle speed on the ground for enough
//! consecutive frames is settled and no longer integrated.

use crate::core_types::{DebrisParticle, Vec3};
use crate::error::{EntityKind, SimulationNumericalError};
use crate::physics::ForceModel;
use crate::simulation::config::{ExplosionConfig, PhysicsParameters};
use crate::simulation::fire::random_unit_vector;
use crate::simulation::snapshot::DebrisParticleState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, warn};

/// RNG stream reserved for debris spawning
const DEBRIS_STREAM: u64 = 2;

/// Peak spawn angular speed (rad/s)
const MAX_SPAWN_SPIN: f32 = 4.0;

/// Owns and advances the debris pieces of one explosion
#[derive(Debug, Clone)]
pub struct DebrisSimulator {
    particles: Vec<DebrisParticle>,
    forces: ForceModel,
    params: PhysicsParameters,
    dt: f32,
    start_frame: u32,
    duration: u32,
}

impl DebrisSimulator {
    pub fn new(config: &ExplosionConfig) -> Self {
        let physics = config.physics();
        let launch_speed = physics.debris_speed * config.intensity();

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed());
        rng.set_stream(DEBRIS_STREAM);

        let particles = (0..config.debris_particle_count())
            .map(|id| {
                let mut direction = random_unit_vector(&mut rng);
                direction.z = direction.z.abs();
                let speed = launch_speed * rng.random_range(0.5f32..=1.0);
                let spin = random_unit_vector(&mut rng) * rng.random_range(0.0..=MAX_SPAWN_SPIN);
                let mass = rng.random_range(physics.debris_min_mass..=physics.debris_max_mass);
                DebrisParticle::new(id, config.location(), direction * speed, spin, mass)
            })
            .collect();

        Self::with_particles(config, particles)
    }

    /// Build the simulator around an explicit set of pieces (sorted by id)
    pub fn with_particles(config: &ExplosionConfig, mut particles: Vec<DebrisParticle>) -> Self {
        particles.sort_by_key(|p| p.id);
        DebrisSimulator {
            particles,
            forces: ForceModel::new(config),
            params: config.physics().clone(),
            dt: config.physics().dt(),
            start_frame: config.start_frame(),
            duration: config.duration(),
        }
    }

    /// Advance every airborne or sliding piece to `frame`
    pub fn step(&mut self, frame: u32) -> Vec<SimulationNumericalError> {
        if frame <= self.start_frame {
            return Vec::new();
        }
        let age = frame - self.start_frame;

        let this = &*self;
        let results: Vec<(DebrisParticle, Option<&'static str>)> = this
            .particles
            .par_iter()
            .map(|p| this.advance(p, age))
            .collect();

        let mut diagnostics = Vec::new();
        self.particles = results
            .into_iter()
            .map(|(particle, bad_field)| {
                if let Some(field) = bad_field {
                    warn!(
                        "Debris {} produced non-finite {} at frame {}, clamped",
                        particle.id, field, frame
                    );
                    diagnostics.push(SimulationNumericalError {
                        frame,
                        entity: EntityKind::Debris,
                        id: particle.id,
                        field: field.to_string(),
                    });
                }
                particle
            })
            .collect();

        debug!(
            "Debris step frame {}: {} settled of {}",
            frame,
            self.settled_count(),
            self.particles.len()
        );
        diagnostics
    }

    fn advance(&self, p: &DebrisParticle, age: u32) -> (DebrisParticle, Option<&'static str>) {
        if p.settled || age > self.duration {
            return (p.clone(), None);
        }

        let params = &self.params;
        let dt = self.dt;
        let kicked = p.velocity + self.forces.gravity() * dt;

        let mut next = p.clone();
        next.age = age;
        next.velocity = ForceModel::damp(kicked, params.debris_drag / p.mass, dt);
        // Trapezoid over the step; exact for the drag-free ballistic arc
        next.position += (p.velocity + next.velocity) * (0.5 * dt);

        let grounded = next.position.z <= params.ground_z;
        if grounded && next.velocity.z < 0.0 {
            self.resolve_ground_contact(&mut next);
        }

        next.rotation += next.angular_velocity * dt;
        next.angular_velocity *= params.angular_damping;

        if grounded && next.velocity.norm() < params.settle_speed {
            next.still_frames += 1;
        } else {
            next.still_frames = 0;
        }
        if next.still_frames >= params.settle_frames {
            next.velocity = Vec3::zeros();
            next.angular_velocity = Vec3::zeros();
            next.settled = true;
        }

        let bad_field = next.non_finite_field();
        if bad_field.is_some() {
            next.position = p.position;
            next.rotation = p.rotation;
            next.velocity = Vec3::zeros();
            next.angular_velocity = Vec3::zeros();
        }

        (next, bad_field)
    }

    /// Bounce off the ground plane.
    ///
    /// A rebound slower than one frame of gravity cannot leave the ground, so
    /// it becomes resting contact instead of an endless micro-bounce.
    fn resolve_ground_contact(&self, p: &mut DebrisParticle) {
        let params = &self.params;
        let impact = Vec3::new(p.velocity.x, p.velocity.y, 0.0);

        p.position.z = params.ground_z;
        let rebound = -p.velocity.z * params.restitution;
        if rebound > params.gravity.abs() * self.dt {
            p.velocity.z = rebound;
            p.bounced_count += 1;
        } else {
            p.velocity.z = 0.0;
        }

        p.velocity.x *= params.ground_friction;
        p.velocity.y *= params.ground_friction;
        // Rolling about the axis perpendicular to the slide direction
        p.angular_velocity += Vec3::new(-impact.y, impact.x, 0.0) * params.spin_factor;
    }

    pub fn particles(&self) -> &[DebrisParticle] {
        &self.particles
    }

    pub fn settled_count(&self) -> usize {
        self.particles.iter().filter(|p| p.settled).count()
    }

    pub fn states(&self) -> Vec<DebrisParticleState> {
        self.particles
            .iter()
            .map(|p| DebrisParticleState {
                id: p.id,
                position: p.position,
                rotation: p.rotation,
                bounced_count: p.bounced_count,
                settled: p.settled,
            })
            .collect()
    }
}
