//! Explosion configuration
//!
//! [`ExplosionConfig`] is the validated, immutable description of one
//! explosion instance. It can only be obtained through validation, either
//! from JSON ([`ExplosionConfig::from_json`] or
//! [`ExplosionConfig::from_json_file`]), from a [`RawExplosionConfig`],
//! or from the [`ExplosionConfigBuilder`]; an invalid input never yields a
//! partially built config.
//!
//! [`PhysicsParameters`] carries the tunable constants of the force,
//! thermodynamic, debris, and smoke models. The defaults are artistic
//! starting points, not validated physical constants.

use crate::core_types::Vec3;
use crate::error::ConfigError;
use crate::simulation::quality::{QualityParameters, QualityPreset};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunable model constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsParameters {
    /// Frames per second; the integration timestep is `1 / fps`
    pub fps: f32,
    /// Vertical gravitational acceleration (m/s², negative is down)
    pub gravity: f32,
    /// Ground plane height for debris collision (m)
    pub ground_z: f32,

    // Thermodynamics
    /// Ambient temperature floor (K)
    pub ambient_temperature: f32,
    /// Spawn temperature at intensity 1.0 (K)
    pub base_temperature: f32,
    /// Fraction of excess temperature retained per frame
    pub cooling_rate: f32,
    /// A particle within this many kelvin of ambient is extinguished
    pub extinguish_epsilon: f32,

    // Fire particle forces
    /// Radial launch speed at intensity 1.0 (m/s)
    pub initial_speed: f32,
    /// Exponential decay of the radial push per frame
    pub radial_decay: f32,
    pub fire_drag: f32,
    /// Turbulence acceleration amplitude (m/s²)
    pub turbulence_strength: f32,
    /// Turbulence lattice spacing (m)
    pub turbulence_scale: f32,
    /// Frames between turbulence lattice slices
    pub turbulence_period: f32,
    /// Radius of the spawn sphere around the explosion origin (m)
    pub spawn_radius: f32,
    /// Short-range repulsion amplitude (m/s²)
    pub repulsion_strength: f32,

    // Debris
    /// Launch speed at intensity 1.0 (m/s)
    pub debris_speed: f32,
    pub debris_drag: f32,
    pub debris_min_mass: f32,
    pub debris_max_mass: f32,
    /// Fraction of vertical speed kept on bounce (< 1)
    pub restitution: f32,
    /// Fraction of horizontal speed kept on ground contact
    pub ground_friction: f32,
    /// Angular velocity gained per m/s of horizontal impact speed
    pub spin_factor: f32,
    /// Angular velocity retained per frame
    pub angular_damping: f32,
    /// Below this speed (m/s) debris counts as still
    pub settle_speed: f32,
    /// Consecutive still frames before debris settles
    pub settle_frames: u32,

    // Smoke
    /// Voxel edge length (m)
    pub smoke_cell_size: f32,
    /// Number of frames the origin keeps emitting smoke
    pub smoke_source_frames: u32,
    /// Density injected per source frame at intensity 1.0
    pub smoke_source_rate: f32,
    /// Source radius in voxels
    pub smoke_source_radius: f32,
    /// Upward velocity given to source voxels (m/s)
    pub smoke_source_lift: f32,
    pub buoyancy: f32,
    pub diffusion_rate: f32,
    /// Density retained per frame
    pub smoke_dissipation: f32,
    /// Velocity retained per frame
    pub smoke_velocity_damping: f32,
}

impl Default for PhysicsParameters {
    fn default() -> Self {
        Self {
            fps: 24.0,
            gravity: -9.8,
            ground_z: 0.0,
            ambient_temperature: 300.0,
            base_temperature: 3000.0,
            cooling_rate: 0.85,
            extinguish_epsilon: 1.0,
            initial_speed: 12.0,
            radial_decay: 0.35,
            fire_drag: 0.08,
            turbulence_strength: 4.0,
            turbulence_scale: 1.5,
            turbulence_period: 6.0,
            spawn_radius: 0.4,
            repulsion_strength: 6.0,
            debris_speed: 18.0,
            debris_drag: 0.02,
            debris_min_mass: 0.2,
            debris_max_mass: 3.0,
            restitution: 0.45,
            ground_friction: 0.7,
            spin_factor: 0.8,
            angular_damping: 0.98,
            settle_speed: 0.05,
            settle_frames: 5,
            smoke_cell_size: 0.5,
            smoke_source_frames: 12,
            smoke_source_rate: 0.8,
            smoke_source_radius: 2.0,
            smoke_source_lift: 2.0,
            buoyancy: 0.02,
            diffusion_rate: 0.05,
            smoke_dissipation: 0.995,
            smoke_velocity_damping: 0.98,
        }
    }
}

impl PhysicsParameters {
    /// Integration timestep in seconds
    #[inline]
    pub fn dt(&self) -> f32 {
        1.0 / self.fps
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("physics.gravity", self.gravity),
            ("physics.ground_z", self.ground_z),
            ("physics.fire_drag", self.fire_drag),
            ("physics.turbulence_strength", self.turbulence_strength),
            ("physics.repulsion_strength", self.repulsion_strength),
            ("physics.debris_drag", self.debris_drag),
            ("physics.spin_factor", self.spin_factor),
            ("physics.smoke_source_rate", self.smoke_source_rate),
            ("physics.smoke_source_lift", self.smoke_source_lift),
            ("physics.buoyancy", self.buoyancy),
            ("physics.radial_decay", self.radial_decay),
            ("physics.initial_speed", self.initial_speed),
            ("physics.debris_speed", self.debris_speed),
            ("physics.spawn_radius", self.spawn_radius),
            ("physics.settle_speed", self.settle_speed),
            ("physics.extinguish_epsilon", self.extinguish_epsilon),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }

        let positive = [
            ("physics.fps", self.fps),
            ("physics.ambient_temperature", self.ambient_temperature),
            ("physics.base_temperature", self.base_temperature),
            ("physics.turbulence_scale", self.turbulence_scale),
            ("physics.turbulence_period", self.turbulence_period),
            ("physics.debris_min_mass", self.debris_min_mass),
            ("physics.debris_max_mass", self.debris_max_mass),
            ("physics.smoke_cell_size", self.smoke_cell_size),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        let unit = [
            ("physics.cooling_rate", self.cooling_rate, false),
            ("physics.restitution", self.restitution, true),
            ("physics.ground_friction", self.ground_friction, false),
            ("physics.angular_damping", self.angular_damping, false),
            ("physics.smoke_dissipation", self.smoke_dissipation, false),
            ("physics.smoke_velocity_damping", self.smoke_velocity_damping, false),
        ];
        for (field, value, exclusive) in unit {
            let ok = if exclusive {
                (0.0..1.0).contains(&value)
            } else {
                (0.0..=1.0).contains(&value)
            };
            if !ok {
                let range = if exclusive { "[0, 1)" } else { "[0, 1]" };
                return Err(ConfigError::OutOfBounds { field, value, range });
            }
        }

        if !(self.diffusion_rate.is_finite() && self.diffusion_rate >= 0.0) {
            return Err(ConfigError::OutOfBounds {
                field: "physics.diffusion_rate",
                value: self.diffusion_rate,
                range: "[0, inf)",
            });
        }
        if !(self.smoke_source_radius.is_finite() && self.smoke_source_radius >= 0.0) {
            return Err(ConfigError::OutOfBounds {
                field: "physics.smoke_source_radius",
                value: self.smoke_source_radius,
                range: "[0, inf)",
            });
        }
        if self.debris_min_mass > self.debris_max_mass {
            return Err(ConfigError::OutOfBounds {
                field: "physics.debris_min_mass",
                value: self.debris_min_mass,
                range: "(0, debris_max_mass]",
            });
        }
        if self.settle_frames == 0 {
            return Err(ConfigError::OutOfBounds {
                field: "physics.settle_frames",
                value: 0.0,
                range: "[1, inf)",
            });
        }
        Ok(())
    }
}

/// Unvalidated config as read from JSON or assembled by the builder.
///
/// Integer fields are signed so that negative input reaches validation and
/// is reported as a [`ConfigError`] naming the field, rather than as a
/// generic parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExplosionConfig {
    pub name: String,
    #[serde(default)]
    pub location: [f32; 3],
    #[serde(default)]
    pub quality_preset: QualityPreset,
    #[serde(default)]
    pub fire_particle_count: Option<i64>,
    #[serde(default)]
    pub debris_particle_count: Option<i64>,
    #[serde(default)]
    pub start_frame: i64,
    pub duration: i64,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub smoke_resolution: Option<[usize; 3]>,
    #[serde(default)]
    pub physics: PhysicsParameters,
}

fn default_intensity() -> f32 {
    1.0
}

impl Default for RawExplosionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            location: [0.0; 3],
            quality_preset: QualityPreset::default(),
            fire_particle_count: None,
            debris_particle_count: None,
            start_frame: 0,
            duration: 60,
            intensity: default_intensity(),
            seed: 0,
            smoke_resolution: None,
            physics: PhysicsParameters::default(),
        }
    }
}

fn to_u32(field: &'static str, value: i64) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::OutOfRange { field, value })
}

fn count(field: &'static str, value: Option<i64>, baseline: u32) -> Result<u32, ConfigError> {
    match value {
        None => Ok(baseline),
        Some(v) if v < 0 => Err(ConfigError::NegativeCount { field, value: v }),
        Some(v) => to_u32(field, v),
    }
}

/// Validated, immutable explosion description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplosionConfig {
    name: String,
    location: Vec3,
    quality_preset: QualityPreset,
    fire_particle_count: u32,
    debris_particle_count: u32,
    start_frame: u32,
    duration: u32,
    intensity: f32,
    seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    smoke_resolution: Option<[usize; 3]>,
    physics: PhysicsParameters,
}

impl TryFrom<RawExplosionConfig> for ExplosionConfig {
    type Error = ConfigError;

    fn try_from(raw: RawExplosionConfig) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if raw.location.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::NonFinite { field: "location" });
        }

        let tier = raw.quality_preset.parameters();
        let fire_particle_count =
            count("fire_particle_count", raw.fire_particle_count, tier.fire_particles)?;
        let debris_particle_count = count(
            "debris_particle_count",
            raw.debris_particle_count,
            tier.debris_particles,
        )?;

        if raw.start_frame < 0 {
            return Err(ConfigError::NegativeStartFrame(raw.start_frame));
        }
        let start_frame = to_u32("start_frame", raw.start_frame)?;

        if raw.duration <= 0 {
            return Err(ConfigError::NonPositiveDuration(raw.duration));
        }
        let duration = to_u32("duration", raw.duration)?;
        if start_frame.checked_add(duration).is_none() {
            return Err(ConfigError::OutOfRange {
                field: "duration",
                value: raw.duration,
            });
        }

        if !(raw.intensity.is_finite() && raw.intensity > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "intensity",
                value: raw.intensity,
            });
        }

        if let Some(resolution) = raw.smoke_resolution {
            if let Some((axis, &value)) = resolution.iter().enumerate().find(|&(_, &n)| n < 2) {
                return Err(ConfigError::SmokeResolution { axis, value });
            }
        }

        raw.physics.validate()?;

        // Intensity-scaled spawn values must stay finite
        let scaled = [
            raw.physics.base_temperature,
            raw.physics.initial_speed,
            raw.physics.debris_speed,
            raw.physics.smoke_source_rate,
        ];
        if scaled.iter().any(|v| !(v * raw.intensity).is_finite()) {
            return Err(ConfigError::NonFinite { field: "intensity" });
        }

        Ok(ExplosionConfig {
            name: raw.name,
            location: Vec3::from(raw.location),
            quality_preset: raw.quality_preset,
            fire_particle_count,
            debris_particle_count,
            start_frame,
            duration,
            intensity: raw.intensity,
            seed: raw.seed,
            smoke_resolution: raw.smoke_resolution,
            physics: raw.physics,
        })
    }
}

impl ExplosionConfig {
    /// Start a builder for a config named `name`
    pub fn builder(name: impl Into<String>) -> ExplosionConfigBuilder {
        ExplosionConfigBuilder::new(name)
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawExplosionConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Read, parse, and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Serialize to the JSON config encoding
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// World-space origin of the explosion
    pub fn location(&self) -> Vec3 {
        self.location
    }

    pub fn quality_preset(&self) -> QualityPreset {
        self.quality_preset
    }

    /// Tier row the config was resolved against
    pub fn quality(&self) -> &'static QualityParameters {
        self.quality_preset.parameters()
    }

    pub fn fire_particle_count(&self) -> u32 {
        self.fire_particle_count
    }

    pub fn debris_particle_count(&self) -> u32 {
        self.debris_particle_count
    }

    pub fn start_frame(&self) -> u32 {
        self.start_frame
    }

    /// Length of the run in frames
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// First frame past the end of the run
    pub fn end_frame(&self) -> u32 {
        // Overflow rejected during validation
        self.start_frame + self.duration
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Effective smoke grid resolution: the per-config override, else the tier's
    pub fn smoke_resolution(&self) -> Option<[usize; 3]> {
        self.smoke_resolution.or(self.quality().smoke_resolution)
    }

    pub fn physics(&self) -> &PhysicsParameters {
        &self.physics
    }
}

/// Fluent construction of an [`ExplosionConfig`]
#[derive(Debug, Clone)]
pub struct ExplosionConfigBuilder {
    raw: RawExplosionConfig,
}

impl ExplosionConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            raw: RawExplosionConfig {
                name: name.into(),
                ..RawExplosionConfig::default()
            },
        }
    }

    pub fn location(mut self, x: f32, y: f32, z: f32) -> Self {
        self.raw.location = [x, y, z];
        self
    }

    pub fn quality_preset(mut self, preset: QualityPreset) -> Self {
        self.raw.quality_preset = preset;
        self
    }

    pub fn fire_particle_count(mut self, count: i64) -> Self {
        self.raw.fire_particle_count = Some(count);
        self
    }

    pub fn debris_particle_count(mut self, count: i64) -> Self {
        self.raw.debris_particle_count = Some(count);
        self
    }

    pub fn start_frame(mut self, frame: i64) -> Self {
        self.raw.start_frame = frame;
        self
    }

    pub fn duration(mut self, frames: i64) -> Self {
        self.raw.duration = frames;
        self
    }

    pub fn intensity(mut self, intensity: f32) -> Self {
        self.raw.intensity = intensity;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.raw.seed = seed;
        self
    }

    pub fn smoke_resolution(mut self, resolution: [usize; 3]) -> Self {
        self.raw.smoke_resolution = Some(resolution);
        self
    }

    pub fn physics(mut self, physics: PhysicsParameters) -> Self {
        self.raw.physics = physics;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<ExplosionConfig, ConfigError> {
        ExplosionConfig::try_from(self.raw)
    }
}
