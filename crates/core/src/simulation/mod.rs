//! Explosion simulation driver
//!
//! [`SimulationDriver`] owns one explosion's [`SimulationState`] and steps it
//! frame by frame, handing a [`SimulationSnapshot`] for every frame in
//! `start_frame .. start_frame + duration` to a [`SnapshotExporter`].
//!
//! ```text
//! Uninitialized --initialize--> Ready --advance_to--> Running --> Completed
//!        \                        \                      \
//!         `------------------------`-------abort----------`--> Aborted
//! ```
//!
//! The `start_frame` snapshot is the spawn state; every later frame is
//! produced by stepping each entity once, in a fixed order.

pub mod config;
pub mod debris;
pub mod fire;
pub mod quality;
pub mod replay;
pub mod snapshot;

pub use config::{ExplosionConfig, ExplosionConfigBuilder, PhysicsParameters, RawExplosionConfig};
pub use debris::DebrisSimulator;
pub use fire::FireParticleSystem;
pub use quality::{QualityParameters, QualityPreset, QualityPresetTable};
pub use replay::{record, verify_determinism};
pub use snapshot::{
    DebrisParticleState, FireParticleState, JsonLinesExporter, SimulationSnapshot,
    SnapshotExporter, SnapshotTimeline,
};

use crate::error::{DriverError, EntityKind, ResourceLimitError, SimulationNumericalError};
use crate::grid::VolumetricSmokeSimulator;
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle of a [`SimulationDriver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    Uninitialized,
    Ready,
    Running,
    Completed,
    Aborted,
}

impl DriverState {
    /// Completed and Aborted accept no further operations
    pub fn is_terminal(self) -> bool {
        matches!(self, DriverState::Completed | DriverState::Aborted)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Uninitialized => "uninitialized",
            DriverState::Ready => "ready",
            DriverState::Running => "running",
            DriverState::Completed => "completed",
            DriverState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Upper bounds checked before a run is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub max_fire_particles: u64,
    pub max_debris_particles: u64,
    pub max_smoke_voxels: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_fire_particles: 100_000,
            max_debris_particles: 50_000,
            // 128³
            max_smoke_voxels: 2_097_152,
        }
    }
}

impl ResourceLimits {
    /// Reject `config` if any sub-system would exceed its budget
    pub fn check(&self, config: &ExplosionConfig) -> Result<(), ResourceLimitError> {
        let over = |resource, requested: u64, limit: u64| {
            if requested > limit {
                Err(ResourceLimitError {
                    resource,
                    requested,
                    limit,
                })
            } else {
                Ok(())
            }
        };

        over(
            "fire_particle_count",
            u64::from(config.fire_particle_count()),
            self.max_fire_particles,
        )?;
        over(
            "debris_particle_count",
            u64::from(config.debris_particle_count()),
            self.max_debris_particles,
        )?;
        if let Some([nx, ny, nz]) = config.smoke_resolution() {
            let voxels = [nx, ny, nz].iter().try_fold(1u64, |acc, &n| {
                u64::try_from(n).ok().and_then(|n| acc.checked_mul(n))
            });
            over("smoke_voxels", voxels.unwrap_or(u64::MAX), self.max_smoke_voxels)?;
        }
        Ok(())
    }
}

/// One simulated sub-system
#[derive(Debug, Clone)]
pub enum SimulationEntity {
    Fire(FireParticleSystem),
    Debris(DebrisSimulator),
    SmokeVoxel(VolumetricSmokeSimulator),
}

impl SimulationEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            SimulationEntity::Fire(_) => EntityKind::Fire,
            SimulationEntity::Debris(_) => EntityKind::Debris,
            SimulationEntity::SmokeVoxel(_) => EntityKind::SmokeVoxel,
        }
    }

    fn step(&mut self, frame: u32) -> Vec<SimulationNumericalError> {
        match self {
            SimulationEntity::Fire(fire) => fire.step(frame),
            SimulationEntity::Debris(debris) => debris.step(frame),
            SimulationEntity::SmokeVoxel(smoke) => smoke.step(frame),
        }
    }

    /// Copy this entity's visible state into `snapshot`
    fn record(&self, snapshot: &mut SimulationSnapshot) {
        match self {
            SimulationEntity::Fire(fire) => snapshot.fire = fire.states(),
            SimulationEntity::Debris(debris) => snapshot.debris = debris.states(),
            SimulationEntity::SmokeVoxel(smoke) => snapshot.smoke = Some(smoke.slice()),
        }
    }
}

/// Everything one explosion run owns
#[derive(Debug, Clone)]
pub struct SimulationState {
    config: ExplosionConfig,
    entities: Vec<SimulationEntity>,
    /// Next frame to emit
    next_frame: u32,
}

impl SimulationState {
    /// Spawn every sub-system the config and its quality tier call for
    pub fn new(config: ExplosionConfig) -> Self {
        let mut entities = vec![
            SimulationEntity::Fire(FireParticleSystem::new(&config)),
            SimulationEntity::Debris(DebrisSimulator::new(&config)),
        ];
        if let Some(resolution) = config.smoke_resolution() {
            entities.push(SimulationEntity::SmokeVoxel(VolumetricSmokeSimulator::new(
                &config, resolution,
            )));
        }

        SimulationState {
            next_frame: config.start_frame(),
            config,
            entities,
        }
    }

    pub fn config(&self) -> &ExplosionConfig {
        &self.config
    }

    pub fn entities(&self) -> &[SimulationEntity] {
        &self.entities
    }

    pub fn next_frame(&self) -> u32 {
        self.next_frame
    }

    pub fn fire(&self) -> Option<&FireParticleSystem> {
        self.entities.iter().find_map(|e| match e {
            SimulationEntity::Fire(fire) => Some(fire),
            _ => None,
        })
    }

    pub fn debris(&self) -> Option<&DebrisSimulator> {
        self.entities.iter().find_map(|e| match e {
            SimulationEntity::Debris(debris) => Some(debris),
            _ => None,
        })
    }

    pub fn smoke(&self) -> Option<&VolumetricSmokeSimulator> {
        self.entities.iter().find_map(|e| match e {
            SimulationEntity::SmokeVoxel(smoke) => Some(smoke),
            _ => None,
        })
    }

    /// Produce the snapshot for `frame`, stepping first unless it is the spawn frame
    fn produce(&mut self, frame: u32) -> SimulationSnapshot {
        let mut diagnostics = Vec::new();
        if frame > self.config.start_frame() {
            for entity in &mut self.entities {
                diagnostics.extend(entity.step(frame));
            }
        }

        let mut snapshot = SimulationSnapshot {
            frame,
            fire: Vec::new(),
            debris: Vec::new(),
            smoke: None,
            diagnostics,
        };
        for entity in &self.entities {
            entity.record(&mut snapshot);
        }
        snapshot
    }
}

/// Steps one explosion and emits its snapshots
#[derive(Debug)]
pub struct SimulationDriver {
    state: DriverState,
    limits: ResourceLimits,
    simulation: Option<SimulationState>,
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationDriver {
    pub fn new() -> Self {
        Self::with_limits(ResourceLimits::default())
    }

    pub fn with_limits(limits: ResourceLimits) -> Self {
        SimulationDriver {
            state: DriverState::Uninitialized,
            limits,
            simulation: None,
        }
    }

    /// Validate `config`, check it against the resource budget and spawn the run.
    ///
    /// Accepts an already validated [`ExplosionConfig`] or a
    /// [`RawExplosionConfig`] that is validated here. On error the driver
    /// stays uninitialized.
    pub fn initialize<C>(&mut self, config: C) -> Result<(), DriverError>
    where
        C: TryInto<ExplosionConfig>,
        DriverError: From<C::Error>,
    {
        if self.state != DriverState::Uninitialized {
            return Err(self.invalid("initialize"));
        }

        let config = config.try_into()?;
        if let Err(err) = self.limits.check(&config) {
            warn!("Rejected explosion '{}': {}", config.name(), err);
            return Err(err.into());
        }

        info!(
            "Initializing explosion '{}': preset={}, fire={}, debris={}, smoke={:?}, frames {}..{}",
            config.name(),
            config.quality_preset().as_str(),
            config.fire_particle_count(),
            config.debris_particle_count(),
            config.smoke_resolution(),
            config.start_frame(),
            config.end_frame()
        );

        self.simulation = Some(SimulationState::new(config));
        self.state = DriverState::Ready;
        Ok(())
    }

    /// Emit every not-yet-emitted frame up to and including `frame`.
    ///
    /// Frames before `start_frame` emit nothing, and a frame that was already
    /// emitted is a no-op. Reaching the end of the run completes the driver.
    /// An exporter failure aborts the run. Returns the number of snapshots
    /// emitted by this call.
    pub fn advance_to(
        &mut self,
        frame: u32,
        exporter: &mut dyn SnapshotExporter,
    ) -> Result<usize, DriverError> {
        if !matches!(self.state, DriverState::Ready | DriverState::Running) {
            return Err(self.invalid("advance"));
        }
        let state = self.state;
        let Some(simulation) = self.simulation.as_mut() else {
            return Err(DriverError::InvalidState {
                operation: "advance",
                state,
            });
        };
        self.state = DriverState::Running;

        let end_frame = simulation.config.end_frame();
        let last = frame.min(end_frame - 1);
        let mut emitted = 0;

        while simulation.next_frame <= last {
            let current = simulation.next_frame;
            let snapshot = simulation.produce(current);
            debug!(
                "Frame {}: {} fire alive, {} diagnostics",
                current,
                snapshot.live_fire_count(),
                snapshot.diagnostics.len()
            );

            if let Err(err) = exporter.export(&snapshot) {
                warn!("Export failed at frame {}: {}, aborting run", current, err);
                self.simulation = None;
                self.state = DriverState::Aborted;
                return Err(err.into());
            }
            simulation.next_frame = current + 1;
            emitted += 1;
        }

        if frame >= end_frame {
            info!(
                "Explosion '{}' completed after {} frames",
                simulation.config.name(),
                simulation.config.duration()
            );
            self.state = DriverState::Completed;
        }
        Ok(emitted)
    }

    /// Stop the run and discard its state without emitting anything further
    pub fn abort(&mut self) -> Result<(), DriverError> {
        if self.state.is_terminal() {
            return Err(self.invalid("abort"));
        }
        info!("Aborting simulation in state {}", self.state);
        self.simulation = None;
        self.state = DriverState::Aborted;
        Ok(())
    }

    /// Initialize a driver for `config` and run it to completion
    pub fn run(
        config: ExplosionConfig,
        exporter: &mut dyn SnapshotExporter,
    ) -> Result<Self, DriverError> {
        let mut driver = Self::new();
        let end_frame = config.end_frame();
        driver.initialize(config)?;
        driver.advance_to(end_frame, exporter)?;
        Ok(driver)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Live run state; `None` before initialization and after an abort
    pub fn simulation(&self) -> Option<&SimulationState> {
        self.simulation.as_ref()
    }

    fn invalid(&self, operation: &'static str) -> DriverError {
        DriverError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExplosionConfig {
        ExplosionConfig::builder("driver")
            .quality_preset(QualityPreset::Quick)
            .start_frame(5)
            .duration(10)
            .seed(3)
            .build()
            .unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let mut driver = SimulationDriver::new();
        assert_eq!(driver.state(), DriverState::Uninitialized);
        driver.initialize(config()).unwrap();
        assert_eq!(driver.state(), DriverState::Ready);

        let mut timeline = SnapshotTimeline::new();
        assert_eq!(driver.advance_to(7, &mut timeline).unwrap(), 3);
        assert_eq!(driver.state(), DriverState::Running);
        assert_eq!(driver.advance_to(14, &mut timeline).unwrap(), 7);
        assert_eq!(driver.state(), DriverState::Running);
        assert_eq!(driver.advance_to(15, &mut timeline).unwrap(), 0);
        assert_eq!(driver.state(), DriverState::Completed);

        let frames: Vec<u32> = timeline.snapshots().iter().map(|s| s.frame).collect();
        assert_eq!(frames, (5..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_frames_before_start_emit_nothing() {
        let mut driver = SimulationDriver::new();
        driver.initialize(config()).unwrap();
        let mut timeline = SnapshotTimeline::new();
        assert_eq!(driver.advance_to(2, &mut timeline).unwrap(), 0);
        assert!(timeline.is_empty());
        assert_eq!(driver.advance_to(5, &mut timeline).unwrap(), 1);
        assert_eq!(timeline.first().map(|s| s.frame), Some(5));
    }

    #[test]
    fn test_repeated_frame_is_noop() {
        let mut driver = SimulationDriver::new();
        driver.initialize(config()).unwrap();
        let mut timeline = SnapshotTimeline::new();
        driver.advance_to(8, &mut timeline).unwrap();
        assert_eq!(driver.advance_to(8, &mut timeline).unwrap(), 0);
        assert_eq!(driver.advance_to(6, &mut timeline).unwrap(), 0);
        assert_eq!(timeline.len(), 4);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut driver = SimulationDriver::new();
        let mut timeline = SnapshotTimeline::new();
        assert!(matches!(
            driver.advance_to(1, &mut timeline),
            Err(DriverError::InvalidState {
                operation: "advance",
                state: DriverState::Uninitialized
            })
        ));

        driver.initialize(config()).unwrap();
        assert!(matches!(
            driver.initialize(config()),
            Err(DriverError::InvalidState { state: DriverState::Ready, .. })
        ));

        driver.advance_to(100, &mut timeline).unwrap();
        assert!(matches!(
            driver.abort(),
            Err(DriverError::InvalidState { state: DriverState::Completed, .. })
        ));
    }

    #[test]
    fn test_abort_discards_state() {
        let mut driver = SimulationDriver::new();
        driver.initialize(config()).unwrap();
        let mut timeline = SnapshotTimeline::new();
        driver.advance_to(6, &mut timeline).unwrap();
        driver.abort().unwrap();

        assert_eq!(driver.state(), DriverState::Aborted);
        assert!(driver.simulation().is_none());
        assert!(driver.advance_to(10, &mut timeline).is_err());
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn test_raw_config_is_validated() {
        let raw = RawExplosionConfig {
            name: "raw".to_string(),
            fire_particle_count: Some(-5),
            ..RawExplosionConfig::default()
        };
        let mut driver = SimulationDriver::new();
        let err = driver.initialize(raw).unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
        assert_eq!(driver.state(), DriverState::Uninitialized);
    }

    #[test]
    fn test_resource_limits() {
        let limits = ResourceLimits {
            max_fire_particles: 5,
            ..ResourceLimits::default()
        };
        let mut driver = SimulationDriver::with_limits(limits);
        let err = driver.initialize(config()).unwrap_err();
        match err {
            DriverError::ResourceLimit(e) => {
                assert_eq!(e.resource, "fire_particle_count");
                assert_eq!(e.requested, 10);
                assert_eq!(e.limit, 5);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(driver.state(), DriverState::Uninitialized);
    }

    #[test]
    fn test_smoke_only_when_resolved() {
        let quick = SimulationState::new(config());
        assert!(quick.smoke().is_none());
        assert_eq!(quick.entities().len(), 2);

        let high = ExplosionConfig::builder("high")
            .quality_preset(QualityPreset::High)
            .build()
            .unwrap();
        let state = SimulationState::new(high);
        assert_eq!(
            state.smoke().map(VolumetricSmokeSimulator::resolution),
            Some([24, 24, 32])
        );
        assert_eq!(state.entities()[2].kind(), EntityKind::SmokeVoxel);
    }

    #[test]
    fn test_recovery_is_reported_in_snapshot() {
        use crate::core_types::{FireParticle, Vec3};

        let cfg = config();
        let mut driver = SimulationDriver::new();
        driver.initialize(cfg.clone()).unwrap();
        let particles = vec![
            FireParticle::new(0, Vec3::new(0.5, 0.0, 0.0), Vec3::zeros(), 3000.0),
            FireParticle::new(7, Vec3::new(5.0, 0.0, 0.0), Vec3::new(f32::INFINITY, 0.0, 0.0), 3000.0),
        ];
        driver.simulation.as_mut().unwrap().entities[0] =
            SimulationEntity::Fire(FireParticleSystem::with_particles(&cfg, particles));

        let mut timeline = SnapshotTimeline::new();
        driver.advance_to(cfg.end_frame(), &mut timeline).unwrap();
        assert_eq!(driver.state(), DriverState::Completed);
        assert_eq!(timeline.len(), 10);

        assert!(timeline.frame(5).unwrap().diagnostics.is_empty());
        let recovered = timeline.frame(6).unwrap();
        assert_eq!(recovered.diagnostics.len(), 1);
        let diagnostic = &recovered.diagnostics[0];
        assert_eq!(diagnostic.entity, EntityKind::Fire);
        assert_eq!(diagnostic.frame, 6);
        assert_eq!(diagnostic.id, 7);
        assert_eq!(recovered.fire[1].position, Vec3::new(5.0, 0.0, 0.0));

        // Once cleared the particle keeps running without further reports
        let total: usize = timeline.snapshots().iter().map(|s| s.diagnostics.len()).sum();
        assert_eq!(total, 1);
        assert!(timeline
            .snapshots()
            .iter()
            .all(|s| s.fire.iter().all(|p| p.position.iter().all(|c| c.is_finite()))));
    }
}
