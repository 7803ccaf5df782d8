//! Error taxonomy
//!
//! - [`ConfigError`]: invalid input, raised before any simulation work
//! - [`ResourceLimitError`]: request over the memory/compute budget, raised before the run
//! - [`SimulationNumericalError`]: per-particle NaN/Inf, recovered locally and reported
//!   in snapshot diagnostics
//! - [`DeterminismViolationError`]: two identical runs diverged
//!
//! [`DriverError`] is what the driver's fallible operations return.

use crate::simulation::DriverState;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Invalid explosion configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be non-negative, got {value}")]
    NegativeCount { field: &'static str, value: i64 },

    #[error("start_frame must be non-negative, got {0}")]
    NegativeStartFrame(i64),

    #[error("duration must be positive, got {0}")]
    NonPositiveDuration(i64),

    #[error("{field} = {value} does not fit in a 32-bit frame/count")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("{field} must be positive and finite, got {value}")]
    NonPositive { field: &'static str, value: f32 },

    #[error("{field} must be finite")]
    NonFinite { field: &'static str },

    #[error("{field} must lie in {range}, got {value}")]
    OutOfBounds {
        field: &'static str,
        value: f32,
        range: &'static str,
    },

    #[error("name must not be empty")]
    EmptyName,

    #[error("smoke_resolution axis {axis} must be at least 2, got {value}")]
    SmokeResolution { axis: usize, value: usize },

    #[error("invalid config JSON: {0}")]
    Json(String),

    #[error("cannot read config file {path}: {reason}")]
    Read { path: String, reason: String },
}

impl ConfigError {
    /// The offending config field
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::NegativeCount { field, .. }
            | ConfigError::OutOfRange { field, .. }
            | ConfigError::NonPositive { field, .. }
            | ConfigError::NonFinite { field }
            | ConfigError::OutOfBounds { field, .. } => *field,
            ConfigError::NegativeStartFrame(_) => "start_frame",
            ConfigError::NonPositiveDuration(_) => "duration",
            ConfigError::EmptyName => "name",
            ConfigError::SmokeResolution { .. } => "smoke_resolution",
            ConfigError::Json(_) => "<json>",
            ConfigError::Read { .. } => "<file>",
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err.to_string())
    }
}

/// A run that would exceed the configured compute budget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource} request of {requested} exceeds the budget of {limit}")]
pub struct ResourceLimitError {
    pub resource: &'static str,
    pub requested: u64,
    pub limit: u64,
}

/// Kind of simulated entity, used to tag diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Fire,
    Debris,
    SmokeVoxel,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Fire => "fire",
            EntityKind::Debris => "debris",
            EntityKind::SmokeVoxel => "smoke voxel",
        };
        f.write_str(name)
    }
}

/// Non-finite state detected on one entity during a step.
///
/// Not fatal: the entity was reset to its last valid state and the run
/// continued. Carried in the snapshot's diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("non-finite {field} on {entity} {id} at frame {frame}, clamped to last valid state")]
pub struct SimulationNumericalError {
    pub frame: u32,
    pub entity: EntityKind,
    pub id: u32,
    pub field: String,
}

/// Two runs with identical config and seed produced different snapshots
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("runs diverged at frame {frame}: {detail}")]
pub struct DeterminismViolationError {
    pub frame: u32,
    pub detail: String,
}

/// Failure while handing a snapshot to an exporter
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by [`crate::SimulationDriver`]
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    ResourceLimit(#[from] ResourceLimitError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("cannot {operation} while the driver is {state}")]
    InvalidState {
        operation: &'static str,
        state: DriverState,
    },
}

// An already validated config converts infallibly
impl From<std::convert::Infallible> for DriverError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}
