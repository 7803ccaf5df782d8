//! Recording, persisting and comparing snapshot timelines
//!
//! Identical `(config, seed)` must reproduce bit-identical snapshots.
//! [`verify_determinism`] compares two timelines at the bit level, so a
//! `-0.0` vs `0.0` or NaN payload difference counts as divergence.

use crate::core_types::Vec3;
use crate::error::{DeterminismViolationError, DriverError, ExportError};
use crate::simulation::config::ExplosionConfig;
use crate::simulation::snapshot::{SimulationSnapshot, SnapshotTimeline};
use crate::simulation::SimulationDriver;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Run `config` to completion and keep every snapshot in memory
pub fn record(config: ExplosionConfig) -> Result<SnapshotTimeline, DriverError> {
    let mut timeline = SnapshotTimeline::new();
    SimulationDriver::run(config, &mut timeline)?;
    Ok(timeline)
}

impl SnapshotTimeline {
    /// Write the timeline to `path` as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ExportError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!("Saved timeline of {} frames", self.len());
        Ok(())
    }

    /// Read a timeline previously written by [`Self::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ExportError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[inline]
fn same_f32(a: f32, b: f32) -> bool {
    a.to_bits() == b.to_bits()
}

#[inline]
fn same_vec(a: &Vec3, b: &Vec3) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| same_f32(*x, *y))
}

fn diverged(frame: u32, detail: String) -> DeterminismViolationError {
    DeterminismViolationError { frame, detail }
}

/// First difference between two snapshots of the same frame, if any
fn compare_snapshot(
    a: &SimulationSnapshot,
    b: &SimulationSnapshot,
) -> Result<(), DeterminismViolationError> {
    let frame = a.frame;
    if a.frame != b.frame {
        return Err(diverged(
            frame,
            format!("frame numbers differ ({} vs {})", a.frame, b.frame),
        ));
    }

    if a.fire.len() != b.fire.len() {
        return Err(diverged(
            frame,
            format!("fire count {} vs {}", a.fire.len(), b.fire.len()),
        ));
    }
    for (x, y) in a.fire.iter().zip(&b.fire) {
        let same = x.id == y.id
            && x.alive == y.alive
            && same_vec(&x.position, &y.position)
            && same_f32(x.temperature, y.temperature)
            && x.color.iter().zip(&y.color).all(|(c, d)| same_f32(*c, *d));
        if !same {
            return Err(diverged(frame, format!("fire particle {} differs", x.id)));
        }
    }

    if a.debris.len() != b.debris.len() {
        return Err(diverged(
            frame,
            format!("debris count {} vs {}", a.debris.len(), b.debris.len()),
        ));
    }
    for (x, y) in a.debris.iter().zip(&b.debris) {
        let same = x.id == y.id
            && x.bounced_count == y.bounced_count
            && x.settled == y.settled
            && same_vec(&x.position, &y.position)
            && same_vec(&x.rotation, &y.rotation);
        if !same {
            return Err(diverged(frame, format!("debris {} differs", x.id)));
        }
    }

    match (&a.smoke, &b.smoke) {
        (None, None) => {}
        (Some(x), Some(y)) => {
            if x.resolution != y.resolution {
                return Err(diverged(frame, "smoke resolution differs".to_string()));
            }
            if let Some(voxel) = x
                .density
                .iter()
                .zip(&y.density)
                .position(|(d, e)| !same_f32(*d, *e))
            {
                return Err(diverged(frame, format!("smoke voxel {voxel} differs")));
            }
        }
        _ => return Err(diverged(frame, "smoke present in only one run".to_string())),
    }

    if a.diagnostics != b.diagnostics {
        return Err(diverged(frame, "diagnostics differ".to_string()));
    }
    Ok(())
}

/// Check that two timelines are bit-identical
pub fn verify_determinism(
    a: &SnapshotTimeline,
    b: &SnapshotTimeline,
) -> Result<(), DeterminismViolationError> {
    for (x, y) in a.snapshots().iter().zip(b.snapshots()) {
        compare_snapshot(x, y)?;
    }
    if a.len() != b.len() {
        let frame = a
            .snapshots()
            .get(a.len().min(b.len()))
            .or_else(|| b.snapshots().get(a.len().min(b.len())))
            .map_or(0, |s| s.frame);
        return Err(diverged(
            frame,
            format!("timeline lengths differ ({} vs {})", a.len(), b.len()),
        ));
    }
    Ok(())
}
