//! Per-frame snapshots and their consumers
//!
//! The driver assembles one [`SimulationSnapshot`] per emitted frame and hands
//! it to a [`SnapshotExporter`]. Two exporters ship with the crate: the
//! in-memory [`SnapshotTimeline`] used for replay and comparison, and
//! [`JsonLinesExporter`] which writes one JSON object per line.

use crate::core_types::Vec3;
use crate::error::{ExportError, SimulationNumericalError};
use crate::grid::SmokeSlice;
use crate::physics::Rgb;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Externally visible state of one fire particle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireParticleState {
    pub id: u32,
    pub position: Vec3,
    /// Kelvin
    pub temperature: f32,
    pub color: Rgb,
    pub alive: bool,
}

/// Externally visible state of one debris piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebrisParticleState {
    pub id: u32,
    pub position: Vec3,
    /// Euler angles (radians)
    pub rotation: Vec3,
    pub bounced_count: u32,
    pub settled: bool,
}

/// Complete output for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub frame: u32,
    pub fire: Vec<FireParticleState>,
    pub debris: Vec<DebrisParticleState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoke: Option<SmokeSlice>,
    /// Numerical recoveries performed while producing this frame
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<SimulationNumericalError>,
}

impl SimulationSnapshot {
    pub fn live_fire_count(&self) -> usize {
        self.fire.iter().filter(|p| p.alive).count()
    }
}

/// Consumer of emitted snapshots
pub trait SnapshotExporter {
    fn export(&mut self, snapshot: &SimulationSnapshot) -> Result<(), ExportError>;
}

/// In-memory sequence of snapshots, in emission order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTimeline {
    snapshots: Vec<SimulationSnapshot>,
}

impl SnapshotTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[SimulationSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot for `frame`, if it was emitted
    pub fn frame(&self, frame: u32) -> Option<&SimulationSnapshot> {
        self.snapshots
            .binary_search_by_key(&frame, |s| s.frame)
            .ok()
            .map(|i| &self.snapshots[i])
    }

    pub fn first(&self) -> Option<&SimulationSnapshot> {
        self.snapshots.first()
    }

    pub fn last(&self) -> Option<&SimulationSnapshot> {
        self.snapshots.last()
    }

    pub fn into_snapshots(self) -> Vec<SimulationSnapshot> {
        self.snapshots
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl SnapshotExporter for SnapshotTimeline {
    fn export(&mut self, snapshot: &SimulationSnapshot) -> Result<(), ExportError> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}

/// Writes each snapshot as one line of JSON
#[derive(Debug)]
pub struct JsonLinesExporter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesExporter<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesExporter { writer, written: 0 }
    }

    /// Number of snapshots written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and hand back the writer
    pub fn into_inner(mut self) -> Result<W, ExportError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> SnapshotExporter for JsonLinesExporter<W> {
    fn export(&mut self, snapshot: &SimulationSnapshot) -> Result<(), ExportError> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;

    fn snapshot(frame: u32) -> SimulationSnapshot {
        SimulationSnapshot {
            frame,
            fire: vec![FireParticleState {
                id: 0,
                position: Vec3::new(1.0, 2.0, 3.0),
                temperature: 3000.0,
                color: [1.0, 1.0, 1.0],
                alive: true,
            }],
            debris: vec![DebrisParticleState {
                id: 0,
                position: Vec3::zeros(),
                rotation: Vec3::new(0.1, 0.0, 0.0),
                bounced_count: 0,
                settled: false,
            }],
            smoke: None,
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(snapshot(4)).unwrap();
        assert_eq!(json["frame"], 4);
        assert_eq!(json["fire"][0]["position"], serde_json::json!([1.0, 2.0, 3.0]));
        assert_eq!(json["fire"][0]["alive"], true);
        assert!(json["debris"][0]["rotation"].is_array());
        assert!(json.get("smoke").is_none());
        assert!(json.get("diagnostics").is_none());
    }

    #[test]
    fn test_diagnostics_serialized_when_present() {
        let mut s = snapshot(2);
        s.diagnostics.push(SimulationNumericalError {
            frame: 2,
            entity: EntityKind::Debris,
            id: 0,
            field: "velocity".to_string(),
        });
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["diagnostics"][0]["entity"], "debris");
        assert_eq!(json["diagnostics"][0]["field"], "velocity");
    }

    #[test]
    fn test_timeline_lookup() {
        let mut timeline = SnapshotTimeline::new();
        for frame in 3..8 {
            timeline.export(&snapshot(frame)).unwrap();
        }
        assert_eq!(timeline.len(), 5);
        assert_eq!(timeline.frame(5).map(|s| s.frame), Some(5));
        assert!(timeline.frame(2).is_none());
        assert_eq!(timeline.first().map(|s| s.frame), Some(3));
        assert_eq!(timeline.last().map(|s| s.frame), Some(7));

        let restored = SnapshotTimeline::from_json(&timeline.to_json().unwrap()).unwrap();
        assert_eq!(restored, timeline);
    }

    #[test]
    fn test_json_lines_exporter() {
        let mut exporter = JsonLinesExporter::new(Vec::new());
        exporter.export(&snapshot(0)).unwrap();
        exporter.export(&snapshot(1)).unwrap();
        assert_eq!(exporter.written(), 2);

        let bytes = exporter.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: SimulationSnapshot = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, snapshot(1));
    }
}
