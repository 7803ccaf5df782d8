//! Quality presets for particle counts and grid resolution
//!
//! This module defines the quality tiers and the static table of numeric
//! parameters behind them. Higher tiers spawn more particles, sample more
//! render rays, and enable the volumetric smoke grid, at higher cost.

use serde::{Deserialize, Serialize};

/// Quality tier selecting a row of the [`QualityPresetTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// Fast previews: few particles, no smoke grid
    Quick,
    /// Default production tier
    #[default]
    Medium,
    /// Full fidelity: most particles plus volumetric smoke
    High,
}

impl QualityPreset {
    /// Numeric parameters for this tier
    #[must_use]
    pub fn parameters(&self) -> &'static QualityParameters {
        QualityPresetTable::lookup(*self)
    }

    /// Lower-case name as used in config files
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One row of the preset table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityParameters {
    /// Baseline fire particle count
    pub fire_particles: u32,
    /// Baseline debris particle count
    pub debris_particles: u32,
    /// Renderer sample count, passed through as metadata
    pub render_samples: u32,
    /// Neighbor interaction radius (m), also the hash grid cell size
    pub interaction_radius: f32,
    /// Smoke grid resolution; `None` disables the volumetric tier
    pub smoke_resolution: Option<[usize; 3]>,
    /// Jacobi iterations per diffusion pass
    pub diffusion_iterations: usize,
}

/// Static tier table. Pure data.
pub struct QualityPresetTable;

impl QualityPresetTable {
    const QUICK: QualityParameters = QualityParameters {
        fire_particles: 10,
        debris_particles: 6,
        render_samples: 32,
        interaction_radius: 0.75,
        smoke_resolution: None,
        diffusion_iterations: 8,
    };

    const MEDIUM: QualityParameters = QualityParameters {
        fire_particles: 20,
        debris_particles: 10,
        render_samples: 128,
        interaction_radius: 0.6,
        smoke_resolution: None,
        diffusion_iterations: 12,
    };

    const HIGH: QualityParameters = QualityParameters {
        fire_particles: 30,
        debris_particles: 15,
        render_samples: 256,
        interaction_radius: 0.5,
        smoke_resolution: Some([24, 24, 32]),
        diffusion_iterations: 20,
    };

    /// Row for `preset`
    #[must_use]
    pub fn lookup(preset: QualityPreset) -> &'static QualityParameters {
        match preset {
            QualityPreset::Quick => &Self::QUICK,
            QualityPreset::Medium => &Self::MEDIUM,
            QualityPreset::High => &Self::HIGH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_counts() {
        let quick = QualityPreset::Quick.parameters();
        assert_eq!((quick.fire_particles, quick.debris_particles), (10, 6));
        let medium = QualityPreset::Medium.parameters();
        assert_eq!((medium.fire_particles, medium.debris_particles), (20, 10));
        let high = QualityPreset::High.parameters();
        assert_eq!((high.fire_particles, high.debris_particles), (30, 15));
    }

    #[test]
    fn test_cost_increases_with_tier() {
        let tiers = [QualityPreset::Quick, QualityPreset::Medium, QualityPreset::High];
        for pair in tiers.windows(2) {
            let lo = pair[0].parameters();
            let hi = pair[1].parameters();
            assert!(hi.fire_particles > lo.fire_particles);
            assert!(hi.render_samples > lo.render_samples);
            assert!(hi.diffusion_iterations >= lo.diffusion_iterations);
        }
    }

    #[test]
    fn test_smoke_only_on_high() {
        assert!(QualityPreset::Quick.parameters().smoke_resolution.is_none());
        assert!(QualityPreset::Medium.parameters().smoke_resolution.is_none());
        assert!(QualityPreset::High.parameters().smoke_resolution.is_some());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&QualityPreset::Quick).unwrap();
        assert_eq!(json, "\"quick\"");
        let parsed: QualityPreset = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, QualityPreset::High);
        assert_eq!(QualityPreset::Medium.as_str(), "medium");
    }
}
