//! Fire particle cooling and blackbody-style color mapping
//!
//! Temperature follows geometric decay of the excess over ambient:
//!
//! ```text
//! T(n) = T_amb + (T_0 - T_amb) × r^n
//! ```
//!
//! where `n` is frames since spawn and `r` the per-frame cooling rate. The
//! result is clamped to `[T_amb, T_0]`, so it is non-increasing in `n` and
//! holds at ambient once reached.
//!
//! Color is a heuristic gradient used as snapshot metadata only.

use crate::simulation::config::{ExplosionConfig, PhysicsParameters};

/// Linear RGB in [0, 1]
pub type Rgb = [f32; 3];

/// Color stops, ascending in temperature (K)
const COLOR_STOPS: [(f32, Rgb); 6] = [
    (400.0, [0.15, 0.12, 0.12]),  // faded smoke
    (600.0, [0.45, 0.08, 0.03]),  // dim red
    (1000.0, [0.9, 0.2, 0.05]),   // red
    (1500.0, [1.0, 0.55, 0.1]),   // orange
    (2000.0, [1.0, 0.9, 0.3]),    // yellow
    (2500.0, [1.0, 1.0, 1.0]),    // white
];

/// Temperature decay and color mapping for one explosion instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermodynamicModel {
    ambient: f32,
    initial: f32,
    cooling_rate: f32,
    epsilon: f32,
}

impl ThermodynamicModel {
    /// Build the model for a validated config.
    ///
    /// Spawn temperature scales with intensity and never drops below ambient.
    pub fn new(config: &ExplosionConfig) -> Self {
        Self::from_parameters(config.intensity(), config.physics())
    }

    pub fn from_parameters(intensity: f32, physics: &PhysicsParameters) -> Self {
        let ambient = physics.ambient_temperature;
        ThermodynamicModel {
            ambient,
            initial: (physics.base_temperature * intensity).max(ambient),
            cooling_rate: physics.cooling_rate,
            epsilon: physics.extinguish_epsilon,
        }
    }

    /// Temperature (K) `frame_offset` frames after spawn
    pub fn temperature(&self, frame_offset: u32) -> f32 {
        let exponent = i32::try_from(frame_offset).unwrap_or(i32::MAX);
        let excess = (self.initial - self.ambient) * self.cooling_rate.powi(exponent);
        (self.ambient + excess).clamp(self.ambient, self.initial)
    }

    /// True once `temperature` has reached the ambient floor
    #[inline]
    pub fn is_extinguished(&self, temperature: f32) -> bool {
        temperature <= self.ambient + self.epsilon
    }

    pub fn ambient(&self) -> f32 {
        self.ambient
    }

    /// Spawn temperature (K)
    pub fn initial(&self) -> f32 {
        self.initial
    }

    /// Map a temperature to a display color
    pub fn color(temperature: f32) -> Rgb {
        let (first_t, first_c) = COLOR_STOPS[0];
        if temperature <= first_t {
            return first_c;
        }
        for pair in COLOR_STOPS.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if temperature <= t1 {
                let f = (temperature - t0) / (t1 - t0);
                return [
                    c0[0] * (1.0 - f) + c1[0] * f,
                    c0[1] * (1.0 - f) + c1[1] * f,
                    c0[2] * (1.0 - f) + c1[2] * f,
                ];
            }
        }
        COLOR_STOPS[COLOR_STOPS.len() - 1].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> ThermodynamicModel {
        ThermodynamicModel::from_parameters(1.0, &PhysicsParameters::default())
    }

    #[test]
    fn test_spawn_temperature() {
        assert_eq!(model().temperature(0), 3000.0);
    }

    #[test]
    fn test_decay_formula() {
        let m = model();
        assert_relative_eq!(m.temperature(1), 300.0 + 2700.0 * 0.85, epsilon = 1e-2);
        assert_relative_eq!(m.temperature(4), 300.0 + 2700.0 * 0.85f32.powi(4), epsilon = 1e-2);
    }

    #[test]
    fn test_monotone_then_constant() {
        let m = model();
        let mut prev = m.temperature(0);
        for n in 1..400 {
            let t = m.temperature(n);
            assert!(t <= prev, "temperature rose at frame {n}: {prev} -> {t}");
            assert!(t >= m.ambient());
            prev = t;
        }
        assert_eq!(m.temperature(399), 300.0);
        assert_eq!(m.temperature(u32::MAX), 300.0);
    }

    #[test]
    fn test_extinguished_by_frame_59() {
        let m = model();
        assert!(!m.is_extinguished(m.temperature(30)));
        assert!(m.is_extinguished(m.temperature(59)));
    }

    #[test]
    fn test_intensity_scales_and_clamps() {
        let physics = PhysicsParameters::default();
        let hot = ThermodynamicModel::from_parameters(1.5, &physics);
        assert_eq!(hot.initial(), 4500.0);
        let weak = ThermodynamicModel::from_parameters(0.01, &physics);
        assert_eq!(weak.initial(), 300.0);
        assert_eq!(weak.temperature(0), 300.0);
    }

    #[test]
    fn test_color_gradient() {
        assert_eq!(ThermodynamicModel::color(3000.0), [1.0, 1.0, 1.0]);
        assert_eq!(ThermodynamicModel::color(2000.0), [1.0, 0.9, 0.3]);
        assert_eq!(ThermodynamicModel::color(300.0), [0.15, 0.12, 0.12]);
        let mid = ThermodynamicModel::color(1250.0);
        assert!(mid[1] > 0.2 && mid[1] < 0.55);
        // Hotter is never darker in the red channel
        assert!(ThermodynamicModel::color(900.0)[0] >= ThermodynamicModel::color(500.0)[0]);
    }
}
