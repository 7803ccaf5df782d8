//! Vector type alias for 3D positions, velocities, and accelerations.

use nalgebra::Vector3;

/// 3D vector type used throughout the engine.
///
/// Alias for `nalgebra::Vector3<f32>`. Serializes as a `[x, y, z]` array,
/// which is the wire shape the snapshot JSON expects.
pub type Vec3 = Vector3<f32>;

/// Returns `true` when every component is finite (no NaN, no infinity).
#[inline]
pub fn is_finite_vec(v: &Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_detection() {
        assert!(is_finite_vec(&Vec3::new(1.0, -2.0, 3.0)));
        assert!(!is_finite_vec(&Vec3::new(f32::NAN, 0.0, 0.0)));
        assert!(!is_finite_vec(&Vec3::new(0.0, f32::INFINITY, 0.0)));
    }
}
