//! Seeded noise for turbulence
//!
//! Provides deterministic pseudo-random value noise indexed by world position
//! and frame number. Every explosion instance owns its own [`SeededNoise`],
//! derived from the configured seed, so two runs with the same seed sample
//! exactly the same field.
//!
//! Nothing in this module reads clocks, thread ids, or global RNG state.

use crate::core_types::vec3::Vec3;

/// Lattice hashing primes
const SEED_X: u32 = 1619;
const SEED_Y: u32 = 31337;
const SEED_Z: u32 = 6971;
const SEED_W: u32 = 1013;

/// Maximum value for positive i32 as f64 for safe conversion
const MAX_I32_POSITIVE: f64 = 0x7fff_ffff as f64;

/// Per-axis seed offsets so the three turbulence channels are uncorrelated
const CHANNEL_OFFSETS: [u32; 3] = [0x68e3_1da4, 0xb529_7a4d, 0x1b56_c4e9];

/// Integer lattice hash over (x, y, z, w). Returns a value in [0, 1].
#[inline]
fn hash_4d(x: i32, y: i32, z: i32, w: i32, seed: u32) -> f32 {
    let mut n = x
        .wrapping_mul(SEED_X as i32)
        .wrapping_add(y.wrapping_mul(SEED_Y as i32))
        .wrapping_add(z.wrapping_mul(SEED_Z as i32))
        .wrapping_add(w.wrapping_mul(SEED_W as i32))
        .wrapping_add(seed as i32);
    n = (n << 13) ^ n;
    n = n
        .wrapping_mul(n.wrapping_mul(n).wrapping_mul(15731).wrapping_add(789_221))
        .wrapping_add(1_376_312_589);
    (f64::from(n & 0x7fff_ffff) / MAX_I32_POSITIVE) as f32
}

/// Smooth interpolation function (Hermite curve)
#[inline]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Deterministic value-noise generator owned by one explosion instance.
///
/// The field is continuous in space (trilinear interpolation over a lattice
/// of `spatial_scale` metres) and sampled at integer frames, with a smooth
/// blend between lattice slices every `temporal_scale` frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeededNoise {
    seed: u32,
    spatial_scale: f32,
    temporal_scale: f32,
}

impl SeededNoise {
    /// Create a generator from a 64-bit explosion seed.
    pub fn new(seed: u64, spatial_scale: f32, temporal_scale: f32) -> Self {
        // Fold the high word in so seeds differing only above bit 32 still diverge
        let folded = (seed as u32) ^ ((seed >> 32) as u32).rotate_left(16);
        Self {
            seed: folded,
            spatial_scale: spatial_scale.max(f32::EPSILON),
            temporal_scale: temporal_scale.max(1.0),
        }
    }

    /// Scalar noise in [-1, 1] at `position` and `frame`.
    pub fn sample(&self, position: Vec3, frame: u32) -> f32 {
        self.sample_channel(position, frame, self.seed)
    }

    /// Three independent noise channels packed into a vector, each in [-1, 1].
    pub fn sample_vec(&self, position: Vec3, frame: u32) -> Vec3 {
        Vec3::new(
            self.sample_channel(position, frame, self.seed ^ CHANNEL_OFFSETS[0]),
            self.sample_channel(position, frame, self.seed ^ CHANNEL_OFFSETS[1]),
            self.sample_channel(position, frame, self.seed ^ CHANNEL_OFFSETS[2]),
        )
    }

    fn sample_channel(&self, position: Vec3, frame: u32, seed: u32) -> f32 {
        let sx = position.x / self.spatial_scale;
        let sy = position.y / self.spatial_scale;
        let sz = position.z / self.spatial_scale;
        let st = frame as f32 / self.temporal_scale;

        let (x0, fx) = lattice(sx);
        let (y0, fy) = lattice(sy);
        let (z0, fz) = lattice(sz);
        let (t0, ft) = lattice(st);
        let (x1, y1, z1) = (x0.wrapping_add(1), y0.wrapping_add(1), z0.wrapping_add(1));

        let slice = |t: i32| -> f32 {
            let c000 = hash_4d(x0, y0, z0, t, seed);
            let c100 = hash_4d(x1, y0, z0, t, seed);
            let c010 = hash_4d(x0, y1, z0, t, seed);
            let c110 = hash_4d(x1, y1, z0, t, seed);
            let c001 = hash_4d(x0, y0, z1, t, seed);
            let c101 = hash_4d(x1, y0, z1, t, seed);
            let c011 = hash_4d(x0, y1, z1, t, seed);
            let c111 = hash_4d(x1, y1, z1, t, seed);

            let bottom = lerp(lerp(c000, c100, fx), lerp(c010, c110, fx), fy);
            let top = lerp(lerp(c001, c101, fx), lerp(c011, c111, fx), fy);
            lerp(bottom, top, fz)
        };

        let v = lerp(slice(t0), slice(t0.wrapping_add(1)), ft);

        // Convert from [0, 1] to [-1, 1]
        v * 2.0 - 1.0
    }
}

/// Lattice cell and smoothed in-cell fraction of one scaled coordinate.
/// The cell saturates at the i32 range and a non-finite coordinate sits at
/// the cell origin, so far-off samples stay finite.
#[inline]
fn lattice(s: f32) -> (i32, f32) {
    let floor = s.floor();
    let frac = s - floor;
    let frac = if frac.is_finite() { frac } else { 0.0 };
    (floor as i32, smoothstep(frac))
}
