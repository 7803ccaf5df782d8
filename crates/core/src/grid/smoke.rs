//! Volumetric Smoke Grid
//!
//! A coarse Eulerian density/velocity field for the higher quality tiers.
//! Each step runs, in order:
//!
//! 1. **Source** - injects density and lift in a sphere around the explosion
//!    origin for the first `smoke_source_frames` frames
//! 2. **Advection** - semi-Lagrangian backward trace
//!    ```text
//!    q'(x) = q(x - v(x)·dt)
//!    ```
//!    sampled with trilinear interpolation
//! 3. **Buoyancy** - `w += buoyancy × density`
//! 4. **Diffusion** - fixed-iteration Jacobi solve of
//!    ```text
//!    (1 + 6a)·x - a·Σ neighbors(x) = x₀,   a = diffusion_rate
//!    ```
//! 5. **Dissipation** - density and velocity decay per frame
//!
//! Boundaries are open: anything outside the domain reads as zero, so density
//! that leaves the grid is lost and diffusion can never create mass.
//!
//! Voxel `(ix, iy, iz)` is stored at `iz·nx·ny + iy·nx + ix`. Every pass reads
//! the previous buffer and writes the next one, parallelized over z-layers.

use crate::core_types::vec3::Vec3;
use crate::error::{EntityKind, SimulationNumericalError};
use crate::simulation::config::ExplosionConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[inline]
#[expect(clippy::cast_precision_loss)]
fn usize_to_f32(v: usize) -> f32 {
    v as f32
}

/// Flattened density field as carried in snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmokeSlice {
    pub resolution: [usize; 3],
    /// x-fastest, then y, then z
    pub density: Vec<f32>,
}

/// Smoke injection around the explosion origin
#[derive(Debug, Clone, Copy)]
struct SmokeSource {
    /// Center in continuous voxel coordinates
    center: Vec3,
    radius: f32,
    rate: f32,
    lift: f32,
    frames: u32,
}

/// Grid smoke solver owned by one explosion
#[derive(Debug, Clone)]
pub struct VolumetricSmokeSimulator {
    resolution: [usize; 3],
    cell_size: f32,
    /// World position of the grid's minimum corner
    origin: Vec3,
    density: Vec<f32>,
    velocity: Vec<Vec3>,
    density_next: Vec<f32>,
    velocity_next: Vec<Vec3>,
    source: SmokeSource,
    dt: f32,
    buoyancy: f32,
    diffusion_rate: f32,
    diffusion_iterations: usize,
    dissipation: f32,
    velocity_damping: f32,
    start_frame: u32,
}

impl VolumetricSmokeSimulator {
    /// Build a grid of `resolution` voxels for `config`.
    ///
    /// The grid is centered horizontally on the explosion and extends mostly
    /// upward from it, since the plume rises.
    pub fn new(config: &ExplosionConfig, resolution: [usize; 3]) -> Self {
        let physics = config.physics();
        let cell_size = physics.smoke_cell_size;
        let [nx, ny, nz] = resolution;
        let extent = Vec3::new(usize_to_f32(nx), usize_to_f32(ny), usize_to_f32(nz)) * cell_size;
        let origin = config.location() - Vec3::new(extent.x * 0.5, extent.y * 0.5, extent.z * 0.25);

        let center = (config.location() - origin) / cell_size - Vec3::repeat(0.5);
        let total = nx * ny * nz;

        VolumetricSmokeSimulator {
            resolution,
            cell_size,
            origin,
            density: vec![0.0; total],
            velocity: vec![Vec3::zeros(); total],
            density_next: vec![0.0; total],
            velocity_next: vec![Vec3::zeros(); total],
            source: SmokeSource {
                center,
                radius: physics.smoke_source_radius,
                rate: physics.smoke_source_rate * config.intensity(),
                lift: physics.smoke_source_lift,
                frames: physics.smoke_source_frames,
            },
            dt: physics.dt(),
            buoyancy: physics.buoyancy,
            diffusion_rate: physics.diffusion_rate,
            diffusion_iterations: config.quality().diffusion_iterations,
            dissipation: physics.smoke_dissipation,
            velocity_damping: physics.smoke_velocity_damping,
            start_frame: config.start_frame(),
        }
    }

    #[inline]
    fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        let [nx, ny, _] = self.resolution;
        iz * (nx * ny) + iy * nx + ix
    }

    /// Advance the field to `frame`; the spawn frame is never stepped
    pub fn step(&mut self, frame: u32) -> Vec<SimulationNumericalError> {
        if frame <= self.start_frame {
            return Vec::new();
        }
        let age = frame - self.start_frame;

        if age <= self.source.frames {
            self.inject_source();
        }
        self.advect();
        self.apply_buoyancy();
        self.diffuse(self.diffusion_iterations);
        self.dissipate();

        let diagnostics = self.sanitize(frame);
        debug!(
            "Smoke step frame {}: total density {:.3}",
            frame,
            self.total_density()
        );
        diagnostics
    }

    fn inject_source(&mut self) {
        let source = self.source;
        let [nx, ny, _] = self.resolution;
        let layer_size = nx * ny;

        self.density
            .par_chunks_mut(layer_size)
            .zip(self.velocity.par_chunks_mut(layer_size))
            .enumerate()
            .for_each(|(iz, (density_layer, velocity_layer))| {
                let dz = usize_to_f32(iz) - source.center.z;
                for iy in 0..ny {
                    for ix in 0..nx {
                        let offset = Vec3::new(
                            usize_to_f32(ix) - source.center.x,
                            usize_to_f32(iy) - source.center.y,
                            dz,
                        );
                        let distance = offset.norm();
                        if distance > source.radius {
                            continue;
                        }
                        let falloff = 1.0 - distance / (source.radius + 1.0);
                        let idx = iy * nx + ix;
                        density_layer[idx] += source.rate * falloff;
                        velocity_layer[idx].z = velocity_layer[idx].z.max(source.lift);
                    }
                }
            });
    }

    /// Trilinear sample in voxel coordinates; outside the grid reads as zero
    fn sample<T>(&self, field: &[T], at: Vec3, zero: T) -> T
    where
        T: Copy + std::ops::Add<Output = T> + std::ops::Mul<f32, Output = T>,
    {
        let [nx, ny, nz] = self.resolution;
        let base = at.map(f32::floor);
        let frac = at - base;

        let mut acc = zero;
        for corner in 0..8u8 {
            let (ox, oy, oz) = (corner & 1, (corner >> 1) & 1, (corner >> 2) & 1);
            let (Some(ix), Some(iy), Some(iz)) = (
                voxel_coord(base.x, ox, nx),
                voxel_coord(base.y, oy, ny),
                voxel_coord(base.z, oz, nz),
            ) else {
                continue;
            };
            let wx = if ox == 1 { frac.x } else { 1.0 - frac.x };
            let wy = if oy == 1 { frac.y } else { 1.0 - frac.y };
            let wz = if oz == 1 { frac.z } else { 1.0 - frac.z };
            acc = acc + field[self.index(ix, iy, iz)] * (wx * wy * wz);
        }
        acc
    }

    /// Semi-Lagrangian transport of density and velocity by the velocity field
    pub fn advect(&mut self) {
        let [nx, ny, _] = self.resolution;
        let layer_size = nx * ny;
        let scale = self.dt / self.cell_size;

        let mut density_next = std::mem::take(&mut self.density_next);
        let mut velocity_next = std::mem::take(&mut self.velocity_next);
        let this = &*self;

        density_next
            .par_chunks_mut(layer_size)
            .zip(velocity_next.par_chunks_mut(layer_size))
            .enumerate()
            .for_each(|(iz, (density_layer, velocity_layer))| {
                for iy in 0..ny {
                    for ix in 0..nx {
                        let idx = iy * nx + ix;
                        let here = Vec3::new(usize_to_f32(ix), usize_to_f32(iy), usize_to_f32(iz));
                        let departure = here - this.velocity[this.index(ix, iy, iz)] * scale;
                        density_layer[idx] = this.sample(&this.density, departure, 0.0).max(0.0);
                        velocity_layer[idx] = this.sample(&this.velocity, departure, Vec3::zeros());
                    }
                }
            });

        self.density_next = std::mem::replace(&mut self.density, density_next);
        self.velocity_next = std::mem::replace(&mut self.velocity, velocity_next);
    }

    /// Dense smoke rises: `w += buoyancy × density`
    pub fn apply_buoyancy(&mut self) {
        let buoyancy = self.buoyancy;
        self.velocity
            .par_iter_mut()
            .zip(self.density.par_iter())
            .for_each(|(v, &d)| v.z += buoyancy * d);
    }

    /// Jacobi diffusion of density with open boundaries.
    ///
    /// With non-negative input the total density never increases.
    pub fn diffuse(&mut self, iterations: usize) {
        let a = self.diffusion_rate;
        if a == 0.0 || iterations == 0 {
            return;
        }
        let [nx, ny, nz] = self.resolution;
        let layer_size = nx * ny;
        let inv_denom = 1.0 / (1.0 + 6.0 * a);

        let initial = self.density.clone();
        let mut current = self.density.clone();
        let mut next = std::mem::take(&mut self.density_next);

        for _ in 0..iterations {
            let prev = &current;
            let at = |ix: usize, iy: usize, iz: usize| prev[iz * layer_size + iy * nx + ix];
            next.par_chunks_mut(layer_size)
                .enumerate()
                .for_each(|(iz, layer)| {
                    for iy in 0..ny {
                        for ix in 0..nx {
                            let mut sum = 0.0;
                            if ix > 0 {
                                sum += at(ix - 1, iy, iz);
                            }
                            if ix + 1 < nx {
                                sum += at(ix + 1, iy, iz);
                            }
                            if iy > 0 {
                                sum += at(ix, iy - 1, iz);
                            }
                            if iy + 1 < ny {
                                sum += at(ix, iy + 1, iz);
                            }
                            if iz > 0 {
                                sum += at(ix, iy, iz - 1);
                            }
                            if iz + 1 < nz {
                                sum += at(ix, iy, iz + 1);
                            }
                            let idx = iy * nx + ix;
                            let x0 = initial[iz * layer_size + idx];
                            layer[idx] = ((x0 + a * sum) * inv_denom).max(0.0);
                        }
                    }
                });
            std::mem::swap(&mut current, &mut next);
        }

        self.density = current;
        self.density_next = next;
    }

    fn dissipate(&mut self) {
        let dissipation = self.dissipation;
        let damping = self.velocity_damping;
        self.density
            .par_iter_mut()
            .for_each(|d| *d = (*d * dissipation).max(0.0));
        self.velocity.par_iter_mut().for_each(|v| *v *= damping);
    }

    /// Zero any voxel that went non-finite and report it
    fn sanitize(&mut self, frame: u32) -> Vec<SimulationNumericalError> {
        let mut diagnostics = Vec::new();
        for (idx, (d, v)) in self.density.iter_mut().zip(self.velocity.iter_mut()).enumerate() {
            let field = if !d.is_finite() {
                "density"
            } else if !v.iter().all(|c| c.is_finite()) {
                "velocity"
            } else {
                continue;
            };
            *d = 0.0;
            *v = Vec3::zeros();
            warn!(
                "Smoke voxel {} produced non-finite {} at frame {}, cleared",
                idx, field, frame
            );
            diagnostics.push(SimulationNumericalError {
                frame,
                entity: EntityKind::SmokeVoxel,
                id: u32::try_from(idx).unwrap_or(u32::MAX),
                field: field.to_string(),
            });
        }
        diagnostics
    }

    /// Sum of density over every voxel
    pub fn total_density(&self) -> f32 {
        self.density.iter().sum()
    }

    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// World position of the grid's minimum corner
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn density(&self) -> &[f32] {
        &self.density
    }

    pub fn density_at(&self, ix: usize, iy: usize, iz: usize) -> f32 {
        self.density[self.index(ix, iy, iz)]
    }

    pub fn velocity_at(&self, ix: usize, iy: usize, iz: usize) -> Vec3 {
        self.velocity[self.index(ix, iy, iz)]
    }

    /// Overwrite one voxel's density, clamped to ≥ 0
    pub fn set_density(&mut self, ix: usize, iy: usize, iz: usize, value: f32) {
        let idx = self.index(ix, iy, iz);
        self.density[idx] = value.max(0.0);
    }

    pub fn set_velocity(&mut self, ix: usize, iy: usize, iz: usize, value: Vec3) {
        let idx = self.index(ix, iy, iz);
        self.velocity[idx] = value;
    }

    pub fn slice(&self) -> SmokeSlice {
        SmokeSlice {
            resolution: self.resolution,
            density: self.density.clone(),
        }
    }
}

/// Index of a lattice corner along one axis, if inside `0..n`
#[inline]
fn voxel_coord(base: f32, offset: u8, n: usize) -> Option<usize> {
    let c = base + f32::from(offset);
    // Written so NaN falls outside as well
    if (0.0..usize_to_f32(n)).contains(&c) {
        Some(c as usize)
    } else {
        None
    }
}
