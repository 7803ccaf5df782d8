use crate::core_types::vec3::Vec3;
use rustc_hash::FxHashMap;

/// Integer cell coordinate in the hash grid
type CellKey = (i32, i32, i32);

/// Uniform spatial hash for fast neighbor queries
///
/// Space is partitioned into cubic cells of `cell_size` (the interaction
/// radius). The grid is rebuilt wholesale once per frame and only read while
/// particles query it, so query results never depend on processing order.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    cells: FxHashMap<CellKey, Vec<(u32, Vec3)>>,
    cell_size: f32,
    len: usize,
}

impl SpatialHashGrid {
    /// Create an empty grid with the given cell size (metres)
    pub fn new(cell_size: f32) -> Self {
        SpatialHashGrid {
            cells: FxHashMap::default(),
            cell_size: cell_size.max(f32::EPSILON),
            len: 0,
        }
    }

    #[inline]
    fn cell_of(&self, pos: Vec3) -> CellKey {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    /// Insert a single particle
    pub fn insert(&mut self, id: u32, position: Vec3) {
        let key = self.cell_of(position);
        self.cells.entry(key).or_default().push((id, position));
        self.len += 1;
    }

    /// Clear and rebuild the entire index from `(id, position)` pairs
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (u32, Vec3)>,
    {
        // Keep bucket allocations around between frames
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.len = 0;

        for (id, position) in entries {
            self.insert(id, position);
        }

        self.cells.retain(|_, bucket| !bucket.is_empty());
    }

    /// All particle ids within `radius` of `position`, in ascending id order.
    ///
    /// Candidates come from every cell the query sphere can touch and are then
    /// filtered by exact distance, so the result equals a brute-force scan.
    pub fn neighbors(&self, position: Vec3, radius: f32) -> Vec<u32> {
        self.neighbor_entries(position, radius)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Like [`Self::neighbors`] but also returns each neighbor's indexed position
    pub fn neighbor_entries(&self, position: Vec3, radius: f32) -> Vec<(u32, Vec3)> {
        if radius < 0.0 || self.len == 0 {
            return Vec::new();
        }

        let radius_sq = radius * radius;
        let within = |(_, p): &&(u32, Vec3)| (p - position).norm_squared() <= radius_sq;

        // Cell coordinates saturate at the i32 range, which keeps far-away
        // particles in edge cells but never pulls a true neighbor out of reach
        let reach = (radius / self.cell_size).ceil() as i64;
        let span = reach.saturating_mul(2).saturating_add(1).saturating_pow(3);
        let mut results = Vec::new();
        if usize::try_from(span)
            .ok()
            .is_none_or(|span| span > self.cells.len())
        {
            // Fewer occupied cells than lattice cells to probe
            for bucket in self.cells.values() {
                results.extend(bucket.iter().filter(within));
            }
        } else {
            let (cx, cy, cz) = self.cell_of(position);
            let offset = |c: i32, d: i64| i32::try_from(i64::from(c) + d).ok();
            for dx in -reach..=reach {
                for dy in -reach..=reach {
                    for dz in -reach..=reach {
                        let (Some(x), Some(y), Some(z)) =
                            (offset(cx, dx), offset(cy, dy), offset(cz, dz))
                        else {
                            continue;
                        };
                        if let Some(bucket) = self.cells.get(&(x, y, z)) {
                            results.extend(bucket.iter().filter(within));
                        }
                    }
                }
            }
        }

        results.sort_unstable_by_key(|(id, _)| *id);
        results
    }

    /// Cell edge length in metres
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of occupied cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of indexed particles
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn brute_force(entries: &[(u32, Vec3)], pos: Vec3, radius: f32) -> Vec<u32> {
        let mut ids: Vec<u32> = entries
            .iter()
            .filter(|(_, p)| (p - pos).norm_squared() <= radius * radius)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_insert_query() {
        let mut grid = SpatialHashGrid::new(10.0);
        grid.insert(1, Vec3::new(0.0, 0.0, 0.0));
        grid.insert(2, Vec3::new(5.0, 5.0, 5.0));
        grid.insert(3, Vec3::new(50.0, 50.0, 50.0));

        let nearby = grid.neighbors(Vec3::zeros(), 15.0);
        assert_eq!(nearby, vec![1, 2]);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let entries: Vec<(u32, Vec3)> = (0..100)
            .map(|id| {
                let p = Vec3::new(
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                    rng.random_range(-10.0..10.0),
                );
                (id, p)
            })
            .collect();

        let mut grid = SpatialHashGrid::new(2.0);
        grid.rebuild(entries.iter().copied());

        for (_, p) in &entries {
            assert_eq!(grid.neighbors(*p, 2.0), brute_force(&entries, *p, 2.0));
        }
    }

    #[test]
    fn test_radius_larger_than_cell() {
        let mut grid = SpatialHashGrid::new(0.5);
        grid.insert(0, Vec3::new(0.0, 0.0, 0.0));
        grid.insert(1, Vec3::new(1.9, 0.0, 0.0));
        grid.insert(2, Vec3::new(2.1, 0.0, 0.0));
        assert_eq!(grid.neighbors(Vec3::zeros(), 2.0), vec![0, 1]);
    }

    #[test]
    fn test_rebuild_clears_previous_frame() {
        let mut grid = SpatialHashGrid::new(1.0);
        grid.rebuild([(0, Vec3::zeros()), (1, Vec3::new(0.5, 0.0, 0.0))]);
        grid.rebuild([(5, Vec3::new(20.0, 0.0, 0.0))]);
        assert!(grid.neighbors(Vec3::zeros(), 1.0).is_empty());
        assert_eq!(grid.neighbors(Vec3::new(20.0, 0.0, 0.0), 0.1), vec![5]);
        assert_eq!(grid.cell_count(), 1);
    }

    #[test]
    fn test_far_away_positions_do_not_overflow() {
        let mut grid = SpatialHashGrid::new(0.75);
        grid.insert(0, Vec3::new(1e10, 0.0, 0.0));
        grid.insert(1, Vec3::new(-1e12, 3e11, 0.0));
        grid.insert(2, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(grid.neighbors(Vec3::new(1e10, 0.0, 0.0), 0.75), vec![0]);
        assert_eq!(grid.neighbors(Vec3::new(-1e12, 3e11, 0.0), 0.75), vec![1]);
        assert!(grid.neighbors(Vec3::new(5e9, 0.0, 0.0), 0.75).is_empty());
    }

    #[test]
    fn test_huge_radius_scans_all_cells() {
        let mut grid = SpatialHashGrid::new(0.5);
        grid.rebuild([(4, Vec3::new(3e6, 0.0, 0.0)), (2, Vec3::zeros())]);
        assert_eq!(grid.neighbors(Vec3::zeros(), 1e7), vec![2, 4]);
        assert_eq!(grid.neighbors(Vec3::zeros(), f32::MAX), vec![2, 4]);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialHashGrid::new(1.0);
        grid.insert(3, Vec3::new(-0.1, -0.1, -0.1));
        grid.insert(4, Vec3::new(0.1, 0.1, 0.1));
        assert_eq!(grid.neighbors(Vec3::zeros(), 0.5), vec![3, 4]);
    }
}
