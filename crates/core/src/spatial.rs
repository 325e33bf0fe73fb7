//! Uniform-cell spatial hash for bounded neighbour queries.
//!
//! Rebuilt from scratch every frame; there is no incremental maintenance.

use glam::DVec2;
use std::collections::HashMap;

/// Maps `floor(position / cell_size)` to the indices of the points inside that cell.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f64,
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl SpatialHash {
    /// A non-positive or non-finite `cell_size` is replaced with 1.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Cell key for a position. Coordinates are clamped into `i32` range.
    pub fn key(&self, p: DVec2) -> (i32, i32) {
        let axis = |v: f64| {
            let c = (v / self.cell_size).floor();
            if c.is_nan() {
                0
            } else {
                c.clamp(i32::MIN as f64, i32::MAX as f64) as i32
            }
        };
        (axis(p.x), axis(p.y))
    }

    /// Clears every cell and re-inserts all positions. Cell vectors are reused.
    pub fn rebuild<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = DVec2>,
    {
        self.cells.values_mut().for_each(Vec::clear);
        for (i, p) in positions.into_iter().enumerate() {
            let key = self.key(p);
            self.cells.entry(key).or_default().push(i);
        }
    }

    /// Calls `f` with every index in the 3x3 block of cells around `p`.
    ///
    /// With `cell_size >= radius` this covers every point within `radius`.
    pub fn for_each_neighbor<F: FnMut(usize)>(&self, p: DVec2, mut f: F) {
        let (cx, cy) = self.key(p);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let key = (cx.saturating_add(dx), cy.saturating_add(dy));
                if let Some(bucket) = self.cells.get(&key) {
                    bucket.iter().copied().for_each(&mut f);
                }
            }
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(points: &[DVec2], p: DVec2, radius: f64) -> Vec<usize> {
        points
            .iter()
            .enumerate()
            .filter(|(_, q)| q.distance(p) < radius)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn key_floors_negative_coordinates() {
        let hash = SpatialHash::new(16.0);
        assert_eq!(hash.key(DVec2::new(-0.5, 15.9)), (-1, 0));
        assert_eq!(hash.key(DVec2::new(32.0, -16.0)), (2, -1));
    }

    #[test]
    fn bad_cell_size_falls_back_to_one() {
        assert_eq!(SpatialHash::new(0.0).cell_size(), 1.0);
        assert_eq!(SpatialHash::new(f64::NAN).cell_size(), 1.0);
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let mut hash = SpatialHash::new(10.0);
        hash.rebuild([DVec2::new(1.0, 1.0), DVec2::new(50.0, 50.0)]);
        assert_eq!(hash.len(), 2);
        hash.rebuild([DVec2::new(5.0, 5.0)]);
        assert_eq!(hash.len(), 1);
        let mut seen = Vec::new();
        hash.for_each_neighbor(DVec2::new(50.0, 50.0), |i| seen.push(i));
        assert!(seen.is_empty(), "stale entry survived rebuild: {seen:?}");
    }

    #[test]
    fn neighbours_cover_everything_within_cell_radius() {
        let points: Vec<DVec2> = (0..200)
            .map(|i| {
                let t = i as f64;
                DVec2::new((t * 37.3) % 300.0, (t * 91.7) % 200.0)
            })
            .collect();
        let mut hash = SpatialHash::new(16.0);
        hash.rebuild(points.iter().copied());
        for query in &points {
            let mut found = Vec::new();
            hash.for_each_neighbor(*query, |i| found.push(i));
            for i in brute_force(&points, *query, 16.0) {
                assert!(found.contains(&i), "missed neighbour {i} of {query:?}");
            }
        }
    }

    #[test]
    fn empty_hash_visits_nothing() {
        let hash = SpatialHash::new(8.0);
        let mut count = 0;
        hash.for_each_neighbor(DVec2::ZERO, |_| count += 1);
        assert_eq!(count, 0);
        assert!(hash.is_empty());
    }

    #[test]
    fn extreme_positions_clamp_keys() {
        let hash = SpatialHash::new(1.0);
        assert_eq!(hash.key(DVec2::new(1e300, -1e300)), (i32::MAX, i32::MIN));
        let mut count = 0;
        hash.for_each_neighbor(DVec2::new(1e300, 1e300), |_| count += 1);
        assert_eq!(count, 0);
    }
}
