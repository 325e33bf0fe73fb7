//! Fixed-spacing lattice of flow directions.
//!
//! A [`FlowField`] stores lattice points at exact multiples of the spacing,
//! plus one margin row and column, in row-major order. Each point carries a
//! flow angle that is recomputed from a noise source on a throttled cadence.
//! Lookups snap to the nearest point; they are never interpolated.

use noise::NoiseFn;
use std::f64::consts::TAU;

/// A lattice location in logical canvas coordinates. Never moves after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
}

/// Lattice of points and their derived flow angles.
#[derive(Debug, Clone)]
pub struct FlowField {
    spacing: f64,
    cols: usize,
    rows: usize,
    points: Vec<GridPoint>,
    angles: Vec<f64>,
    generation: u64,
}

impl FlowField {
    /// Builds the lattice for a `width` x `height` canvas.
    ///
    /// `cols = ceil(width / spacing) + 1`, `rows = ceil(height / spacing) + 1`.
    /// A zero-sized canvas or a non-positive spacing yields an empty lattice.
    pub fn new(width: f64, height: f64, spacing: f64) -> Self {
        let mut field = Self {
            spacing,
            cols: 0,
            rows: 0,
            points: Vec::new(),
            angles: Vec::new(),
            generation: 0,
        };
        field.rebuild(width, height);
        field
    }

    /// Replaces every lattice point for new canvas dimensions.
    ///
    /// Angles reset to 0 until the next [`recompute`](Self::recompute).
    pub fn rebuild(&mut self, width: f64, height: f64) {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        let (cols, rows) = if usable(width) && usable(height) && usable(self.spacing) {
            (
                (width / self.spacing).ceil() as usize + 1,
                (height / self.spacing).ceil() as usize + 1,
            )
        } else {
            (0, 0)
        };
        let spacing = self.spacing;
        self.cols = cols;
        self.rows = rows;
        self.points = (0..rows)
            .flat_map(|gy| {
                (0..cols).map(move |gx| GridPoint {
                    x: gx as f64 * spacing,
                    y: gy as f64 * spacing,
                })
            })
            .collect();
        self.angles = vec![0.0; self.points.len()];
        self.generation += 1;
    }

    /// Re-evaluates every angle: `noise(x * scale, y * scale, time) * 2π`.
    pub fn recompute<N: NoiseFn<f64, 3> + ?Sized>(&mut self, noise: &N, scale: f64, time: f64) {
        for (angle, p) in self.angles.iter_mut().zip(&self.points) {
            *angle = noise.get([p.x * scale, p.y * scale, time]) * TAU;
        }
    }

    /// Flow angle of the lattice point nearest to `(x, y)`.
    ///
    /// Coordinates are clamped into the lattice, so any position is accepted.
    /// Returns 0 for an empty lattice.
    pub fn angle_at(&self, x: f64, y: f64) -> f64 {
        self.clamped_index(x, y)
            .and_then(|i| self.angles.get(i).copied())
            .unwrap_or(0.0)
    }

    /// Nearest lattice point to `(x, y)` without clamping.
    ///
    /// Returns `None` when the rounded lattice coordinate lies outside the grid.
    pub fn nearest_point(&self, x: f64, y: f64) -> Option<(usize, GridPoint)> {
        if self.points.is_empty() || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let gx = (x / self.spacing).round();
        let gy = (y / self.spacing).round();
        if gx < 0.0 || gy < 0.0 || gx >= self.cols as f64 || gy >= self.rows as f64 {
            return None;
        }
        let idx = gy as usize * self.cols + gx as usize;
        self.points.get(idx).map(|p| (idx, *p))
    }

    /// Nearest lattice point position with clamping, used as a spring anchor.
    pub fn snap(&self, x: f64, y: f64) -> Option<GridPoint> {
        self.clamped_index(x, y).and_then(|i| self.points.get(i).copied())
    }

    fn clamped_index(&self, x: f64, y: f64) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }
        let clamp_axis = |v: f64, n: usize| {
            let g = (v / self.spacing).round();
            if g.is_nan() {
                0
            } else {
                g.clamp(0.0, (n - 1) as f64) as usize
            }
        };
        Some(clamp_axis(y, self.rows) * self.cols + clamp_axis(x, self.cols))
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// Angle at a point index; `None` when not populated (e.g. mid-rebuild).
    pub fn angle(&self, index: usize) -> Option<f64> {
        self.angles.get(index).copied()
    }

    /// Incremented on every rebuild. Lets callers detect a replaced lattice.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Iterates `(point, angle)` pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (GridPoint, f64)> + '_ {
        self.points.iter().copied().zip(self.angles.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::PermutationNoise;

    #[test]
    fn lattice_800x600_spacing_40_has_margin_row_and_col() {
        let field = FlowField::new(800.0, 600.0, 40.0);
        assert_eq!(field.cols(), 21);
        assert_eq!(field.rows(), 16);
        assert_eq!(field.len(), 21 * 16);
        for p in field.points() {
            assert_eq!(p.x % 40.0, 0.0);
            assert_eq!(p.y % 40.0, 0.0);
            assert!(p.x <= 800.0 && p.y <= 600.0);
        }
        assert_eq!(field.points().last(), Some(&GridPoint { x: 800.0, y: 600.0 }));
    }

    #[test]
    fn non_multiple_sizes_round_up() {
        let field = FlowField::new(810.0, 590.0, 40.0);
        assert_eq!(field.cols(), 22);
        assert_eq!(field.rows(), 16);
    }

    #[test]
    fn zero_size_or_bad_spacing_is_empty() {
        assert!(FlowField::new(0.0, 600.0, 40.0).is_empty());
        assert!(FlowField::new(800.0, 0.0, 40.0).is_empty());
        assert!(FlowField::new(800.0, 600.0, 0.0).is_empty());
        assert!(FlowField::new(800.0, 600.0, f64::NAN).is_empty());
    }

    #[test]
    fn empty_lattice_queries_are_vacuous() {
        let mut field = FlowField::new(0.0, 0.0, 40.0);
        field.recompute(&PermutationNoise::from_seed(1), 0.01, 0.0);
        assert_eq!(field.angle_at(10.0, 10.0), 0.0);
        assert!(field.nearest_point(0.0, 0.0).is_none());
        assert!(field.snap(0.0, 0.0).is_none());
    }

    #[test]
    fn recompute_follows_noise_formula() {
        let noise = PermutationNoise::from_seed(8);
        let mut field = FlowField::new(200.0, 120.0, 28.0);
        field.recompute(&noise, 0.009, 0.3);
        for (p, angle) in field.iter() {
            let expected = noise.noise3(p.x * 0.009, p.y * 0.009, 0.3) * TAU;
            assert_eq!(angle, expected);
        }
    }

    #[test]
    fn angle_at_snaps_to_nearest_point() {
        let noise = PermutationNoise::from_seed(8);
        let mut field = FlowField::new(400.0, 300.0, 40.0);
        field.recompute(&noise, 0.009, 0.5);
        let idx = 2 * field.cols() + 3;
        let expected = field.angles()[idx];
        assert_eq!(field.angle_at(121.0, 79.0), expected);
        assert_eq!(field.angle_at(139.0, 99.0), expected);
    }

    #[test]
    fn angle_at_clamps_out_of_range_coordinates() {
        let noise = PermutationNoise::from_seed(8);
        let mut field = FlowField::new(400.0, 300.0, 40.0);
        field.recompute(&noise, 0.009, 0.5);
        assert_eq!(field.angle_at(-500.0, -500.0), field.angles()[0]);
        let last = *field.angles().last().unwrap();
        assert_eq!(field.angle_at(1e9, 1e9), last);
        assert_eq!(field.angle_at(f64::NAN, f64::NAN), field.angles()[0]);
    }

    #[test]
    fn nearest_point_rejects_outside_and_finds_inside() {
        let field = FlowField::new(400.0, 300.0, 40.0);
        assert!(field.nearest_point(-30.0, 10.0).is_none());
        assert!(field.nearest_point(10.0, 500.0).is_none());
        let (idx, p) = field.nearest_point(205.0, 195.0).unwrap();
        assert_eq!(p, GridPoint { x: 200.0, y: 200.0 });
        assert_eq!(field.points()[idx], p);
    }

    #[test]
    fn rebuild_replaces_points_and_bumps_generation() {
        let mut field = FlowField::new(800.0, 600.0, 40.0);
        let before = field.generation();
        field.rebuild(400.0, 300.0);
        assert_eq!(field.generation(), before + 1);
        assert_eq!(field.len(), 11 * 9);
        assert!(field.angles().iter().all(|&a| a == 0.0));
        let spacing = field.spacing();
        assert!(field
            .points()
            .iter()
            .all(|p| p.x <= 400.0 + spacing && p.y <= 300.0 + spacing));
        // The margin row sits one step past the last full row.
        assert_eq!(field.points().last(), Some(&GridPoint { x: 400.0, y: 320.0 }));
    }

    #[test]
    fn angle_index_out_of_range_is_none() {
        let field = FlowField::new(40.0, 40.0, 40.0);
        assert!(field.angle(field.len()).is_none());
        assert!(field.angle(0).is_some());
    }
}
