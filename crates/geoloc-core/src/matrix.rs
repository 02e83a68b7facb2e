//! Dense per-cell matrices and the handful of operations the trainer and
//! classifiers need. A matrix holds one f64 per grid cell, row-major by y;
//! whether a value is a mass, a density, or a log-probability is up to the
//! caller.

use crate::grid::Grid;

#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    /// Row-major cell values, indexed by `x + y * width`.
    pub data: Vec<f64>,
    pub width: usize,
    pub height: usize,
}

impl DenseMatrix {
    /// Create a matrix over `grid` filled with the given value.
    pub fn new(grid: &Grid, fill: f64) -> Self {
        Self {
            data: vec![fill; grid.cells()],
            width: grid.lon_ticks(),
            height: grid.lat_ticks(),
        }
    }

    /// Create a zero-filled matrix over `grid`.
    pub fn zeros(grid: &Grid) -> Self {
        Self::new(grid, 0.0)
    }

    #[inline]
    pub fn cells(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[x + y * self.width]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, val: f64) {
        self.data[x + y * self.width] = val;
    }

    /// Overwrite every cell with `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Element-wise add this matrix into `target`.
    pub fn add_into(&self, target: &mut DenseMatrix) {
        for (t, v) in target.data.iter_mut().zip(&self.data) {
            *t += v;
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn min(&self) -> f64 {
        self.data.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.data.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Divide every cell by the total so the matrix sums to 1.
    pub fn normalize(&mut self) {
        let sum = self.sum();
        for v in &mut self.data {
            *v /= sum;
        }
    }

    /// Treat the cells as log-probabilities and produce the corresponding
    /// linear-space probability matrix: subtract the maximum, exponentiate,
    /// divide by the total.
    pub fn normalize_from_log(&mut self) {
        let max = self.max();
        let mut sum = 0.0;
        for v in &mut self.data {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in &mut self.data {
            *v /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(8).unwrap() // 8 x 4 cells
    }

    #[test]
    fn normalize_sums_to_one() {
        let mut m = DenseMatrix::new(&grid(), 1.0);
        m.set(3, 2, 10.0);
        m.normalize();
        assert!((m.sum() - 1.0).abs() < 1e-12, "sum {} after normalize", m.sum());
        assert!(m.min() > 0.0);
    }

    #[test]
    fn normalize_from_log_matches_direct() {
        let g = grid();
        let mut log = DenseMatrix::zeros(&g);
        for (i, v) in log.data.iter_mut().enumerate() {
            *v = (i as f64 / 7.0).ln();
        }
        let mut expected = DenseMatrix::zeros(&g);
        for (i, v) in expected.data.iter_mut().enumerate() {
            *v = i as f64 / 7.0;
        }
        expected.normalize();
        log.normalize_from_log();
        for (a, b) in log.data.iter().zip(&expected.data) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }
    }

    #[test]
    fn normalize_from_log_is_shift_invariant() {
        let g = grid();
        let mut m1 = DenseMatrix::zeros(&g);
        for (i, v) in m1.data.iter_mut().enumerate() {
            *v = -((i % 5) as f64) * 3.7;
        }
        let mut m2 = m1.clone();
        for v in &mut m2.data {
            *v += 123.456;
        }
        m1.normalize_from_log();
        m2.normalize_from_log();
        for (a, b) in m1.data.iter().zip(&m2.data) {
            assert!((a - b).abs() < 1e-12, "shifted log matrix diverged: {a} vs {b}");
        }
    }

    #[test]
    fn add_into_accumulates() {
        let g = grid();
        let mut acc = DenseMatrix::zeros(&g);
        let one = DenseMatrix::new(&g, 1.5);
        one.add_into(&mut acc);
        one.add_into(&mut acc);
        assert!(acc.data.iter().all(|&v| v == 3.0));
    }
}
