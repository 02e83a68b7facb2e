//! Sparse encoding of dense cell matrices as (x, y, value) triples.
//!
//! Only nonzero cells are stored, with the value narrowed to f32 to keep
//! models small. Encoding iterates x outer / y inner; the model file exposes
//! this order directly, so it must not change.

use crate::grid::Grid;
use crate::matrix::DenseMatrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseEntry {
    pub x: i16,
    pub y: i16,
    pub value: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseMatrix {
    pub entries: Vec<SparseEntry>,
}

impl SparseMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: i16, y: i16, value: f32) {
        self.entries.push(SparseEntry { x, y, value });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode a dense matrix, dropping exact zeros.
    pub fn from_dense(matrix: &DenseMatrix) -> Self {
        let mut entries = Vec::new();
        for x in 0..matrix.width {
            for y in 0..matrix.height {
                let v = matrix.get(x, y);
                if v != 0.0 {
                    entries.push(SparseEntry {
                        x: x as i16,
                        y: y as i16,
                        value: v as f32,
                    });
                }
            }
        }
        Self { entries }
    }

    /// Scatter the triples back into a zeroed dense matrix over `grid`.
    pub fn to_dense(&self, grid: &Grid) -> DenseMatrix {
        let mut matrix = DenseMatrix::zeros(grid);
        for e in &self.entries {
            matrix.set(e.x as usize, e.y as usize, e.value as f64);
        }
        matrix
    }
}
