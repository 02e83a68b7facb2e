//! The feature store: everything the model knows about each feature, keyed
//! by name and addressed by insertion-order index. Indices are stable for
//! the life of the store and double as the ordinals written to the model
//! file.

use std::collections::HashMap;

use crate::config::Config;
use crate::error::{GeolocError, Result};
use crate::grid::{GeoPoint, Grid};
use crate::kernel::{deposit_counts, deposit_kde};
use crate::matrix::DenseMatrix;
use crate::sparse::SparseMatrix;

#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub name: String,
    /// Observation coordinates. Empty when the record was loaded from a
    /// model without point retention.
    pub points: Vec<GeoPoint>,
    /// Number of observed points.
    pub count: usize,
    pub weight: f64,
    /// Sparse density, present iff the model stores matrices.
    pub density: Option<SparseMatrix>,
}

#[derive(Debug, Default)]
pub struct FeatureStore {
    index: HashMap<String, usize>,
    records: Vec<FeatureRecord>,
    total_points: u64,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of observation points across all records.
    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn record(&self, index: usize) -> &FeatureRecord {
        &self.records[index]
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    /// Add an observation of `name` at (lat, lon), creating the record on
    /// first sight. A (0, 0) coordinate pair means "no point": the record
    /// is created or touched but nothing is appended, which is how model
    /// loading registers a feature header before its point rows arrive.
    pub fn add(&mut self, name: &str, lat: f64, lon: f64) -> usize {
        let index = match self.index.get(name) {
            Some(&i) => i,
            None => {
                let i = self.records.len();
                self.index.insert(name.to_owned(), i);
                self.records.push(FeatureRecord {
                    name: name.to_owned(),
                    points: Vec::new(),
                    count: 0,
                    weight: 1.0,
                    density: None,
                });
                i
            }
        };
        if lat != 0.0 || lon != 0.0 {
            self.records[index].points.push(GeoPoint::new(lat as f32, lon as f32));
            self.records[index].count += 1;
            self.total_points += 1;
        }
        index
    }

    pub fn set_weight(&mut self, name: &str, weight: f64) -> Result<()> {
        let index = self.require(name)?;
        self.records[index].weight = weight;
        Ok(())
    }

    pub fn weight(&self, name: &str) -> Result<f64> {
        Ok(self.records[self.require(name)?].weight)
    }

    pub fn count(&self, name: &str) -> Result<usize> {
        Ok(self.records[self.require(name)?].count)
    }

    /// Drop every record with fewer than `threshold` points and re-index
    /// the survivors in their original order. The trainer prunes with this
    /// so an in-memory model only knows the features its file retains.
    pub fn retain_min_points(&mut self, threshold: usize) {
        self.records.retain(|r| r.points.len() >= threshold);
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        self.total_points = self.records.iter().map(|r| r.points.len() as u64).sum();
    }

    pub fn attach_density(&mut self, name: &str, density: SparseMatrix) -> Result<()> {
        let index = self.require(name)?;
        self.records[index].density = Some(density);
        Ok(())
    }

    /// Dense density matrix for a feature: decoded from the stored sparse
    /// form when present, otherwise recomputed from the point list with the
    /// configured deposit mode. The returned matrix is a transient value
    /// owned by the caller.
    pub fn density(&self, index: usize, grid: &Grid, config: &Config) -> DenseMatrix {
        let record = &self.records[index];
        match &record.density {
            Some(sparse) => sparse.to_dense(grid),
            None => {
                let mut matrix = DenseMatrix::zeros(grid);
                if config.kde {
                    deposit_kde(&mut matrix, grid, &record.points, config.sigma, config.sigma, 0.0);
                } else {
                    deposit_counts(&mut matrix, grid, &record.points);
                }
                matrix
            }
        }
    }

    pub(crate) fn record_mut(&mut self, index: usize) -> &mut FeatureRecord {
        &mut self.records[index]
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.find(name).ok_or_else(|| GeolocError::FeatureNotFound(name.to_owned()))
    }
}
