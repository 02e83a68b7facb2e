//! Run configuration: every hyperparameter the trainer, classifiers,
//! evaluator, and model codec consult, bundled into one immutable value.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::Grid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of ticks 360° of longitude is divided into; latitude gets
    /// half as many. Must be even and positive.
    pub longranularity: usize,
    /// Smooth point sets with a Gaussian kernel; when false, plain per-cell
    /// counts are used instead.
    pub kde: bool,
    /// Store per-feature sparse density matrices in the model. Disabling
    /// shrinks the model but forces recomputation at classification time.
    pub store_matrices: bool,
    /// Standard deviation of the KDE kernel, in degrees.
    pub sigma: f64,
    /// A feature must be observed this many times to enter the model.
    pub threshold: usize,
    /// Per-cell feature pseudocount applied at classification time.
    pub word_prior: f64,
    /// Additive pseudocount for the document-origin prior, applied before
    /// normalization.
    pub tweet_prior: f64,
    /// Score unseen features with a zero density instead of skipping them.
    pub unk: bool,
    /// Use the complement Naive Bayes form.
    pub complement_nb: bool,
    /// Classify with KL divergence instead of Naive Bayes.
    pub kullback_leibler: bool,
    /// Report the winning cell's centroid instead of its midpoint.
    pub use_centroid: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            longranularity: 360,
            kde: true,
            store_matrices: true,
            sigma: 3.0,
            threshold: 1,
            word_prior: 0.01,
            tweet_prior: 1.0,
            unk: false,
            complement_nb: false,
            kullback_leibler: false,
            use_centroid: false,
        }
    }
}

impl Config {
    /// The grid this configuration describes; fails when the configured
    /// granularity is odd or zero.
    pub fn grid(&self) -> Result<Grid> {
        Grid::new(self.longranularity)
    }

    /// Copy of this configuration with the granularity a stored model
    /// declares; the model header wins over whatever the caller set.
    pub fn with_longranularity(&self, longranularity: usize) -> Self {
        Self { longranularity, ..self.clone() }
    }
}
