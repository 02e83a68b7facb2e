//! Feature-based geolocation: learn where short documents come from.
//!
//! Each feature (word) observed in a coordinate-tagged corpus gets a
//! density over a discretized Earth grid, estimated either by plain
//! per-cell counting or by a bivariate Gaussian KDE. Unlabeled documents
//! are then placed by Naive Bayes or KL-divergence scoring against those
//! densities, and labeled sets can be scored by great-circle error.
//!
//! The whole engine is single-threaded, CPU-bound loops over grid cells;
//! models are stored as gzip-compressed tagged text ([`model`]).

pub mod centroids;
pub mod classify;
pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod grid;
pub mod kernel;
pub mod matrix;
pub mod model;
pub mod sparse;
pub mod train;
pub mod tune;

pub use config::Config;
pub use error::{GeolocError, Result};
pub use grid::{haversine_km, GeoPoint, Grid};
pub use matrix::DenseMatrix;
pub use model::Model;
pub use sparse::SparseMatrix;
