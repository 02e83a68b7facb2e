//! Training: read a labeled corpus, build the document-origin prior, the
//! centroid table, and every retained feature's density, and stream the
//! model file while doing so. Only the prior, the running aggregate, and
//! one feature's density are ever dense in memory at the same time.

use std::collections::HashSet;
use std::path::Path;

use crate::centroids::Centroids;
use crate::config::Config;
use crate::corpus::{open_maybe_gzip, parse_record};
use crate::error::{GeolocError, Result};
use crate::features::FeatureStore;
use crate::grid::{GeoPoint, Grid};
use crate::kernel::{deposit_counts, deposit_kde};
use crate::matrix::DenseMatrix;
use crate::model::{Model, ModelWriter};
use crate::sparse::SparseMatrix;

/// Train a model from the corpus at `corpus_path` and write it to
/// `model_path`. Tokens in `stopwords` are dropped. Returns the trained
/// model, equivalent to what reloading the file would produce.
pub fn train(
    corpus_path: &Path,
    model_path: &Path,
    stopwords: Option<&HashSet<String>>,
    config: &Config,
) -> Result<Model> {
    let grid = config.grid()?;

    if config.kde {
        eprintln!("Using KDE");
    } else {
        eprintln!("Not using KDE");
    }
    eprintln!(
        "Reading document features/coordinates from training set: '{}'...",
        corpus_path.display()
    );

    let mut features = FeatureStore::new();
    let mut doc_points: Vec<GeoPoint> = Vec::new();
    let reader = open_maybe_gzip(corpus_path)?;
    for (i, line) in std::io::BufRead::lines(reader).enumerate() {
        let line = line.map_err(|e| GeolocError::io(corpus_path, e))?;
        let record = parse_record(&line, i + 1)?;
        for token in &record.tokens {
            if stopwords.is_some_and(|s| s.contains(token)) {
                continue;
            }
            features.add(token, record.lat, record.lon);
        }
        doc_points.push(GeoPoint::new(record.lat as f32, record.lon as f32));
    }

    let mut writer = ModelWriter::create(model_path, &grid)?;

    // The tweet prior is baked into the matrix before deposit because the
    // whole thing is normalized afterwards.
    eprintln!("Calculating p(c) matrix...");
    let mut prior = DenseMatrix::new(&grid, config.tweet_prior);
    deposit(&mut prior, &grid, &doc_points, config);
    prior.normalize();
    eprintln!("Writing p(c) matrix");
    writer.write_prior(&SparseMatrix::from_dense(&prior))?;

    let centroids = Centroids::from_points(&grid, &doc_points);
    writer.write_centroids(&centroids)?;

    eprintln!("Number of word types in training set: {}", features.len());
    eprintln!("Calculating p(c)_w matrix...");
    let mut feature_mass = DenseMatrix::zeros(&grid);
    let mut density = DenseMatrix::zeros(&grid);
    for (index, record) in features.records().iter().enumerate() {
        if record.points.len() < config.threshold {
            continue;
        }
        if index % 5000 == 0 {
            eprintln!("Calculating p(c|w_i) for i={index}");
        }
        // The word prior is applied at classification time, never here.
        density.fill(0.0);
        deposit(&mut density, &grid, &record.points, config);
        let sparse = config.store_matrices.then(|| SparseMatrix::from_dense(&density));
        writer.write_feature(index, record, sparse.as_ref(), false)?;
        density.add_into(&mut feature_mass);
    }
    writer.finish_features()?;

    eprintln!("Writing (unnormalized) p(c)_w matrix...");
    writer.write_feature_mass(&SparseMatrix::from_dense(&feature_mass))?;
    writer.finish()?;
    eprintln!("Wrote model to '{}'.", model_path.display());

    // Sub-threshold features were never written; forget them so the
    // returned model knows exactly what a reload would materialize.
    features.retain_min_points(config.threshold);
    let word_types = features.len();

    Ok(Model {
        config: config.clone(),
        grid,
        prior,
        feature_mass,
        centroids,
        features,
        word_types,
    })
}

fn deposit(matrix: &mut DenseMatrix, grid: &Grid, points: &[GeoPoint], config: &Config) {
    if config.kde {
        deposit_kde(matrix, grid, points, config.sigma, config.sigma, 0.0);
    } else {
        deposit_counts(matrix, grid, points);
    }
}
