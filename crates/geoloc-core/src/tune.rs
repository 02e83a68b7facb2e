//! Single-pass weight perturbation against a dev set. Experimental: no
//! learning-rate schedule, no validation guard, no convergence criterion.

use std::path::Path;

use crate::classify::naive_bayes;
use crate::corpus::Record;
use crate::error::Result;
use crate::grid::haversine_km;
use crate::model::{write_model, Model};

/// For every misclassified dev record, nudge each of its stored features'
/// weights by ±0.01 toward whichever cell held more of that feature's
/// mass, then write the reweighted model to `output`. Classification is
/// always Naive Bayes here, whatever the configuration says.
pub fn tune(model: &mut Model, dev: &[Record], output: &Path) -> Result<()> {
    for record in dev {
        let guess_cell = naive_bayes(model, &record.tokens, None);
        let correct_cell = model.grid.cell_of(record.lat, record.lon);
        let (lat_estimate, lon_estimate) = model.grid.cell_midpoint(guess_cell);
        let error_distance = haversine_km(record.lat, record.lon, lat_estimate, lon_estimate);
        eprintln!(
            "GUESSED CELL: {guess_cell} CORRECT CELL: {correct_cell} ERROR: {error_distance:.6}"
        );
        if guess_cell == correct_cell {
            continue;
        }
        for token in &record.tokens {
            let Some(index) = model.features.find(token) else {
                continue;
            };
            let density = model.features.density(index, &model.grid, &model.config);
            let adjust = if density.data[correct_cell] > density.data[guess_cell] {
                0.01
            } else {
                -0.01
            };
            model.features.record_mut(index).weight += adjust;
        }
    }
    write_model(output, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centroids::Centroids;
    use crate::config::Config;
    use crate::features::FeatureStore;
    use crate::kernel::deposit_counts;
    use crate::matrix::DenseMatrix;

    fn toy_model() -> Model {
        let config = Config { longranularity: 24, kde: false, ..Config::default() };
        let grid = config.grid().unwrap();
        let mut features = FeatureStore::new();
        for _ in 0..3 {
            features.add("alpha", 40.0, -74.0);
        }
        for _ in 0..2 {
            features.add("beta", -34.0, 118.0);
        }
        let mut doc_points = Vec::new();
        let mut feature_mass = DenseMatrix::zeros(&grid);
        for record in features.records() {
            doc_points.extend_from_slice(&record.points);
            let mut density = DenseMatrix::zeros(&grid);
            deposit_counts(&mut density, &grid, &record.points);
            density.add_into(&mut feature_mass);
        }
        let mut prior = DenseMatrix::new(&grid, config.tweet_prior);
        deposit_counts(&mut prior, &grid, &doc_points);
        prior.normalize();
        let centroids = Centroids::from_points(&grid, &doc_points);
        let word_types = features.len();
        Model { config, grid, prior, feature_mass, centroids, features, word_types }
    }

    #[test]
    fn correct_guesses_leave_weights_alone() {
        let mut model = toy_model();
        let dev = vec![Record {
            lat: 40.0,
            lon: -74.0,
            tokens: vec!["alpha".to_owned()],
        }];
        let out = std::env::temp_dir()
            .join(format!("geoloc-tune-ok-{}.gz", std::process::id()));
        tune(&mut model, &dev, &out).unwrap();
        std::fs::remove_file(&out).ok();
        assert_eq!(model.features.weight("alpha").unwrap(), 1.0);
    }

    #[test]
    fn misclassified_record_nudges_weights() {
        let mut model = toy_model();
        // Truth far from alpha's mass: the guess (alpha's cell) is wrong,
        // and alpha has more mass in the guessed cell than the correct one,
        // so its weight is nudged down.
        let dev = vec![Record {
            lat: -34.0,
            lon: 118.0,
            tokens: vec!["alpha".to_owned()],
        }];
        let out = std::env::temp_dir()
            .join(format!("geoloc-tune-nudge-{}.gz", std::process::id()));
        tune(&mut model, &dev, &out).unwrap();
        std::fs::remove_file(&out).ok();
        assert!((model.features.weight("alpha").unwrap() - 0.99).abs() < 1e-12);
    }
}
