//! Query-time scoring: Naive Bayes (plain or complement) and KL divergence.
//!
//! Both scorers work in log space and only leave it when the caller asks
//! for a full posterior, which is then normalized with
//! [`DenseMatrix::normalize_from_log`] on the caller's side. Per-feature
//! density matrices are reconstituted one at a time and dropped as soon as
//! their contribution is folded in, so the per-query working set stays at a
//! couple of grid-sized buffers.

use std::collections::HashMap;

use crate::matrix::DenseMatrix;
use crate::model::Model;

/// Classify a token list with the scorer the model's configuration selects.
/// Returns the winning cell; when `result` is given, the full per-cell
/// log-score (NB) or negated divergence (KL) is written into it as well.
pub fn classify_cell(model: &Model, tokens: &[String], result: Option<&mut DenseMatrix>) -> usize {
    if model.config.kullback_leibler {
        kullback_leibler(model, tokens, result)
    } else {
        naive_bayes(model, tokens, result)
    }
}

/// Coordinates to report for a winning cell: the cell's centroid when the
/// configuration asks for it, else the cell midpoint. Returns (lat, lon).
pub fn estimate_coords(model: &Model, cell: usize) -> (f64, f64) {
    if model.config.use_centroid {
        model.centroids.get(cell)
    } else {
        model.grid.cell_midpoint(cell)
    }
}

/// Per-cell log-score
///
/// ```text
/// score(c) = log P_c[c] + Σ_f [ log(m_f[c] + prior) − log(M_w[c] + prior·(|W|+1+unk)) ]
/// ```
///
/// with the complement form subtracting mass-in-other-cells terms instead.
/// Unknown tokens are skipped, or admitted with a zero density in unk mode.
/// Cells holding the minimum prior are skipped entirely unless the caller
/// wants the full posterior; they are assumed unable to win.
pub fn naive_bayes(model: &Model, tokens: &[String], result: Option<&mut DenseMatrix>) -> usize {
    let cfg = &model.config;
    let cells = model.grid.cells();
    let want_posterior = result.is_some();
    let prior_min = model.prior.min();
    let denominator_prior =
        cfg.word_prior * (model.word_types as f64 + 1.0 + if cfg.unk { 1.0 } else { 0.0 });

    let mut total = model.prior.clone();
    for v in &mut total.data {
        *v = v.ln();
    }

    for token in tokens {
        let (density, weight, count) = match model.features.find(token) {
            Some(index) => {
                let record = model.features.record(index);
                (model.features.density(index, &model.grid, cfg), record.weight, record.count)
            }
            None if cfg.unk => (DenseMatrix::zeros(&model.grid), 1.0, 0),
            None => continue,
        };
        if weight == 0.0 {
            continue;
        }
        for c in 0..cells {
            if model.prior.data[c] == prior_min && !want_posterior {
                continue;
            }
            if !cfg.complement_nb {
                let mass = density.data[c] + cfg.word_prior;
                let cell_total = (model.feature_mass.data[c] + denominator_prior).ln();
                total.data[c] += mass.ln() - cell_total;
            } else {
                // Mass in the other cells, scored against the other cells' total.
                let mass = count as f64 - density.data[c] + cfg.word_prior;
                let cell_total =
                    (model.total_tokens() as f64 - model.feature_mass.data[c] + denominator_prior).ln();
                total.data[c] -= mass.ln() - cell_total;
            }
        }
    }

    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for c in 0..cells {
        if model.prior.data[c] == prior_min && !want_posterior {
            continue;
        }
        if total.data[c] > best_score {
            best_score = total.data[c];
            best = c;
        }
    }
    if let Some(buffer) = result {
        buffer.data.copy_from_slice(&total.data);
    }
    best
}

/// KL divergence of the query distribution from each cell's feature
/// distribution; the cell minimizing the total wins. The query distributes
/// its mass over its unique known features, each weighted by its occurrence
/// count.
pub fn kullback_leibler(model: &Model, tokens: &[String], result: Option<&mut DenseMatrix>) -> usize {
    let cfg = &model.config;
    let cells = model.grid.cells();
    let want_posterior = result.is_some();

    // Unique known features in first-seen order, with occurrence counts.
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<(usize, f64)> = Vec::new();
    for token in tokens {
        if let Some(index) = model.features.find(token) {
            match seen.get(token.as_str()) {
                Some(&slot) => unique[slot].1 += 1.0,
                None => {
                    seen.insert(token.as_str(), unique.len());
                    unique.push((index, 1.0));
                }
            }
        }
    }
    let known = unique.len() as f64;

    let prior_min = model.prior.min();
    let denominator_prior =
        cfg.word_prior * (model.word_types as f64 + 1.0 + if cfg.unk { 1.0 } else { 0.0 });

    let mut total = DenseMatrix::zeros(&model.grid);
    for &(index, n) in &unique {
        let density = model.features.density(index, &model.grid, cfg);
        for c in 0..cells {
            if model.prior.data[c] == prior_min && !want_posterior {
                continue;
            }
            let cell_total = model.feature_mass.data[c] + denominator_prior;
            total.data[c] +=
                n * ((cell_total * n) / (known * (density.data[c] + cfg.word_prior))).ln() / known;
        }
    }

    let mut best = 0;
    let mut best_score = f64::MAX;
    for c in 0..cells {
        if model.prior.data[c] == prior_min && !want_posterior {
            continue;
        }
        if total.data[c] < best_score {
            best_score = total.data[c];
            best = c;
        }
    }
    if let Some(buffer) = result {
        for (out, v) in buffer.data.iter_mut().zip(&total.data) {
            *out = -v;
        }
    }
    best
}
