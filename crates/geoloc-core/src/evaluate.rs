//! Evaluation: classify a labeled set and report great-circle error.

use crate::classify::{classify_cell, estimate_coords};
use crate::corpus::Record;
use crate::grid::haversine_km;
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub records: usize,
    pub mean_km: f64,
    pub median_km: f64,
}

/// Classify every record, measure the distance from the estimate to the
/// truth, and report mean and median. A running mean is printed every 100
/// records, then a final summary block; both on stdout.
pub fn evaluate(model: &Model, records: &[Record]) -> EvalSummary {
    let mut distances = Vec::with_capacity(records.len());
    let mut total = 0.0;
    for (i, record) in records.iter().enumerate() {
        let cell = classify_cell(model, &record.tokens, None);
        let (lat_estimate, lon_estimate) = estimate_coords(model, cell);
        let distance = haversine_km(record.lat, record.lon, lat_estimate, lon_estimate);
        distances.push(distance);
        total += distance;
        let n = i + 1;
        if n % 100 == 0 {
            println!(
                "{n}: {lat_estimate},{lon_estimate}\t{distance}\t{cell}\trunning mean: {}",
                total / n as f64
            );
        }
    }

    let mean = if distances.is_empty() { 0.0 } else { total / distances.len() as f64 };
    let median = median(&mut distances);
    println!("--------------------------");
    println!("DATA POINTS: {}", records.len());
    println!("MEAN DISTANCE: {mean}");
    println!("MEDIAN DISTANCE: {median}");
    println!("--------------------------");

    EvalSummary { records: records.len(), mean_km: mean, median_km: median }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2] + values[n / 2 - 1]) / 2.0
    } else {
        values[n / 2]
    }
}
