//! Bivariate Gaussian kernel and the two deposit modes that turn point sets
//! into per-cell mass matrices.
//!
//! The KDE window is clipped at the grid edges without wrap-around, so points
//! near the ±180° seam lose part of their mass. Known limitation, kept as is.

use crate::grid::{GeoPoint, Grid};
use crate::matrix::DenseMatrix;

/// Kernel tails below this density are not deposited. Changing it changes
/// model mass and predictions.
const DENSITY_CUTOFF: f64 = 0.001;

/// Density of the bivariate normal at (x1, x2) with means (mu1, mu2),
/// standard deviations (sigma1, sigma2), and correlation rho in (-1, 1).
pub fn bivariate_gaussian_pdf(
    x1: f64,
    x2: f64,
    sigma1: f64,
    sigma2: f64,
    rho: f64,
    mu1: f64,
    mu2: f64,
) -> f64 {
    let z = (x1 - mu1) * (x1 - mu1) / (sigma1 * sigma1)
        - 2.0 * rho * (x1 - mu1) * (x2 - mu2) / (sigma1 * sigma2)
        + (x2 - mu2) * (x2 - mu2) / (sigma2 * sigma2);
    1.0 / (std::f64::consts::TAU * sigma1 * sigma2 * (1.0 - rho * rho).sqrt())
        * (-(z / (2.0 * (1.0 - rho * rho)))).exp()
}

/// Number of cell ticks around a point worth depositing into: step outward
/// from the kernel center until the density falls below the cutoff. The
/// result depends only on the grid and kernel shape, not on the point count.
pub fn kde_radius_ticks(grid: &Grid, sigma1: f64, sigma2: f64, rho: f64) -> usize {
    let mut ticks = 0;
    loop {
        let density =
            bivariate_gaussian_pdf(ticks as f64 * grid.delta(), 0.0, sigma1, sigma2, rho, 0.0, 0.0);
        if density < DENSITY_CUTOFF {
            break;
        }
        ticks += 1;
    }
    ticks
}

/// Deposit kernel mass into `matrix` for each point: every cell in the
/// square window around the point's cell, clipped to the grid, receives the
/// PDF evaluated at that cell's midpoint. No normalization.
pub fn deposit_kde(
    matrix: &mut DenseMatrix,
    grid: &Grid,
    points: &[GeoPoint],
    sigma1: f64,
    sigma2: f64,
    rho: f64,
) {
    let radius = kde_radius_ticks(grid, sigma1, sigma2, rho);
    for p in points {
        let x0 = grid.x_of_lon(p.lon as f64);
        let y0 = grid.y_of_lat(p.lat as f64);
        let min_x = x0.saturating_sub(radius);
        let max_x = (x0 + radius).min(grid.lon_ticks());
        let min_y = y0.saturating_sub(radius);
        let max_y = (y0 + radius).min(grid.lat_ticks());
        for y in min_y..max_y {
            let lat = grid.mid_lat(y);
            for x in min_x..max_x {
                let lon = grid.mid_lon(x);
                // Density is measured at the center of the cell.
                let density =
                    bivariate_gaussian_pdf(lon, lat, sigma1, sigma2, rho, p.lon as f64, p.lat as f64);
                matrix.data[x + y * grid.lon_ticks()] += density;
            }
        }
    }
}

/// Plain-count deposit: add 1 to the cell containing each point.
pub fn deposit_counts(matrix: &mut DenseMatrix, grid: &Grid, points: &[GeoPoint]) {
    for p in points {
        let cell = grid.cell_of(p.lat as f64, p.lon as f64);
        matrix.data[cell] += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pdf_peak_at_mean() {
        let peak = bivariate_gaussian_pdf(0.0, 0.0, 3.0, 3.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(peak, 1.0 / (std::f64::consts::TAU * 9.0), epsilon = 1e-12);
        let off = bivariate_gaussian_pdf(1.0, 1.0, 3.0, 3.0, 0.0, 0.0, 0.0);
        assert!(off < peak);
    }

    #[test]
    fn pdf_symmetric_about_mean() {
        let a = bivariate_gaussian_pdf(2.0, -1.0, 3.0, 3.0, 0.0, 0.0, 0.0);
        let b = bivariate_gaussian_pdf(-2.0, 1.0, 3.0, 3.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(a, b, epsilon = 1e-15);
    }

    #[test]
    fn radius_stops_at_cutoff() {
        let grid = Grid::new(360).unwrap();
        let r = kde_radius_ticks(&grid, 3.0, 3.0, 0.0);
        assert!(r > 0, "a 3° kernel must cover more than its own cell");
        // The tick just inside the radius is above the cutoff, the one at
        // the radius is below it.
        let inside =
            bivariate_gaussian_pdf((r - 1) as f64 * grid.delta(), 0.0, 3.0, 3.0, 0.0, 0.0, 0.0);
        let outside = bivariate_gaussian_pdf(r as f64 * grid.delta(), 0.0, 3.0, 3.0, 0.0, 0.0, 0.0);
        assert!(inside >= 0.001, "tick {} density {inside} below cutoff", r - 1);
        assert!(outside < 0.001, "tick {r} density {outside} above cutoff");
    }

    #[test]
    fn wide_kernel_deposits_nothing() {
        // With sigma this large the density is below the cutoff even at the
        // kernel center, so the window is empty.
        let grid = Grid::new(360).unwrap();
        assert_eq!(kde_radius_ticks(&grid, 100.0, 100.0, 0.0), 0);
        let mut m = DenseMatrix::zeros(&grid);
        deposit_kde(&mut m, &grid, &[GeoPoint::new(0.0, 0.0)], 100.0, 100.0, 0.0);
        assert_eq!(m.sum(), 0.0);
    }

    #[test]
    fn single_point_density_at_own_cell() {
        let grid = Grid::new(360).unwrap();
        let mut m = DenseMatrix::zeros(&grid);
        deposit_kde(&mut m, &grid, &[GeoPoint::new(0.0, 0.0)], 3.0, 3.0, 0.0);
        let expected =
            bivariate_gaussian_pdf(grid.mid_lon(180), grid.mid_lat(90), 3.0, 3.0, 0.0, 0.0, 0.0);
        assert!(
            (m.get(180, 90) - expected).abs() < 1e-6,
            "cell (180, 90) holds {}, expected {expected}",
            m.get(180, 90)
        );
    }

    #[test]
    fn window_clips_at_grid_edge() {
        let grid = Grid::new(72).unwrap();
        let mut m = DenseMatrix::zeros(&grid);
        // Point in the southwest corner cell; the window must not index
        // outside the grid and the deposited mass is smaller than for an
        // interior point with the same kernel.
        deposit_kde(&mut m, &grid, &[GeoPoint::new(-89.9, -179.9)], 3.0, 3.0, 0.0);
        let corner_mass = m.sum();
        m.fill(0.0);
        deposit_kde(&mut m, &grid, &[GeoPoint::new(0.0, 0.0)], 3.0, 3.0, 0.0);
        assert!(corner_mass > 0.0);
        assert!(corner_mass < m.sum(), "clipped corner mass should be smaller");
    }

    #[test]
    fn counts_mode_increments_cells() {
        let grid = Grid::new(72).unwrap();
        let mut m = DenseMatrix::zeros(&grid);
        let pts = [
            GeoPoint::new(40.0, -74.0),
            GeoPoint::new(40.0, -74.0),
            GeoPoint::new(34.0, -118.0),
        ];
        deposit_counts(&mut m, &grid, &pts);
        assert_eq!(m.data[grid.cell_of(40.0, -74.0)], 2.0);
        assert_eq!(m.data[grid.cell_of(34.0, -118.0)], 1.0);
        assert_eq!(m.sum(), 3.0);
    }
}
