//! Per-cell centroids of the training document positions, for more accurate
//! placement at classification time. Cells nobody trained in fall back to
//! their geometric midpoint.

use crate::grid::{GeoPoint, Grid};

#[derive(Debug, Clone)]
pub struct Centroids {
    /// One (lat, lon) per cell, in cell order.
    table: Vec<(f64, f64)>,
}

impl Centroids {
    /// One pass over the points summing lat, lon, and count per cell, then
    /// divide; untouched cells get their midpoint.
    pub fn from_points(grid: &Grid, points: &[GeoPoint]) -> Self {
        let cells = grid.cells();
        let mut lats = vec![0.0f64; cells];
        let mut lons = vec![0.0f64; cells];
        let mut counts = vec![0u32; cells];
        for p in points {
            let cell = grid.cell_of(p.lat as f64, p.lon as f64);
            lats[cell] += p.lat as f64;
            lons[cell] += p.lon as f64;
            counts[cell] += 1;
        }
        let table = (0..cells)
            .map(|cell| {
                if counts[cell] == 0 {
                    grid.cell_midpoint(cell)
                } else {
                    (lats[cell] / counts[cell] as f64, lons[cell] / counts[cell] as f64)
                }
            })
            .collect();
        Self { table }
    }

    pub fn from_table(table: Vec<(f64, f64)>) -> Self {
        Self { table }
    }

    /// Centroid of `cell` as (lat, lon).
    pub fn get(&self, cell: usize) -> (f64, f64) {
        self.table[cell]
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_points_in_one_cell() {
        let grid = Grid::new(72).unwrap();
        let pts = [
            GeoPoint::new(10.0, 20.0),
            GeoPoint::new(12.0, 22.0),
            GeoPoint::new(11.0, 21.0),
        ];
        // All three fall in the same 5° cell.
        let cell = grid.cell_of(10.0, 20.0);
        assert_eq!(cell, grid.cell_of(12.0, 22.0));
        let centroids = Centroids::from_points(&grid, &pts);
        let (lat, lon) = centroids.get(cell);
        assert_eq!(lat, 11.0);
        assert_eq!(lon, 21.0);
    }

    #[test]
    fn untouched_cell_falls_back_to_midpoint() {
        let grid = Grid::new(72).unwrap();
        let centroids = Centroids::from_points(&grid, &[]);
        assert_eq!(centroids.len(), grid.cells());
        for cell in [0, 100, grid.cells() - 1] {
            assert_eq!(centroids.get(cell), grid.cell_midpoint(cell));
        }
    }

    #[test]
    fn centroid_stays_inside_its_cell() {
        let grid = Grid::new(72).unwrap();
        let pts = [GeoPoint::new(10.2, 20.1), GeoPoint::new(14.9, 24.9)];
        let centroids = Centroids::from_points(&grid, &pts);
        let cell = grid.cell_of(10.2, 20.1);
        let (lat, lon) = centroids.get(cell);
        assert_eq!(grid.cell_of(lat, lon), cell, "centroid ({lat}, {lon}) left cell {cell}");
    }
}
