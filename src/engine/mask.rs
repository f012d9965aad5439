use roaring::RoaringTreemap;

use crate::engine::models::Coordinate;

/// Land/water classification of a regular lat/lon raster. Land cells are
/// stored in a roaring bitmap keyed by `row * width + col`.
#[derive(Debug, Clone, PartialEq)]
pub struct LandRaster {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    pub mask: RoaringTreemap,
}

impl LandRaster {
    /// All-water raster over the given axes.
    pub fn new(latitudes: Vec<f64>, longitudes: Vec<f64>) -> Self {
        Self {
            latitudes,
            longitudes,
            mask: RoaringTreemap::new(),
        }
    }

    pub fn from_fn(
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        is_land: impl Fn(usize, usize) -> bool,
    ) -> Self {
        let mut raster = Self::new(latitudes, longitudes);
        for row in 0..raster.height() {
            for col in 0..raster.width() {
                if is_land(row, col) {
                    raster.set_land(row, col);
                }
            }
        }
        raster
    }

    pub fn height(&self) -> usize {
        self.latitudes.len()
    }

    pub fn width(&self) -> usize {
        self.longitudes.len()
    }

    fn key(&self, row: usize, col: usize) -> u64 {
        (row * self.width() + col) as u64
    }

    pub fn set_land(&mut self, row: usize, col: usize) {
        let key = self.key(row, col);
        self.mask.insert(key);
    }

    /// Marks a rectangular block of cells (inclusive) as land
    pub fn add_land_box(&mut self, rows: (usize, usize), cols: (usize, usize)) {
        for row in rows.0..=rows.1.min(self.height().saturating_sub(1)) {
            for col in cols.0..=cols.1.min(self.width().saturating_sub(1)) {
                self.set_land(row, col);
            }
        }
    }

    pub fn is_land(&self, row: usize, col: usize) -> bool {
        row < self.height() && col < self.width() && self.mask.contains(self.key(row, col))
    }

    pub fn land_cell_count(&self) -> u64 {
        self.mask.len()
    }

    /// Grid cell closest to a coordinate, clamped to the raster.
    pub fn nearest_index(&self, coord: &Coordinate) -> (usize, usize) {
        (closest(&self.latitudes, coord.lat), closest(&self.longitudes, coord.lon))
    }

    pub fn coordinate_of(&self, row: usize, col: usize) -> Coordinate {
        Coordinate::new(self.latitudes[row], self.longitudes[col])
    }
}

fn closest(axis: &[f64], value: f64) -> usize {
    axis.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}
