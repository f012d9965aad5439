//! Time- and location-indexed access to winds, currents and waves.

use chrono::{DateTime, Utc};

use crate::engine::field::{GriddedField, LongitudeConvention};
use crate::engine::geodesy::{bearing, circular_mean_deg, distance_km};
use crate::engine::mask::LandRaster;
use crate::engine::models::{Coordinate, CurrentData, CurrentSample, Landmark, WindData};

/// Variable names in the wind, current and wave datasets
pub const WIND_SPEED_VAR: &str = "si10";
pub const WIND_DIRECTION_VAR: &str = "wdir10";
pub const CURRENT_U_VAR: &str = "uo";
pub const CURRENT_V_VAR: &str = "vo";
pub const WAVE_HEIGHT_VAR: &str = "VHM0";

/// Source of environmental samples for the voyage loop and the route planner.
pub trait EnvironmentStore {
    /// Mean wind in a square window around `location`; `None` without data.
    fn local_wind(&self, location: &Coordinate, time: DateTime<Utc>) -> Option<WindData>;

    /// Current at `location`, either averaged over a window or at the nearest cell.
    fn local_current(&self, location: &Coordinate, time: DateTime<Utc>, averaged: bool) -> CurrentSample;

    fn local_wave_height(&self, location: &Coordinate, time: DateTime<Utc>) -> Option<f64>;

    /// Closest land cell within `search_radius_deg`.
    fn nearest_land(&self, location: &Coordinate, search_radius_deg: f64) -> Option<Landmark>;

    /// Closest water cell within `search_radius_deg`.
    fn nearest_water(&self, location: &Coordinate, search_radius_deg: f64) -> Option<Coordinate>;

    /// Land/water classification used to build the route-search grid.
    fn land_mask_raster(&self, time: DateTime<Utc>) -> Option<LandRaster>;
}

/// Half-widths (deg) of the square sampling windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingRadii {
    pub wind: f64,
    pub current: f64,
    pub waves: f64,
}

impl Default for SamplingRadii {
    fn default() -> Self {
        // roughly the grid spacing of the reanalysis products
        Self { wind: 0.05, current: 0.07, waves: 0.07 }
    }
}

/// [`EnvironmentStore`] over in-memory gridded datasets.
#[derive(Debug, Clone)]
pub struct GriddedEnvironment {
    winds: GriddedField,
    currents: GriddedField,
    waves: Option<GriddedField>,
    radii: SamplingRadii,
}

impl GriddedEnvironment {
    pub fn new(winds: GriddedField, currents: GriddedField, waves: Option<GriddedField>) -> Self {
        Self { winds, currents, waves, radii: SamplingRadii::default() }
    }

    pub fn with_sampling_radii(mut self, radii: SamplingRadii) -> Self {
        self.radii = radii;
        self
    }

    pub fn currents(&self) -> &GriddedField {
        &self.currents
    }

    /// Cells of `field` in the square window, splitting the longitude range
    /// across the 0/360 seam for grids in the positive convention.
    fn window_samples(
        field: &GriddedField,
        names: &[&str],
        time_idx: usize,
        location: &Coordinate,
        radius: f64,
    ) -> Vec<Vec<f64>> {
        let rows = field.lat_range(location.lat - radius, location.lat + radius);

        let centre = field.grid_longitude(location.lon);
        let (lo, hi) = (centre - radius, centre + radius);
        let mut col_ranges = Vec::with_capacity(2);
        match field.convention() {
            LongitudeConvention::Positive if hi >= 360.0 => {
                col_ranges.push(field.lon_range(lo, 360.0));
                col_ranges.push(field.lon_range(0.0, hi - 360.0));
            }
            LongitudeConvention::Positive if lo < 0.0 => {
                col_ranges.push(field.lon_range(lo + 360.0, 360.0));
                col_ranges.push(field.lon_range(0.0, hi));
            }
            _ => col_ranges.push(field.lon_range(lo, hi)),
        }

        names
            .iter()
            .map(|name| {
                col_ranges
                    .iter()
                    .flat_map(|cols| field.window_values(name, time_idx, rows.clone(), cols.clone()))
                    .collect()
            })
            .collect()
    }

    /// Scans the first current slice around `location` and returns the closest
    /// cell matching `want_land`, ranked by equirectangular distance.
    fn closest_cell(&self, location: &Coordinate, radius: f64, want_land: bool) -> Option<Coordinate> {
        let field = &self.currents;
        let rows = field.lat_range(location.lat - radius, location.lat + radius);
        let centre = field.grid_longitude(location.lon);
        let cols = field.lon_range(centre - radius, centre + radius);
        let cos_lat = location.lat.to_radians().cos();

        let mut best: Option<(f64, usize, usize)> = None;
        for row in rows {
            for col in cols.clone() {
                let is_land = field.value(CURRENT_U_VAR, 0, row, col).is_none();
                if is_land != want_land {
                    continue;
                }
                let cell = field.cell_coordinate(row, col);
                let d_lat = cell.lat - location.lat;
                let d_lon = (cell.lon - location.lon) * cos_lat;
                let rank = d_lat * d_lat + d_lon * d_lon;
                if best.is_none_or(|(current, _, _)| rank < current) {
                    best = Some((rank, row, col));
                }
            }
        }
        best.map(|(_, row, col)| field.cell_coordinate(row, col))
    }
}

impl EnvironmentStore for GriddedEnvironment {
    fn local_wind(&self, location: &Coordinate, time: DateTime<Utc>) -> Option<WindData> {
        let time_idx = self.winds.nearest_time_index(time)?;
        let samples = Self::window_samples(
            &self.winds,
            &[WIND_SPEED_VAR, WIND_DIRECTION_VAR],
            time_idx,
            location,
            self.radii.wind,
        );
        let speed = mean(&samples[0])?;
        let direction = circular_mean_deg(&samples[1])?;
        Some(WindData::new(speed, direction))
    }

    fn local_current(&self, location: &Coordinate, time: DateTime<Utc>, averaged: bool) -> CurrentSample {
        let Some(time_idx) = self.currents.nearest_time_index(time) else {
            return CurrentSample::NoData;
        };

        if averaged {
            let samples = Self::window_samples(
                &self.currents,
                &[CURRENT_U_VAR, CURRENT_V_VAR],
                time_idx,
                location,
                self.radii.current,
            );
            return match (mean(&samples[0]), mean(&samples[1])) {
                (Some(u), Some(v)) => CurrentSample::Flow(CurrentData::new(u, v)),
                _ => CurrentSample::NoData,
            };
        }

        let Some((row, col)) = self.currents.nearest_cell(location) else {
            return CurrentSample::NoData;
        };
        match (
            self.currents.value(CURRENT_U_VAR, time_idx, row, col),
            self.currents.value(CURRENT_V_VAR, time_idx, row, col),
        ) {
            (Some(u), Some(v)) => CurrentSample::Flow(CurrentData::new(u, v)),
            _ => CurrentSample::Land,
        }
    }

    fn local_wave_height(&self, location: &Coordinate, time: DateTime<Utc>) -> Option<f64> {
        let waves = self.waves.as_ref()?;
        let time_idx = waves.nearest_time_index(time)?;
        let samples = Self::window_samples(waves, &[WAVE_HEIGHT_VAR], time_idx, location, self.radii.waves);
        mean(&samples[0])
    }

    fn nearest_land(&self, location: &Coordinate, search_radius_deg: f64) -> Option<Landmark> {
        let land = self.closest_cell(location, search_radius_deg, true)?;
        Some(Landmark {
            distance_km: distance_km(location, &land),
            bearing: bearing(location, &land),
        })
    }

    fn nearest_water(&self, location: &Coordinate, search_radius_deg: f64) -> Option<Coordinate> {
        self.closest_cell(location, search_radius_deg, false)
    }

    fn land_mask_raster(&self, time: DateTime<Utc>) -> Option<LandRaster> {
        let field = &self.currents;
        let time_idx = field.nearest_time_index(time)?;
        let longitudes = (0..field.longitudes().len())
            .map(|col| field.cell_coordinate(0, col).lon)
            .collect();
        Some(LandRaster::from_fn(field.latitudes().to_vec(), longitudes, |row, col| {
            field.value(CURRENT_U_VAR, time_idx, row, col).is_none()
        }))
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
