//! Regular latitude/longitude grids holding a time series of named layers.

use std::collections::HashMap;
use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::models::Coordinate;

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("{axis} axis is empty or not strictly ascending")]
    Axis { axis: &'static str },
    #[error("variable '{name}' holds {found} values, expected {expected}")]
    Shape {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("cannot join grids: {0}")]
    Mismatch(String),
}

/// Longitude convention of a grid axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LongitudeConvention {
    /// -180..180
    Signed,
    /// 0..360, as used by some reanalysis wind products
    Positive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GriddedField {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    times: Vec<DateTime<Utc>>,
    /// Flattened [time][lat][lon]; NaN marks undefined cells
    variables: HashMap<String, Vec<f32>>,
    convention: LongitudeConvention,
}

impl GriddedField {
    pub fn new(
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        times: Vec<DateTime<Utc>>,
        variables: HashMap<String, Vec<f32>>,
    ) -> Result<Self, FieldError> {
        if !strictly_ascending(&latitudes) {
            return Err(FieldError::Axis { axis: "latitude" });
        }
        if !strictly_ascending(&longitudes) {
            return Err(FieldError::Axis { axis: "longitude" });
        }
        if times.is_empty() || times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FieldError::Axis { axis: "time" });
        }

        let expected = times.len() * latitudes.len() * longitudes.len();
        for (name, values) in &variables {
            if values.len() != expected {
                return Err(FieldError::Shape {
                    name: name.clone(),
                    expected,
                    found: values.len(),
                });
            }
        }

        let convention = if longitudes.iter().any(|&lon| lon > 180.0) {
            LongitudeConvention::Positive
        } else {
            LongitudeConvention::Signed
        };

        Ok(Self { latitudes, longitudes, times, variables, convention })
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn convention(&self) -> LongitudeConvention {
        self.convention
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.latitudes.len(), self.longitudes.len())
    }

    /// Raw slice of one variable at one time step, row-major over (lat, lon).
    pub fn layer(&self, name: &str, time_idx: usize) -> Option<&[f32]> {
        let values = self.variables.get(name)?;
        let size = self.latitudes.len() * self.longitudes.len();
        values.get(time_idx * size..(time_idx + 1) * size)
    }

    /// Index of the time slice nearest to `time`, provided that slice is at most
    /// one slice spacing away. Times past either end of the series, or inside a
    /// hole left by a missing month, have no slice.
    pub fn nearest_time_index(&self, time: DateTime<Utc>) -> Option<usize> {
        let after = self.times.partition_point(|&t| t < time);
        let gap = |idx: usize| (self.times[idx] - time).abs();
        let nearest = match (after.checked_sub(1), (after < self.times.len()).then_some(after)) {
            (Some(before), Some(after)) => {
                if gap(after) < gap(before) {
                    after
                } else {
                    before
                }
            }
            (Some(before), None) => before,
            (None, Some(after)) => after,
            (None, None) => return None,
        };
        (gap(nearest) <= self.time_spacing()).then_some(nearest)
    }

    fn time_spacing(&self) -> Duration {
        match self.times.as_slice() {
            [first, second, ..] => *second - *first,
            _ => Duration::hours(1),
        }
    }

    /// Value of a cell, `None` when undefined.
    pub fn value(&self, name: &str, time_idx: usize, row: usize, col: usize) -> Option<f64> {
        let layer = self.layer(name, time_idx)?;
        let value = *layer.get(row * self.longitudes.len() + col)?;
        if value.is_nan() { None } else { Some(value as f64) }
    }

    /// Longitude expressed in this grid's convention.
    pub fn grid_longitude(&self, lon: f64) -> f64 {
        match self.convention {
            LongitudeConvention::Signed => lon,
            LongitudeConvention::Positive => lon.rem_euclid(360.0),
        }
    }

    /// Nearest grid cell, or `None` when the location lies more than half a
    /// cell outside the grid.
    pub fn nearest_cell(&self, location: &Coordinate) -> Option<(usize, usize)> {
        let row = nearest_on_axis(&self.latitudes, location.lat)?;
        let col = nearest_on_axis(&self.longitudes, self.grid_longitude(location.lon))?;
        Some((row, col))
    }

    /// Rows whose latitude lies in `[min, max]`.
    pub fn lat_range(&self, min: f64, max: f64) -> Range<usize> {
        axis_range(&self.latitudes, min, max)
    }

    /// Columns whose grid longitude lies in `[min, max]`.
    pub fn lon_range(&self, min: f64, max: f64) -> Range<usize> {
        axis_range(&self.longitudes, min, max)
    }

    /// Defined values of one variable inside a block of cells.
    pub fn window_values(
        &self,
        name: &str,
        time_idx: usize,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Vec<f64> {
        let mut values = Vec::new();
        for row in rows {
            for col in cols.clone() {
                if let Some(v) = self.value(name, time_idx, row, col) {
                    values.push(v);
                }
            }
        }
        values
    }

    /// Every value of one variable, flattened [time][lat][lon]
    pub fn values(&self, name: &str) -> Option<&[f32]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    /// Time slices within `[start, end]`.
    pub fn time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Range<usize> {
        let first = self.times.partition_point(|&t| t < start);
        let last = self.times.partition_point(|&t| t <= end);
        first..last.max(first)
    }

    /// Copy of a block of rows, a set of ascending columns and a run of time slices.
    pub fn select(&self, rows: Range<usize>, cols: &[usize], times: Range<usize>) -> Result<Self, FieldError> {
        let (height, width) = self.shape();
        let variables = self
            .variables
            .iter()
            .map(|(name, values)| {
                let mut selected = Vec::with_capacity(times.len() * rows.len() * cols.len());
                for t in times.clone() {
                    for row in rows.clone() {
                        let offset = (t * height + row) * width;
                        selected.extend(cols.iter().map(|&col| values[offset + col]));
                    }
                }
                (name.clone(), selected)
            })
            .collect();

        Self::new(
            self.latitudes[rows.clone()].to_vec(),
            cols.iter().map(|&col| self.longitudes[col]).collect(),
            self.times[times].to_vec(),
            variables,
        )
    }

    /// Joins fields on the same grid along time. Slices repeated at the seam
    /// between two parts are kept once.
    pub fn concat_time(parts: Vec<Self>) -> Result<Self, FieldError> {
        let mut parts = parts.into_iter();
        let Some(mut joined) = parts.next() else {
            return Err(FieldError::Mismatch("nothing to join".into()));
        };

        for part in parts {
            if part.latitudes != joined.latitudes || part.longitudes != joined.longitudes {
                return Err(FieldError::Mismatch("latitude or longitude axes differ".into()));
            }
            let mut names: Vec<&String> = part.variables.keys().collect();
            let mut expected: Vec<&String> = joined.variables.keys().collect();
            names.sort();
            expected.sort();
            if names != expected {
                return Err(FieldError::Mismatch(format!("variables {names:?} instead of {expected:?}")));
            }

            let last = joined.times.last().copied();
            let skip = part.times.iter().take_while(|&&t| last.is_some_and(|last| t <= last)).count();
            let size = joined.latitudes.len() * joined.longitudes.len();
            for (name, values) in part.variables {
                if let Some(target) = joined.variables.get_mut(&name) {
                    target.extend_from_slice(&values[skip * size..]);
                }
            }
            joined.times.extend_from_slice(&part.times[skip..]);
        }
        Ok(joined)
    }

    pub fn cell_coordinate(&self, row: usize, col: usize) -> Coordinate {
        let mut lon = self.longitudes[col];
        if lon > 180.0 {
            lon -= 360.0;
        }
        Coordinate::new(self.latitudes[row], lon)
    }
}

fn strictly_ascending(axis: &[f64]) -> bool {
    !axis.is_empty() && axis.windows(2).all(|w| w[0] < w[1])
}

fn axis_range(axis: &[f64], min: f64, max: f64) -> Range<usize> {
    let start = axis.partition_point(|&v| v < min);
    let end = axis.partition_point(|&v| v <= max);
    start..end.max(start)
}

fn nearest_on_axis(axis: &[f64], value: f64) -> Option<usize> {
    let half_cell = match axis {
        [first, second, ..] => (second - first) / 2.0,
        _ => 0.5,
    };
    let first = *axis.first()?;
    let last = *axis.last()?;
    if value < first - half_cell || value > last + half_cell {
        return None;
    }
    let after = axis.partition_point(|&v| v < value);
    if after == 0 {
        return Some(0);
    }
    if after == axis.len() {
        return Some(axis.len() - 1);
    }
    Some(if axis[after] - value < value - axis[after - 1] { after } else { after - 1 })
}
