use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};
use thiserror::Error;

/// Wind-speed buckets (knots) every table must provide.
pub const SPEED_BUCKETS_KN: [u32; 7] = [0, 5, 10, 15, 20, 25, 30];
/// Relative wind-angle buckets (degrees) every table must provide.
pub const ANGLE_STEP_DEG: u32 = 10;
pub const MAX_ANGLE_DEG: u32 = 180;

#[derive(Debug, Error)]
pub enum PolarError {
    #[error("failed to read polar table: {0}")]
    Io(#[from] std::io::Error),
    #[error("polar table is empty")]
    Empty,
    #[error("line {line}: cannot parse '{value}' as a number")]
    Parse { line: usize, value: String },
    #[error("line {line}: expected {expected} values, found {found}")]
    RowLength {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("polar table has no entry for {wind_speed_kn} kn at {wind_angle_deg} deg")]
    Incomplete {
        wind_speed_kn: u32,
        wind_angle_deg: u32,
    },
}

/// A boat performance table indexed by relative wind angle (rows) and wind
/// speed (columns). Values are either boat speeds in knots or leeway angles
/// in degrees, depending on which diagram was loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarTable {
    /// Wind speeds (knots)
    wind_speeds: Vec<f64>,
    /// Relative wind angles (degrees)
    wind_angles: Vec<f64>,
    /// values[angle_idx][speed_idx]
    values: Vec<Vec<f64>>,
}

impl PolarTable {
    pub fn new(
        wind_speeds: Vec<f64>,
        wind_angles: Vec<f64>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, PolarError> {
        if wind_speeds.is_empty() || wind_angles.is_empty() {
            return Err(PolarError::Empty);
        }
        for (i, row) in values.iter().enumerate() {
            if row.len() != wind_speeds.len() {
                return Err(PolarError::RowLength {
                    line: i + 2,
                    expected: wind_speeds.len(),
                    found: row.len(),
                });
            }
        }

        let table = Self { wind_speeds, wind_angles, values };

        for speed in SPEED_BUCKETS_KN {
            for angle in (0..=MAX_ANGLE_DEG).step_by(ANGLE_STEP_DEG as usize) {
                if table.lookup(speed, angle).is_none() {
                    return Err(PolarError::Incomplete {
                        wind_speed_kn: speed,
                        wind_angle_deg: angle,
                    });
                }
            }
        }

        Ok(table)
    }

    /// A table with the same value in every bucket.
    pub fn uniform(value: f64) -> Self {
        let wind_speeds = SPEED_BUCKETS_KN.iter().map(|&s| s as f64).collect::<Vec<_>>();
        let wind_angles = (0..=MAX_ANGLE_DEG)
            .step_by(ANGLE_STEP_DEG as usize)
            .map(|a| a as f64)
            .collect::<Vec<_>>();
        let values = vec![vec![value; wind_speeds.len()]; wind_angles.len()];
        Self { wind_speeds, wind_angles, values }
    }

    pub fn load_from_csv<P: AsRef<Path>>(path: P) -> Result<Self, PolarError> {
        info!("Loading polar table from {:?}", path.as_ref());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses a delimited table (comma or tab separated). The first row holds the
    /// wind speeds; its first cell is a label and is ignored. Each following row
    /// starts with a wind angle.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, PolarError> {
        let mut lines = reader.lines().enumerate();

        let header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Err(PolarError::Empty),
            }
        };
        let delimiter = if header.contains('\t') { '\t' } else { ',' };

        let wind_speeds = header
            .split(delimiter)
            .skip(1)
            .map(|cell| parse_cell(cell, 1))
            .collect::<Result<Vec<_>, _>>()?;

        let mut wind_angles = Vec::new();
        let mut values = Vec::new();

        for (idx, line_result) in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let mut cells = line.split(delimiter);
            let angle = parse_cell(cells.next().unwrap_or_default(), idx + 1)?;
            let row = cells
                .map(|cell| parse_cell(cell, idx + 1))
                .collect::<Result<Vec<_>, _>>()?;
            if row.len() != wind_speeds.len() {
                return Err(PolarError::RowLength {
                    line: idx + 1,
                    expected: wind_speeds.len(),
                    found: row.len(),
                });
            }
            wind_angles.push(angle);
            values.push(row);
        }

        Self::new(wind_speeds, wind_angles, values)
    }

    /// Exact bucket lookup; `None` when the table has no such row or column.
    pub fn lookup(&self, wind_speed_kn: u32, wind_angle_deg: u32) -> Option<f64> {
        let speed_idx = position_of(&self.wind_speeds, wind_speed_kn as f64)?;
        let angle_idx = position_of(&self.wind_angles, wind_angle_deg as f64)?;
        Some(self.values[angle_idx][speed_idx])
    }

    /// Whether the value never decreases as wind speed grows at the given angle bucket.
    pub fn non_decreasing_with_wind(&self, wind_angle_deg: u32) -> bool {
        SPEED_BUCKETS_KN
            .windows(2)
            .all(|pair| match (self.lookup(pair[0], wind_angle_deg), self.lookup(pair[1], wind_angle_deg)) {
                (Some(low), Some(high)) => high >= low,
                _ => false,
            })
    }

    /// Logs the angle buckets where speed drops as wind picks up.
    pub fn warn_on_non_monotonic(&self, label: &str) {
        for angle in (0..=MAX_ANGLE_DEG).step_by(ANGLE_STEP_DEG as usize) {
            if !self.non_decreasing_with_wind(angle) {
                warn!("{label}: values decrease with wind speed at {angle} deg");
            }
        }
    }
}

fn position_of(axis: &[f64], value: f64) -> Option<usize> {
    axis.iter().position(|&v| (v - value).abs() < 1e-6)
}

fn parse_cell(cell: &str, line: usize) -> Result<f64, PolarError> {
    let trimmed = cell.trim().trim_matches('"');
    trimmed.parse().map_err(|_| PolarError::Parse {
        line,
        value: trimmed.to_string(),
    })
}
