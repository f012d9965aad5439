use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::engine::geodesy::{circular_mean_deg, distance_km};
use crate::engine::voyage::{VoyageOutcome, VoyageState};
use crate::export::ExportError;

pub const CSV_HEADER: &str = "Date,Duration,Distance,MeanSpeedKmh,MeanSpeedMs,Success,WavesAvg,WavesMax,\
HoursAbove2m,WindAvgSpeed,WindAvgDir,CurrentsAvgX,CurrentsAvgY,State";

/// Significant wave height counted as rough water (m)
pub const ROUGH_WAVE_HEIGHT_M: f64 = 2.0;

/// One row of the campaign summary. Statistics without samples are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub date: NaiveDate,
    pub duration_hours: f64,
    pub distance_km: f64,
    pub mean_speed_kmh: f64,
    pub mean_speed_ms: f64,
    pub success: bool,
    pub waves_avg: f64,
    pub waves_max: f64,
    pub hours_above_2m: f64,
    pub wind_avg_speed: f64,
    pub wind_avg_dir: f64,
    pub currents_avg_x: f64,
    pub currents_avg_y: f64,
    pub state: VoyageState,
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

impl AggregateRecord {
    pub fn from_outcome(outcome: &VoyageOutcome, success_radius_km: f64) -> Self {
        let log = &outcome.log;
        let waves: Vec<f64> = log.waves.iter().flatten().copied().collect();
        let rough = waves.iter().filter(|&&h| h > ROUGH_WAVE_HEIGHT_M).count();
        let wind_dirs: Vec<f64> = log.winds.iter().flatten().map(|w| w.direction).collect();

        Self {
            date: outcome.start_time.date_naive(),
            duration_hours: outcome.duration_hours(),
            distance_km: outcome.vessel.distance_km,
            mean_speed_kmh: outcome.mean_speed_kmh(),
            mean_speed_ms: outcome.mean_speed_ms(),
            success: distance_km(&outcome.vessel.position, &outcome.vessel.target) <= success_radius_km,
            waves_avg: nan_mean(waves.iter().copied()),
            waves_max: waves.iter().copied().fold(f64::NAN, f64::max),
            hours_above_2m: rough as f64 * outcome.config.step_minutes / 60.0,
            wind_avg_speed: nan_mean(log.winds.iter().flatten().map(|w| w.speed)),
            wind_avg_dir: circular_mean_deg(&wind_dirs).unwrap_or(f64::NAN),
            currents_avg_x: nan_mean(log.currents.iter().flatten().map(|c| c.u)),
            currents_avg_y: nan_mean(log.currents.iter().flatten().map(|c| c.v)),
            state: outcome.state,
        }
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.date.format("%Y-%m-%d"),
            self.duration_hours,
            self.distance_km,
            self.mean_speed_kmh,
            self.mean_speed_ms,
            u8::from(self.success),
            self.waves_avg,
            self.waves_max,
            self.hours_above_2m,
            self.wind_avg_speed,
            self.wind_avg_dir,
            self.currents_avg_x,
            self.currents_avg_y,
            self.state.as_str()
        )
    }
}

/// Appends one row, writing the header first when the file is new.
pub fn append_to_csv(path: &Path, record: &AggregateRecord) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let is_new = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path).map_err(io_error)?;
    if is_new {
        writeln!(file, "{CSV_HEADER}").map_err(io_error)?;
    }
    writeln!(file, "{}", record.to_csv_row()).map_err(io_error)
}
