use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::ephemeris::{Twilight, midnight};
use crate::engine::models::Coordinate;
use crate::engine::router::RouteConfig;
use crate::engine::voyage::VoyageConfig;
use crate::parsers::dataset::{BoundingBox, DatasetPaths};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_departure_days() -> usize {
    1
}
fn default_max_duration_hours() -> f64 {
    72.0
}
fn default_step_minutes() -> f64 {
    15.0
}
fn default_tolerance_km() -> f64 {
    3.0
}
fn default_success_radius_km() -> f64 {
    5.0
}
fn default_land_radar() -> bool {
    true
}
fn default_land_search_radius_deg() -> f64 {
    0.2
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// One simulation campaign: a craft, a crossing and a series of departure days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub craft: String,
    pub speed_polar: PathBuf,
    pub leeway_polar: PathBuf,
    pub datasets: DatasetPaths,
    pub bbox: BoundingBox,
    pub launching_site: Coordinate,
    pub landing_site: Coordinate,
    pub first_departure: NaiveDate,
    #[serde(default = "default_departure_days")]
    pub departure_days: usize,
    #[serde(default = "default_max_duration_hours")]
    pub max_duration_hours: f64,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: f64,
    #[serde(default = "default_tolerance_km")]
    pub tolerance_km: f64,
    /// Final distance to the landing site still counted as a success
    #[serde(default = "default_success_radius_km")]
    pub success_radius_km: f64,
    #[serde(default)]
    pub stop_at_night: bool,
    #[serde(default)]
    pub twilight: Twilight,
    /// Standard deviation of the heading error (deg)
    #[serde(default)]
    pub navigation_error_sigma: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_land_radar")]
    pub land_radar: bool,
    #[serde(default = "default_land_search_radius_deg")]
    pub land_search_radius_deg: f64,
    /// Plan a coastal route before departing
    #[serde(default)]
    pub route: Option<RouteConfig>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl SimulationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
        config.validate()?;
        info!("Loaded configuration {} for {}", path.display(), config.craft);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_duration_hours", self.max_duration_hours),
            ("step_minutes", self.step_minutes),
            ("tolerance_km", self.tolerance_km),
            ("success_radius_km", self.success_radius_km),
            ("land_search_radius_deg", self.land_search_radius_deg),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if !self.navigation_error_sigma.is_finite() || self.navigation_error_sigma < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "navigation_error_sigma must be non-negative, got {}",
                self.navigation_error_sigma
            )));
        }
        if self.departure_days == 0 {
            return Err(ConfigError::Invalid("departure_days must be at least 1".into()));
        }
        if !self.bbox.is_valid() {
            return Err(ConfigError::Invalid(format!("bounding box {:?} is inverted", self.bbox)));
        }
        if let Some(route) = &self.route {
            route.shoreline.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if route.waypoint_interval == 0 {
                return Err(ConfigError::Invalid("waypoint_interval must be at least 1".into()));
            }
        }
        Ok(())
    }

    pub fn departure_dates(&self) -> Vec<NaiveDate> {
        crate::engine::ephemeris::consecutive_days(self.first_departure, self.departure_days)
    }

    /// Time span the datasets must cover: from the first departure day to the
    /// time limit of the last voyage.
    pub fn data_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let earliest = midnight(self.first_departure);
        let last_day = earliest + Duration::days(self.departure_days as i64);
        let latest = last_day + Duration::minutes((self.max_duration_hours * 60.0).ceil() as i64);
        (earliest, latest)
    }

    pub fn voyage_config(&self, start_time: DateTime<Utc>) -> VoyageConfig {
        VoyageConfig {
            start_time,
            max_duration_hours: self.max_duration_hours,
            step_minutes: self.step_minutes,
            tolerance_km: self.tolerance_km,
            stop_at_night: self.stop_at_night,
            twilight: self.twilight,
            land_search_radius_deg: self.land_search_radius_deg,
        }
    }
}
