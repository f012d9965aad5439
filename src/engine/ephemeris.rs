//! Daylight windows from the sunrise equation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::models::Coordinate;

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const EARTH_OBLIQUITY_DEG: f64 = 23.4397;

/// Solar elevation that marks the start and end of the paddling day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Twilight {
    /// Upper limb on the horizon, refraction included
    #[default]
    Sun,
    Civil,
    Nautical,
    Astronomical,
}

impl Twilight {
    pub fn horizon_deg(self) -> f64 {
        match self {
            Twilight::Sun => -0.833,
            Twilight::Civil => -6.0,
            Twilight::Nautical => -12.0,
            Twilight::Astronomical => -18.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Twilight::Sun => "sun",
            Twilight::Civil => "civil",
            Twilight::Nautical => "nautical",
            Twilight::Astronomical => "astronomical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DaylightWindow {
    Bounded { start: DateTime<Utc>, end: DateTime<Utc> },
    /// Midnight sun
    AlwaysDay,
    /// Polar night
    AlwaysNight,
}

impl DaylightWindow {
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        match *self {
            DaylightWindow::Bounded { start, end } => start <= time && time < end,
            DaylightWindow::AlwaysDay => true,
            DaylightWindow::AlwaysNight => false,
        }
    }
}

fn julian_to_utc(jd: f64) -> Option<DateTime<Utc>> {
    let millis = ((jd - UNIX_EPOCH_JD) * 86_400_000.0).round();
    DateTime::from_timestamp_millis(millis as i64)
}

/// Sunrise and sunset around the solar noon of `date` at `position`.
pub fn daylight_window(date: NaiveDate, position: &Coordinate, twilight: Twilight) -> DaylightWindow {
    // NaiveDate::default() is 1970-01-01
    let days_since_epoch = (date - NaiveDate::default()).num_days();
    // Julian day number of noon
    let n = days_since_epoch as f64 + UNIX_EPOCH_JD + 0.5 - J2000;

    let mean_noon = n - position.lon / 360.0;
    let anomaly = (357.5291 + 0.985_600_28 * mean_noon).rem_euclid(360.0).to_radians();
    let centre = 1.9148 * anomaly.sin() + 0.02 * (2.0 * anomaly).sin() + 0.0003 * (3.0 * anomaly).sin();
    let ecliptic_lon = (anomaly.to_degrees() + centre + 180.0 + 102.9372)
        .rem_euclid(360.0)
        .to_radians();
    let transit = J2000 + mean_noon + 0.0053 * anomaly.sin() - 0.0069 * (2.0 * ecliptic_lon).sin();

    let sin_decl = ecliptic_lon.sin() * EARTH_OBLIQUITY_DEG.to_radians().sin();
    let cos_decl = (1.0 - sin_decl * sin_decl).sqrt();
    let lat = position.lat.to_radians();
    let cos_hour_angle =
        (twilight.horizon_deg().to_radians().sin() - lat.sin() * sin_decl) / (lat.cos() * cos_decl);

    if cos_hour_angle < -1.0 {
        return DaylightWindow::AlwaysDay;
    }
    if cos_hour_angle > 1.0 {
        return DaylightWindow::AlwaysNight;
    }

    let half_day = cos_hour_angle.acos().to_degrees() / 360.0;
    match (julian_to_utc(transit - half_day), julian_to_utc(transit + half_day)) {
        (Some(start), Some(end)) => DaylightWindow::Bounded { start, end },
        _ => DaylightWindow::AlwaysNight,
    }
}

/// Whether the sun is above the twilight horizon at `time` and `position`.
pub fn is_daylight(time: DateTime<Utc>, position: &Coordinate, twilight: Twilight) -> bool {
    let date = time.date_naive();
    // Far from Greenwich the local solar day straddles two UTC dates
    [date.pred_opt(), Some(date), date.succ_opt()]
        .into_iter()
        .flatten()
        .any(|day| daylight_window(day, position, twilight).contains(time))
}

/// Daybreak of `date` at `position`, or 00:00 UTC when the sun never rises or never sets.
pub fn start_of_day(date: NaiveDate, position: &Coordinate, twilight: Twilight) -> DateTime<Utc> {
    match daylight_window(date, position, twilight) {
        DaylightWindow::Bounded { start, .. } => start,
        DaylightWindow::AlwaysDay | DaylightWindow::AlwaysNight => midnight(date),
    }
}

pub fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Departure days starting at `first`, one per day.
pub fn consecutive_days(first: NaiveDate, count: usize) -> Vec<NaiveDate> {
    (0..count as i64).map(|offset| first + Duration::days(offset)).collect()
}
