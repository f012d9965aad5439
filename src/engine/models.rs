use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// `geo` points are (x = lon, y = lat).
    pub fn to_point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }

    pub fn from_point(point: geo::Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

/// Wind at a specific point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindData {
    /// Speed (m/s)
    pub speed: f64,
    /// Direction the wind blows from, geographic degrees (0 = North)
    pub direction: f64,
}

impl WindData {
    pub fn new(speed: f64, direction: f64) -> Self {
        Self { speed, direction }
    }

    pub fn calm() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Builds a wind sample from Eastward (`u`) and Northward (`v`) components.
    pub fn from_components(u: f64, v: f64) -> Self {
        let speed = (u.powi(2) + v.powi(2)).sqrt();
        let angle = v.atan2(u).to_degrees();
        let mut direction = 270.0 - angle;
        if direction < 0.0 { direction += 360.0; }
        if direction >= 360.0 { direction -= 360.0; }
        Self { speed, direction }
    }
}

/// Ocean current data, Eastward (`u`) and Northward (`v`) components in m/s
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentData {
    pub u: f64,
    pub v: f64,
}

impl CurrentData {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    pub fn still() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn speed(&self) -> f64 {
        (self.u.powi(2) + self.v.powi(2)).sqrt()
    }
}

/// Result of probing the current field at a location.
///
/// An undefined current cell is how the datasets mark land, so the probe
/// distinguishes that case from a location or time that simply has no data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurrentSample {
    Flow(CurrentData),
    Land,
    NoData,
}

impl CurrentSample {
    pub fn flow(self) -> Option<CurrentData> {
        match self {
            CurrentSample::Flow(current) => Some(current),
            CurrentSample::Land | CurrentSample::NoData => None,
        }
    }
}

/// Closest land seen by the land radar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub distance_km: f64,
    /// Initial bearing from the vessel towards the land cell
    pub bearing: f64,
}
