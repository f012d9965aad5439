use crate::engine::geodesy::{angle_difference, knots_to_si, si_to_knots};
use crate::engine::models::WindData;
use crate::error::SimulationError;
use crate::parsers::polars::{ANGLE_STEP_DEG, MAX_ANGLE_DEG, PolarTable};

/// Wind speeds above this are looked up in the 30 kn column.
pub const MAX_TABLE_WIND_KN: f64 = 30.0;
const SPEED_STEP_KN: f64 = 5.0;
/// Absorbs floating-point noise so that e.g. 30.000000001 deg stays in the 30 deg bucket.
const BUCKET_EPSILON: f64 = 1e-9;

/// Boat performance from a pair of polar diagrams: paddling speed and leeway.
#[derive(Debug, Clone)]
pub struct PerformanceModel {
    speed: PolarTable,
    leeway: PolarTable,
}

/// Table coordinates for one wind/bearing combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarBucket {
    /// Signed relative wind angle in (-180, 180]; positive when the wind comes from the right
    pub relative_angle: f64,
    pub angle_deg: u32,
    pub speed_kn: u32,
}

impl PerformanceModel {
    pub fn new(speed: PolarTable, leeway: PolarTable) -> Self {
        Self { speed, leeway }
    }

    /// Signed True Wind Angle from wind direction and boat heading
    pub fn relative_wind_angle(wind_direction: f64, bearing: f64) -> f64 {
        angle_difference(bearing, wind_direction)
    }

    /// Rounds the relative angle up to the next 10 deg and the wind speed up to the
    /// next 5 kn, capping the speed at 30 kn.
    pub fn bucket(wind: &WindData, bearing: f64) -> Result<PolarBucket, SimulationError> {
        let relative_angle = Self::relative_wind_angle(wind.direction, bearing);
        let abs_angle = relative_angle.abs();
        if !(0.0..=MAX_ANGLE_DEG as f64).contains(&abs_angle) {
            return Err(SimulationError::invalid(format!(
                "absolute wind angle {abs_angle} deg is outside [0, 180]"
            )));
        }

        let wind_kn = si_to_knots(wind.speed);
        if wind_kn.is_nan() || wind_kn < 0.0 {
            return Err(SimulationError::invalid(format!(
                "wind speed {} m/s is negative or undefined",
                wind.speed
            )));
        }

        let step = ANGLE_STEP_DEG as f64;
        let angle_deg = (((abs_angle - BUCKET_EPSILON) / step).ceil().max(0.0) * step) as u32;
        let speed_kn = if wind_kn > MAX_TABLE_WIND_KN {
            MAX_TABLE_WIND_KN as u32
        } else {
            (((wind_kn - BUCKET_EPSILON) / SPEED_STEP_KN).ceil().max(0.0) * SPEED_STEP_KN) as u32
        };

        Ok(PolarBucket { relative_angle, angle_deg, speed_kn })
    }

    /// Paddling speed (m/s) for the given wind and heading.
    pub fn speed(&self, wind: &WindData, bearing: f64) -> Result<f64, SimulationError> {
        let bucket = Self::bucket(wind, bearing)?;
        let knots = lookup(&self.speed, &bucket)?;
        Ok(knots_to_si(knots))
    }

    /// Leeway angle (deg) for the given wind and heading. The diagrams only hold
    /// non-negative values, so the sign follows the side the wind comes from.
    pub fn leeway(&self, wind: &WindData, bearing: f64) -> Result<f64, SimulationError> {
        let bucket = Self::bucket(wind, bearing)?;
        let magnitude = lookup(&self.leeway, &bucket)?;
        Ok(sign(bucket.relative_angle) * magnitude)
    }
}

fn lookup(table: &PolarTable, bucket: &PolarBucket) -> Result<f64, SimulationError> {
    table.lookup(bucket.speed_kn, bucket.angle_deg).ok_or_else(|| {
        SimulationError::invalid(format!(
            "polar table has no entry for {} kn at {} deg",
            bucket.speed_kn, bucket.angle_deg
        ))
    })
}

/// Like numpy's sign: zero stays zero.
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::polars::tests::{demo_leeway_csv, demo_speed_csv};

    fn demo_model() -> PerformanceModel {
        let speed = PolarTable::from_reader(demo_speed_csv().as_bytes()).unwrap();
        let leeway = PolarTable::from_reader(demo_leeway_csv().as_bytes()).unwrap();
        PerformanceModel::new(speed, leeway)
    }

    #[test]
    fn test_relative_wind_angle() {
        // Wind from North, heading North -> on the bow
        assert_eq!(PerformanceModel::relative_wind_angle(0.0, 0.0), 0.0);
        // Wind from North, heading East -> from the left
        assert_eq!(PerformanceModel::relative_wind_angle(0.0, 90.0), -90.0);
        // Wind from North, heading West -> from the right
        assert_eq!(PerformanceModel::relative_wind_angle(0.0, 270.0), 90.0);
        assert_eq!(PerformanceModel::relative_wind_angle(180.0, 150.0), 30.0);
        assert_eq!(PerformanceModel::relative_wind_angle(180.0, 0.0), 180.0);
    }

    #[test]
    fn test_buckets_round_up() {
        let knots_ms = |kn: f64| knots_to_si(kn);

        let b = PerformanceModel::bucket(&WindData::new(knots_ms(7.0), 31.0), 0.0).unwrap();
        assert_eq!((b.speed_kn, b.angle_deg), (10, 40));

        let b = PerformanceModel::bucket(&WindData::new(knots_ms(10.0), 30.0), 0.0).unwrap();
        assert_eq!((b.speed_kn, b.angle_deg), (10, 30));

        let b = PerformanceModel::bucket(&WindData::new(0.0, 0.0), 0.0).unwrap();
        assert_eq!((b.speed_kn, b.angle_deg), (0, 0));

        let b = PerformanceModel::bucket(&WindData::new(knots_ms(0.1), 180.0), 0.0).unwrap();
        assert_eq!((b.speed_kn, b.angle_deg), (5, 180));

        let b = PerformanceModel::bucket(&WindData::new(knots_ms(0.1), 359.5), 0.0).unwrap();
        assert_eq!(b.angle_deg, 10);
        assert!(b.relative_angle < 0.0);
    }

    #[test]
    fn test_storm_wind_is_capped() {
        let b = PerformanceModel::bucket(&WindData::new(40.0, 90.0), 0.0).unwrap();
        assert_eq!(b.speed_kn, 30);

        let model = demo_model();
        let storm = model.speed(&WindData::new(40.0, 180.0), 0.0).unwrap();
        let gale = model.speed(&WindData::new(knots_to_si(30.0), 180.0), 0.0).unwrap();
        assert_eq!(storm, gale);
    }

    #[test]
    fn test_negative_wind_speed_is_rejected() {
        let err = PerformanceModel::bucket(&WindData::new(-1.0, 0.0), 0.0).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidInput(_)));

        let err = PerformanceModel::bucket(&WindData::new(f64::NAN, 0.0), 0.0).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidInput(_)));
    }

    #[test]
    fn test_speed_is_converted_to_si() {
        let model = demo_model();
        // Wind from astern at 20 kn -> 180 deg bucket, 20 kn column = 5.5 kn
        let speed = model.speed(&WindData::new(knots_to_si(20.0), 180.0), 0.0).unwrap();
        assert!((speed - knots_to_si(5.5)).abs() < 1e-12);
    }

    #[test]
    fn test_leeway_sign_follows_wind_side() {
        let model = demo_model();
        let wind_kn = knots_to_si(10.0);

        let from_right = model.leeway(&WindData::new(wind_kn, 90.0), 0.0).unwrap();
        let from_left = model.leeway(&WindData::new(wind_kn, 270.0), 0.0).unwrap();
        // 10 kn abeam -> 0.5 deg
        assert!((from_right - 0.5).abs() < 1e-12);
        assert_eq!(from_left, -from_right);

        let on_the_bow = model.leeway(&WindData::new(wind_kn, 0.0), 0.0).unwrap();
        assert_eq!(on_the_bow, 0.0);
    }
}
