use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::engine::environment::EnvironmentStore;
use crate::engine::ephemeris::{Twilight, is_daylight};
use crate::engine::models::{Coordinate, CurrentData, CurrentSample, WindData};
use crate::engine::vessel::Vessel;
use crate::error::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoyageState {
    Running,
    Arrived,
    Grounded,
    TimedOut,
    /// No environmental data at the vessel position and time
    OutOfData,
}

impl VoyageState {
    pub fn is_terminal(self) -> bool {
        self != VoyageState::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoyageState::Running => "running",
            VoyageState::Arrived => "arrived",
            VoyageState::Grounded => "grounded",
            VoyageState::TimedOut => "timed_out",
            VoyageState::OutOfData => "out_of_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoyageConfig {
    pub start_time: DateTime<Utc>,
    pub max_duration_hours: f64,
    pub step_minutes: f64,
    /// Distance to the target counted as arrival, also disables land avoidance
    pub tolerance_km: f64,
    pub stop_at_night: bool,
    pub twilight: Twilight,
    pub land_search_radius_deg: f64,
}

impl VoyageConfig {
    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            max_duration_hours: 72.0,
            step_minutes: 15.0,
            tolerance_km: 3.0,
            stop_at_night: false,
            twilight: Twilight::Sun,
            land_search_radius_deg: 0.2,
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let positive = [
            ("max duration", self.max_duration_hours),
            ("step", self.step_minutes),
            ("tolerance", self.tolerance_km),
            ("land search radius", self.land_search_radius_deg),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SimulationError::invalid(format!("{name} must be positive, got {value}")));
            }
        }
        Ok(())
    }

    pub fn step_duration(&self) -> Duration {
        Duration::milliseconds((self.step_minutes * 60_000.0).round() as i64)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::milliseconds((self.max_duration_hours * 3_600_000.0).round() as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NightStop {
    pub time: DateTime<Utc>,
    pub position: Coordinate,
}

/// Conditions met at each step. `None` where the dataset had no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoyageLog {
    pub winds: Vec<Option<WindData>>,
    pub currents: Vec<Option<CurrentData>>,
    pub waves: Vec<Option<f64>>,
    pub stops: Vec<NightStop>,
}

/// Time-stepping of a [`Vessel`] through an [`EnvironmentStore`].
pub struct Voyage<'a, E: EnvironmentStore + ?Sized> {
    env: &'a E,
    vessel: Vessel,
    config: VoyageConfig,
    current_time: DateTime<Utc>,
    state: VoyageState,
    steps: usize,
    log: VoyageLog,
}

impl<'a, E: EnvironmentStore + ?Sized> Voyage<'a, E> {
    pub fn new(env: &'a E, vessel: Vessel, config: VoyageConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            env,
            vessel,
            current_time: config.start_time,
            config,
            state: VoyageState::Running,
            steps: 0,
            log: VoyageLog::default(),
        })
    }

    pub fn state(&self) -> VoyageState {
        self.state
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.current_time
    }

    pub fn vessel(&self) -> &Vessel {
        &self.vessel
    }

    pub fn log(&self) -> &VoyageLog {
        &self.log
    }

    /// One step at `current_time`. Does not advance the clock.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        let position = self.vessel.position;
        let time = self.current_time;
        self.steps += 1;

        match self.env.local_current(&position, time, false) {
            CurrentSample::Land => {
                debug!("{} grounded at ({:.4}, {:.4})", self.vessel.craft, position.lat, position.lon);
                self.vessel.has_hit_land = true;
                self.state = VoyageState::Grounded;
                return Ok(());
            }
            CurrentSample::NoData => {
                debug!("No data at ({:.4}, {:.4}) on {time}", position.lat, position.lon);
                self.state = VoyageState::OutOfData;
                return Ok(());
            }
            CurrentSample::Flow(_) => {}
        }

        let wind = self.env.local_wind(&position, time);
        let current = self.env.local_current(&position, time, true).flow();
        let waves = self.env.local_wave_height(&position, time);
        self.log.winds.push(wind);
        self.log.currents.push(current);
        self.log.waves.push(waves);

        if self.config.stop_at_night && !is_daylight(time, &position, self.config.twilight) {
            if self.log.stops.last().is_none_or(|stop| stop.position != position) {
                debug!("{} stops for the night on {time}", self.vessel.craft);
                self.log.stops.push(NightStop { time, position });
            }
            return Ok(());
        }

        let landmark = if self.vessel.land_radar_on {
            self.env.nearest_land(&position, self.config.land_search_radius_deg)
        } else {
            None
        };

        self.vessel.move_step(
            landmark,
            &wind.unwrap_or_else(WindData::calm),
            &current.unwrap_or_else(CurrentData::still),
            self.config.step_minutes,
            self.config.tolerance_km,
        )?;
        Ok(())
    }

    /// Steps until arrival, grounding, missing data or the time limit.
    pub fn run(&mut self) -> Result<VoyageState, SimulationError> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        info!(
            "{} leaves ({:.3}, {:.3}) on {} for ({:.3}, {:.3})",
            self.vessel.craft,
            self.vessel.position.lat,
            self.vessel.position.lon,
            self.config.start_time,
            self.vessel.target.lat,
            self.vessel.target.lon
        );

        let end = self.config.end_time();
        let step = self.config.step_duration();
        while self.current_time < end {
            if self.vessel.distance_to_target_km() < self.config.tolerance_km {
                self.state = VoyageState::Arrived;
                break;
            }

            self.step()?;
            if self.state.is_terminal() {
                break;
            }

            self.current_time += step;
        }
        if !self.state.is_terminal() {
            self.state = VoyageState::TimedOut;
        }

        info!(
            "{} finished as {} after {:.2} h and {:.1} km, {:.1} km from target",
            self.vessel.craft,
            self.state.as_str(),
            (self.current_time - self.config.start_time).num_seconds() as f64 / 3600.0,
            self.vessel.distance_km,
            self.vessel.distance_to_target_km()
        );
        Ok(self.state)
    }

    pub fn finish(self) -> VoyageOutcome {
        VoyageOutcome {
            launch: self.vessel.trajectory.first().copied().unwrap_or(self.vessel.position),
            start_time: self.config.start_time,
            end_time: self.current_time,
            steps: self.steps,
            state: self.state,
            vessel: self.vessel,
            config: self.config,
            log: self.log,
        }
    }
}

/// Everything recorded about a finished voyage.
#[derive(Debug, Clone)]
pub struct VoyageOutcome {
    pub vessel: Vessel,
    pub launch: Coordinate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub steps: usize,
    pub state: VoyageState,
    pub config: VoyageConfig,
    pub log: VoyageLog,
}

impl VoyageOutcome {
    pub fn duration_hours(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 3_600_000.0
    }

    /// NaN for a voyage that never left
    pub fn mean_speed_kmh(&self) -> f64 {
        let hours = self.duration_hours();
        if hours > 0.0 { self.vessel.distance_km / hours } else { f64::NAN }
    }

    pub fn mean_speed_ms(&self) -> f64 {
        self.mean_speed_kmh() / 3.6
    }

    pub fn distance_to_target_km(&self) -> f64 {
        self.vessel.distance_to_target_km()
    }

    pub fn is_completed(&self) -> bool {
        self.state == VoyageState::Arrived
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::mask::LandRaster;
    use crate::engine::models::Landmark;
    use crate::engine::physics::PerformanceModel;
    use crate::parsers::polars::PolarTable;
    use chrono::TimeZone;
    use std::sync::Arc;

    /// Uniform conditions, land north of a latitude, data up to a time, and
    /// whatever the radar should report.
    pub(crate) struct StubEnvironment {
        pub wind: WindData,
        pub current: CurrentData,
        pub waves: f64,
        pub land_north_of: f64,
        pub data_until: Option<DateTime<Utc>>,
        pub nearest_land: Option<Landmark>,
    }

    impl Default for StubEnvironment {
        fn default() -> Self {
            Self {
                wind: WindData::calm(),
                current: CurrentData::still(),
                waves: 1.0,
                land_north_of: 90.0,
                data_until: None,
                nearest_land: None,
            }
        }
    }

    impl StubEnvironment {
        fn has_data(&self, time: DateTime<Utc>) -> bool {
            self.data_until.is_none_or(|until| time <= until)
        }
    }

    impl EnvironmentStore for StubEnvironment {
        fn local_wind(&self, _location: &Coordinate, time: DateTime<Utc>) -> Option<WindData> {
            self.has_data(time).then_some(self.wind)
        }

        fn local_current(&self, location: &Coordinate, time: DateTime<Utc>, averaged: bool) -> CurrentSample {
            if !self.has_data(time) {
                CurrentSample::NoData
            } else if !averaged && location.lat >= self.land_north_of {
                CurrentSample::Land
            } else {
                CurrentSample::Flow(self.current)
            }
        }

        fn local_wave_height(&self, _location: &Coordinate, time: DateTime<Utc>) -> Option<f64> {
            self.has_data(time).then_some(self.waves)
        }

        fn nearest_land(&self, _location: &Coordinate, _radius: f64) -> Option<Landmark> {
            self.nearest_land
        }

        fn nearest_water(&self, location: &Coordinate, _radius: f64) -> Option<Coordinate> {
            Some(*location)
        }

        fn land_mask_raster(&self, _time: DateTime<Utc>) -> Option<LandRaster> {
            None
        }
    }

    pub(crate) fn departure() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1995, 3, 3, 8, 0, 0).unwrap()
    }

    /// Paddles 3.402 km per 15 min step in any conditions
    pub(crate) fn kayak(target: Coordinate) -> Vessel {
        let model = PerformanceModel::new(PolarTable::uniform(7.3476), PolarTable::uniform(0.0));
        Vessel::new("Hjortspring", Coordinate::new(58.0, 12.0), target).with_performance(Arc::new(model))
    }

    #[test]
    fn test_start_within_tolerance_arrives() {
        let env = StubEnvironment::default();
        let mut voyage = Voyage::new(&env, kayak(Coordinate::new(58.01, 12.0)), VoyageConfig::starting_at(departure())).unwrap();
        assert_eq!(voyage.run().unwrap(), VoyageState::Arrived);

        let outcome = voyage.finish();
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.vessel.trajectory.len(), 1);
        assert_eq!(outcome.end_time, outcome.start_time);
        assert!(outcome.mean_speed_kmh().is_nan());
    }

    #[test]
    fn test_grounded_on_first_step() {
        let env = StubEnvironment { land_north_of: 57.9, ..Default::default() };
        let mut voyage = Voyage::new(&env, kayak(Coordinate::new(59.0, 12.0)), VoyageConfig::starting_at(departure())).unwrap();
        assert_eq!(voyage.run().unwrap(), VoyageState::Grounded);

        let outcome = voyage.finish();
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.vessel.trajectory, vec![Coordinate::new(58.0, 12.0)]);
        assert!(outcome.vessel.has_hit_land);
        assert!(outcome.log.winds.is_empty());
    }

    #[test]
    fn test_arrives_after_paddling() {
        let env = StubEnvironment::default();
        let mut voyage = Voyage::new(&env, kayak(Coordinate::new(58.1, 12.0)), VoyageConfig::starting_at(departure())).unwrap();
        assert_eq!(voyage.run().unwrap(), VoyageState::Arrived);

        let outcome = voyage.finish();
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.end_time - outcome.start_time, Duration::minutes(45));
        assert!((outcome.vessel.distance_km - 3.0 * 3.402).abs() < 0.01);
        assert!(outcome.distance_to_target_km() < 3.0);
        assert!((outcome.mean_speed_kmh() - 3.0 * 3.402 / 0.75).abs() < 0.02);
        assert_eq!(outcome.log.winds.len(), 3);
    }

    #[test]
    fn test_times_out_without_progress() {
        let env = StubEnvironment::default();
        let model = PerformanceModel::new(PolarTable::uniform(0.0), PolarTable::uniform(0.0));
        let vessel = Vessel::new("Hjortspring", Coordinate::new(58.0, 12.0), Coordinate::new(59.0, 12.0))
            .with_performance(Arc::new(model));
        let config = VoyageConfig { max_duration_hours: 2.0, ..VoyageConfig::starting_at(departure()) };

        let mut voyage = Voyage::new(&env, vessel, config).unwrap();
        assert_eq!(voyage.run().unwrap(), VoyageState::TimedOut);
        assert_eq!(voyage.current_time() - departure(), Duration::hours(2));

        let outcome = voyage.finish();
        assert_eq!(outcome.steps, 8);
        assert_eq!(outcome.vessel.trajectory.len(), 9);
        assert!(outcome.vessel.distance_km.abs() < 1e-9);
    }

    #[test]
    fn test_night_stops_hold_position() {
        let env = StubEnvironment::default();
        let evening = Utc.with_ymd_and_hms(1995, 3, 3, 19, 0, 0).unwrap();
        let config = VoyageConfig {
            max_duration_hours: 3.0,
            stop_at_night: true,
            ..VoyageConfig::starting_at(evening)
        };
        let mut voyage = Voyage::new(&env, kayak(Coordinate::new(59.0, 12.0)), config).unwrap();
        assert_eq!(voyage.run().unwrap(), VoyageState::TimedOut);

        let outcome = voyage.finish();
        assert_eq!(outcome.steps, 12);
        assert_eq!(outcome.vessel.trajectory.len(), 1);
        assert_eq!(outcome.log.stops, vec![NightStop { time: evening, position: Coordinate::new(58.0, 12.0) }]);
        assert_eq!(outcome.log.waves.len(), 12);
    }

    #[test]
    fn test_runs_out_of_data() {
        let env = StubEnvironment { data_until: Some(departure() + Duration::minutes(30)), ..Default::default() };
        let mut voyage = Voyage::new(&env, kayak(Coordinate::new(59.0, 12.0)), VoyageConfig::starting_at(departure())).unwrap();
        assert_eq!(voyage.run().unwrap(), VoyageState::OutOfData);

        let outcome = voyage.finish();
        assert_eq!(outcome.vessel.trajectory.len(), 4);
        assert_eq!(outcome.end_time - outcome.start_time, Duration::minutes(45));
        assert!(!outcome.vessel.has_hit_land);
    }

    #[test]
    fn test_land_radar_steers_away() {
        // Land 5 km away, 10 deg right of the northbound course
        let env = StubEnvironment {
            nearest_land: Some(Landmark { distance_km: 5.0, bearing: 10.0 }),
            ..Default::default()
        };
        let config = VoyageConfig { max_duration_hours: 0.25, ..VoyageConfig::starting_at(departure()) };
        let target = Coordinate::new(59.0, 12.0);

        let mut voyage = Voyage::new(&env, kayak(target), config.clone()).unwrap();
        assert_eq!(voyage.run().unwrap(), VoyageState::TimedOut);
        let vessel = voyage.vessel();
        assert_eq!(vessel.nominal_bearings.len(), 1);
        assert!(vessel.nominal_bearings[0].abs() < 1e-6);
        assert!((vessel.modified_bearings[0] - 270.0).abs() < 1e-6);
        assert!(vessel.position.lat < 58.0 + 1e-6);
        assert!(vessel.position.lon < 12.0);

        let mut voyage = Voyage::new(&env, kayak(target).with_land_radar(false), config).unwrap();
        assert_eq!(voyage.run().unwrap(), VoyageState::TimedOut);
        let vessel = voyage.vessel();
        assert!(vessel.modified_bearings[0].abs() < 1e-6);
        assert!(vessel.position.lat > 58.02);
    }

    #[test]
    fn test_missing_performance_model_aborts() {
        let env = StubEnvironment::default();
        let vessel = Vessel::new("Hjortspring", Coordinate::new(58.0, 12.0), Coordinate::new(59.0, 12.0));
        let mut voyage = Voyage::new(&env, vessel, VoyageConfig::starting_at(departure())).unwrap();
        let err = voyage.run().unwrap_err();
        assert_eq!(err, SimulationError::MissingPerformanceModel { craft: "Hjortspring".into() });
    }

    #[test]
    fn test_config_validation() {
        let config = VoyageConfig { step_minutes: 0.0, ..VoyageConfig::starting_at(departure()) };
        let env = StubEnvironment::default();
        assert!(Voyage::new(&env, kayak(Coordinate::new(59.0, 12.0)), config).is_err());
    }
}
