use std::sync::Arc;

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::engine::geodesy::{
    angle_difference, angle_to_unit_vector, bearing, destination, direction_from_vector,
    distance_km, normalize_bearing,
};
use crate::engine::models::{Coordinate, CurrentData, Landmark, WindData};
use crate::engine::physics::PerformanceModel;
use crate::error::SimulationError;

/// Land closer than this (km) triggers the avoidance manoeuvre.
pub const LAND_RADAR_RANGE_KM: f64 = 20.0;
/// Half-width of the sector considered "ahead" of the bow.
pub const AHEAD_SECTOR_DEG: f64 = 45.0;

/// Eastward and Northward displacement over one step, in km
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    pub east_km: f64,
    pub north_km: f64,
}

impl Displacement {
    pub fn zero() -> Self {
        Self { east_km: 0.0, north_km: 0.0 }
    }

    pub fn magnitude_km(&self) -> f64 {
        (self.east_km.powi(2) + self.north_km.powi(2)).sqrt()
    }

    pub fn direction(&self) -> f64 {
        direction_from_vector(self.east_km, self.north_km)
    }
}

/// A paddled craft heading for a landing site.
#[derive(Debug, Clone)]
pub struct Vessel {
    pub craft: String,
    pub position: Coordinate,
    pub target: Coordinate,
    /// Current heading (deg)
    pub bearing: f64,
    pub land_radar_on: bool,
    navigation_error: Option<Normal<f64>>,
    navigation_sigma: f64,
    rng: StdRng,
    performance: Option<Arc<PerformanceModel>>,
    pub trajectory: Vec<Coordinate>,
    /// Bearings towards the target before any correction
    pub nominal_bearings: Vec<f64>,
    /// Bearings actually steered, after land avoidance and navigation error
    pub modified_bearings: Vec<f64>,
    pub distance_km: f64,
    pub has_hit_land: bool,
    /// Advisory waypoints from the route search
    pub suggested_route: Option<Vec<Coordinate>>,
}

impl Vessel {
    pub fn new(craft: impl Into<String>, position: Coordinate, target: Coordinate) -> Self {
        let initial_bearing = bearing(&position, &target);
        Self {
            craft: craft.into(),
            position,
            target,
            bearing: initial_bearing,
            land_radar_on: true,
            navigation_error: None,
            navigation_sigma: 0.0,
            rng: StdRng::seed_from_u64(0),
            performance: None,
            trajectory: vec![position],
            nominal_bearings: vec![initial_bearing],
            modified_bearings: Vec::new(),
            distance_km: 0.0,
            has_hit_land: false,
            suggested_route: None,
        }
    }

    pub fn with_performance(mut self, performance: Arc<PerformanceModel>) -> Self {
        self.performance = Some(performance);
        self
    }

    pub fn with_land_radar(mut self, enabled: bool) -> Self {
        self.land_radar_on = enabled;
        self
    }

    pub fn with_route(mut self, route: Vec<Coordinate>) -> Self {
        self.suggested_route = Some(route);
        self
    }

    /// Zero-mean Gaussian heading error with standard deviation `sigma` (deg).
    /// A sigma of zero keeps the vessel deterministic.
    pub fn with_navigation_error(mut self, sigma: f64, seed: u64) -> Result<Self, SimulationError> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(SimulationError::invalid(format!(
                "navigation error sigma must be finite and non-negative, got {sigma}"
            )));
        }
        self.navigation_error = if sigma > 0.0 {
            let normal = Normal::new(0.0, sigma)
                .map_err(|e| SimulationError::invalid(format!("navigation error: {e}")))?;
            Some(normal)
        } else {
            None
        };
        self.navigation_sigma = sigma;
        self.rng = StdRng::seed_from_u64(seed);
        Ok(self)
    }

    pub fn navigation_sigma(&self) -> f64 {
        self.navigation_sigma
    }

    pub fn steps_taken(&self) -> usize {
        self.trajectory.len() - 1
    }

    pub fn distance_to_target_km(&self) -> f64 {
        distance_km(&self.position, &self.target)
    }

    /// Displacement over one step steered at `heading`, from paddling, leeway and drift.
    pub fn displacement(
        &self,
        wind: &WindData,
        current: &CurrentData,
        heading: f64,
        step_minutes: f64,
    ) -> Result<Displacement, SimulationError> {
        let performance = self.performance.as_ref().ok_or_else(|| {
            SimulationError::MissingPerformanceModel { craft: self.craft.clone() }
        })?;

        let paddling_speed = performance.speed(wind, heading)?;
        let leeway = performance.leeway(wind, heading)?;
        let (dx, dy) = angle_to_unit_vector(heading - leeway);

        let step_seconds = step_minutes * 60.0;
        // metres
        let paddled_x = paddling_speed * dx * step_seconds;
        let paddled_y = paddling_speed * dy * step_seconds;
        let drift_x = current.u * step_seconds;
        let drift_y = current.v * step_seconds;

        Ok(Displacement {
            east_km: (paddled_x + drift_x) / 1000.0,
            north_km: (paddled_y + drift_y) / 1000.0,
        })
    }

    /// Heading after the land radar had its say: land inside the ahead sector
    /// within radar range makes the crew turn 90 deg away from it, or turn back
    /// when it lies dead ahead. Close to the target the crew keeps going.
    pub fn avoid_land(&self, heading: f64, landmark: Option<Landmark>, tolerance_km: f64) -> f64 {
        let Some(land) = landmark else {
            return heading;
        };
        if land.distance_km >= LAND_RADAR_RANGE_KM || self.distance_to_target_km() <= tolerance_km {
            return heading;
        }

        let land_is_ahead = angle_difference(heading, land.bearing).abs() <= AHEAD_SECTOR_DEG;
        if !land_is_ahead {
            return heading;
        }

        // heading - land bearing, wrapped into (-180, 180]; positive: land on the left, so steer right
        let side = angle_difference(land.bearing, heading);
        let corrected = if side > 0.0 {
            heading + 90.0
        } else if side < 0.0 {
            heading - 90.0
        } else {
            heading + 180.0
        };
        normalize_bearing(corrected)
    }

    /// Advances the vessel by one step. Does nothing once the vessel has hit land.
    pub fn move_step(
        &mut self,
        landmark: Option<Landmark>,
        wind: &WindData,
        current: &CurrentData,
        step_minutes: f64,
        tolerance_km: f64,
    ) -> Result<Displacement, SimulationError> {
        if self.has_hit_land {
            return Ok(Displacement::zero());
        }
        if self.performance.is_none() {
            return Err(SimulationError::MissingPerformanceModel { craft: self.craft.clone() });
        }

        self.bearing = bearing(&self.position, &self.target);
        self.nominal_bearings.push(self.bearing);

        self.bearing = self.avoid_land(self.bearing, landmark, tolerance_km);

        let error = match &self.navigation_error {
            Some(normal) => normal.sample(&mut self.rng),
            None => 0.0,
        };
        let steered = normalize_bearing(self.bearing + error);
        self.modified_bearings.push(steered);

        let displacement = self.displacement(wind, current, steered, step_minutes)?;
        let distance = displacement.magnitude_km();
        let new_position = destination(&self.position, displacement.direction(), distance);

        debug!(
            "{} moved {:.3} km towards {:.1} deg (steered {:.1} deg)",
            self.craft,
            distance,
            displacement.direction(),
            steered
        );

        self.position = new_position;
        self.trajectory.push(new_position);
        self.distance_km += distance;

        Ok(displacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::geodesy::knots_to_si;
    use crate::parsers::polars::PolarTable;

    /// 7.3476 kn paddled for 15 min covers 3.402 km
    const CALM_SPEED_KN: f64 = 7.3476;

    fn uniform_model(speed_kn: f64, leeway_deg: f64) -> Arc<PerformanceModel> {
        Arc::new(PerformanceModel::new(
            PolarTable::uniform(speed_kn),
            PolarTable::uniform(leeway_deg),
        ))
    }

    fn boat_heading_north() -> Vessel {
        Vessel::new("Hjortspring", Coordinate::new(58.0, 12.0), Coordinate::new(59.0, 12.0))
            .with_performance(uniform_model(CALM_SPEED_KN, 0.0))
    }

    #[test]
    fn test_new_vessel_state() {
        let boat = boat_heading_north();
        assert_eq!(boat.trajectory, vec![Coordinate::new(58.0, 12.0)]);
        assert_eq!(boat.nominal_bearings, vec![0.0]);
        assert!(boat.modified_bearings.is_empty());
        assert_eq!(boat.steps_taken(), 0);
        assert_eq!(boat.distance_km, 0.0);
        assert!(!boat.has_hit_land);
    }

    #[test]
    fn test_calm_displacement_north() {
        let boat = boat_heading_north();
        let d = boat
            .displacement(&WindData::calm(), &CurrentData::still(), 0.0, 15.0)
            .unwrap();
        assert!((d.north_km - 3.402).abs() < 1e-3, "north {}", d.north_km);
        assert!(d.east_km.abs() < 1e-9, "east {}", d.east_km);
    }

    #[test]
    fn test_cardinal_displacements() {
        let boat = boat_heading_north();
        for (heading, east_sign, north_sign) in
            [(0.0, 0.0, 1.0), (90.0, 1.0, 0.0), (180.0, 0.0, -1.0), (270.0, -1.0, 0.0)]
        {
            let d = boat
                .displacement(&WindData::calm(), &CurrentData::still(), heading, 15.0)
                .unwrap();
            let (dominant, orthogonal, sign) = if east_sign != 0.0 {
                (d.east_km, d.north_km, east_sign)
            } else {
                (d.north_km, d.east_km, north_sign)
            };
            assert!(dominant * sign > 3.0, "heading {heading}: {d:?}");
            assert!(orthogonal.abs() < 1e-9, "heading {heading}: {d:?}");
        }
    }

    #[test]
    fn test_current_adds_drift() {
        let boat = Vessel::new("drifter", Coordinate::new(58.0, 12.0), Coordinate::new(59.0, 12.0))
            .with_performance(uniform_model(0.0, 0.0));
        let d = boat
            .displacement(&WindData::calm(), &CurrentData::new(1.0, 0.0), 0.0, 10.0)
            .unwrap();
        assert!((d.east_km - 0.6).abs() < 1e-12);
        assert!(d.north_km.abs() < 1e-12);
        assert!((d.direction() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_leeway_deflects_course() {
        let boat = Vessel::new("leeway", Coordinate::new(58.0, 12.0), Coordinate::new(59.0, 12.0))
            .with_performance(uniform_model(CALM_SPEED_KN, 10.0));
        // Wind from the right (East) while heading North pushes the course to port
        let wind = WindData::new(knots_to_si(10.0), 90.0);
        let d = boat.displacement(&wind, &CurrentData::still(), 0.0, 15.0).unwrap();
        assert!((d.direction() - 350.0).abs() < 1e-6, "direction {}", d.direction());
    }

    #[test]
    fn test_move_step_updates_track() {
        let mut boat = boat_heading_north();
        let d = boat
            .move_step(None, &WindData::calm(), &CurrentData::still(), 15.0, 3.0)
            .unwrap();

        assert_eq!(boat.trajectory.len(), 2);
        assert_eq!(boat.steps_taken(), 1);
        assert_eq!(boat.nominal_bearings.len(), 2);
        assert_eq!(boat.modified_bearings, vec![0.0]);
        assert!((boat.distance_km - d.magnitude_km()).abs() < 1e-12);
        assert!(boat.position.lat > 58.0);
        assert!((boat.position.lon - 12.0).abs() < 1e-9);
        assert!((distance_km(&Coordinate::new(58.0, 12.0), &boat.position) - 3.402).abs() < 1e-3);
    }

    #[test]
    fn test_move_without_polars_fails() {
        let mut boat = Vessel::new("bare", Coordinate::new(58.0, 12.0), Coordinate::new(59.0, 12.0));
        let err = boat
            .move_step(None, &WindData::calm(), &CurrentData::still(), 15.0, 3.0)
            .unwrap_err();
        assert_eq!(err, SimulationError::MissingPerformanceModel { craft: "bare".to_string() });
        assert_eq!(boat.trajectory.len(), 1);
        assert_eq!(boat.nominal_bearings.len(), 1);
    }

    #[test]
    fn test_grounded_vessel_stays_put() {
        let mut boat = boat_heading_north();
        boat.has_hit_land = true;
        let d = boat
            .move_step(None, &WindData::calm(), &CurrentData::still(), 15.0, 3.0)
            .unwrap();
        assert_eq!(d, Displacement::zero());
        assert_eq!(boat.trajectory.len(), 1);
    }

    #[test]
    fn test_land_ahead_on_the_left_steers_right() {
        let boat = boat_heading_north();
        let land = Landmark { distance_km: 5.0, bearing: 350.0 };
        assert_eq!(boat.avoid_land(0.0, Some(land), 3.0), 90.0);
    }

    #[test]
    fn test_land_ahead_on_the_right_steers_left() {
        let boat = boat_heading_north();
        let land = Landmark { distance_km: 5.0, bearing: 30.0 };
        assert_eq!(boat.avoid_land(0.0, Some(land), 3.0), 270.0);
    }

    #[test]
    fn test_land_dead_ahead_turns_back() {
        let boat = boat_heading_north();
        let land = Landmark { distance_km: 5.0, bearing: 0.0 };
        assert_eq!(boat.avoid_land(0.0, Some(land), 3.0), 180.0);
    }

    #[test]
    fn test_land_abeam_or_far_is_ignored() {
        let boat = boat_heading_north();
        let abeam = Landmark { distance_km: 5.0, bearing: 90.0 };
        assert_eq!(boat.avoid_land(0.0, Some(abeam), 3.0), 0.0);
        let far = Landmark { distance_km: 25.0, bearing: 0.0 };
        assert_eq!(boat.avoid_land(0.0, Some(far), 3.0), 0.0);
        assert_eq!(boat.avoid_land(0.0, None, 3.0), 0.0);
    }

    #[test]
    fn test_land_near_target_is_not_avoided() {
        // Target 111 km away: a tolerance beyond that means the crew heads for the landing
        let boat = boat_heading_north();
        let land = Landmark { distance_km: 5.0, bearing: 0.0 };
        assert_eq!(boat.avoid_land(0.0, Some(land), 200.0), 0.0);
    }

    #[test]
    fn test_ahead_sector_wraps_north() {
        let boat = boat_heading_north();
        let land = Landmark { distance_km: 5.0, bearing: 20.0 };
        assert_eq!(boat.avoid_land(350.0, Some(land), 3.0), 260.0);
    }

    #[test]
    fn test_navigation_error_is_seeded() {
        let make = || {
            boat_heading_north()
                .with_navigation_error(5.0, 42)
                .unwrap()
        };
        let mut a = make();
        let mut b = make();
        for _ in 0..3 {
            a.move_step(None, &WindData::calm(), &CurrentData::still(), 15.0, 3.0).unwrap();
            b.move_step(None, &WindData::calm(), &CurrentData::still(), 15.0, 3.0).unwrap();
        }
        assert_eq!(a.modified_bearings, b.modified_bearings);
        assert!(a.modified_bearings.iter().any(|&m| m != 0.0));
    }

    #[test]
    fn test_negative_sigma_is_rejected() {
        let err = boat_heading_north().with_navigation_error(-1.0, 0).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidInput(_)));
    }
}
