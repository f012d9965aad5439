use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use rayon::prelude::*;

use crate::engine::environment::EnvironmentStore;
use crate::engine::models::Coordinate;
use crate::engine::physics::PerformanceModel;
use crate::engine::vessel::Vessel;
use crate::engine::voyage::{Voyage, VoyageConfig, VoyageOutcome};
use crate::error::SimulationError;

/// Everything shared by the voyages of a departure series.
#[derive(Debug, Clone)]
pub struct VoyagePlan {
    pub craft: String,
    pub launch: Coordinate,
    pub landing: Coordinate,
    pub performance: Arc<PerformanceModel>,
    pub route: Option<Vec<Coordinate>>,
    pub land_radar: bool,
    pub navigation_sigma: f64,
    /// Base seed; departure `i` uses `seed + i`
    pub seed: u64,
    /// Settings of every voyage; the start time is replaced per departure
    pub voyage: VoyageConfig,
}

impl VoyagePlan {
    pub fn vessel(&self, index: usize) -> Result<Vessel, SimulationError> {
        let vessel = Vessel::new(self.craft.clone(), self.launch, self.landing)
            .with_performance(Arc::clone(&self.performance))
            .with_land_radar(self.land_radar)
            .with_navigation_error(self.navigation_sigma, self.seed.wrapping_add(index as u64))?;
        Ok(match &self.route {
            Some(route) => vessel.with_route(route.clone()),
            None => vessel,
        })
    }

    pub fn run_one<E: EnvironmentStore + ?Sized>(
        &self,
        env: &E,
        start_time: DateTime<Utc>,
        index: usize,
    ) -> Result<VoyageOutcome, SimulationError> {
        let config = VoyageConfig { start_time, ..self.voyage.clone() };
        let mut voyage = Voyage::new(env, self.vessel(index)?, config)?;
        voyage.run()?;
        Ok(voyage.finish())
    }
}

/// Runs one independent voyage per departure time in parallel. Results keep
/// the order of `departures`.
pub fn run_departures<E: EnvironmentStore + Sync + ?Sized>(
    env: &E,
    plan: &VoyagePlan,
    departures: &[DateTime<Utc>],
) -> Vec<Result<VoyageOutcome, SimulationError>> {
    info!("Running {} departures of {}", departures.len(), plan.craft);
    departures
        .par_iter()
        .enumerate()
        .map(|(index, &start)| plan.run_one(env, start, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::voyage::VoyageState;
    use crate::engine::voyage::tests::{StubEnvironment, departure};
    use crate::engine::models::CurrentData;
    use crate::parsers::polars::PolarTable;
    use chrono::Duration;

    fn plan(sigma: f64) -> VoyagePlan {
        VoyagePlan {
            craft: "Hjortspring".into(),
            launch: Coordinate::new(58.0, 12.0),
            landing: Coordinate::new(59.0, 12.0),
            performance: Arc::new(PerformanceModel::new(PolarTable::uniform(4.0), PolarTable::uniform(0.0))),
            route: None,
            land_radar: true,
            navigation_sigma: sigma,
            seed: 42,
            voyage: VoyageConfig { max_duration_hours: 3.0, ..VoyageConfig::starting_at(departure()) },
        }
    }

    fn departures(count: i64) -> Vec<DateTime<Utc>> {
        (0..count).map(|day| departure() + Duration::days(day)).collect()
    }

    #[test]
    fn test_outcomes_follow_departure_order() {
        let env = StubEnvironment::default();
        let starts = departures(4);
        let outcomes = run_departures(&env, &plan(0.0), &starts);

        assert_eq!(outcomes.len(), 4);
        for (outcome, start) in outcomes.iter().zip(&starts) {
            let outcome = outcome.as_ref().unwrap();
            assert_eq!(outcome.start_time, *start);
            assert_eq!(outcome.state, VoyageState::TimedOut);
        }
    }

    #[test]
    fn test_seeds_differ_per_departure_and_repeat() {
        let env = StubEnvironment { current: CurrentData::new(0.0, 0.1), ..Default::default() };
        let starts = departures(2);
        let first = run_departures(&env, &plan(10.0), &starts);
        let again = run_departures(&env, &plan(10.0), &starts);

        let track = |results: &[Result<VoyageOutcome, SimulationError>], i: usize| {
            results[i].as_ref().unwrap().vessel.modified_bearings.clone()
        };
        assert_eq!(track(&first, 0), track(&again, 0));
        assert_eq!(track(&first, 1), track(&again, 1));
        assert_ne!(track(&first, 0), track(&first, 1));
    }

    #[test]
    fn test_invalid_sigma_is_reported_per_voyage() {
        let env = StubEnvironment::default();
        let outcomes = run_departures(&env, &plan(-1.0), &departures(2));
        assert!(outcomes.iter().all(|r| matches!(r, Err(SimulationError::InvalidInput(_)))));
    }
}
