use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};

use paddle_voyage::SimulationError;
use paddle_voyage::config::SimulationConfig;
use paddle_voyage::engine::batch::{VoyagePlan, run_departures};
use paddle_voyage::engine::ephemeris::start_of_day;
use paddle_voyage::engine::physics::PerformanceModel;
use paddle_voyage::engine::router::{plan_route, snap_to_water};
use paddle_voyage::engine::voyage::VoyageState;
use paddle_voyage::export::aggregates::{AggregateRecord, append_to_csv};
use paddle_voyage::export::geojson::write_geojson;
use paddle_voyage::parsers::dataset::load_environment;
use paddle_voyage::parsers::polars::PolarTable;

/// Simulates paddled crossings over historical wind, current and wave data
#[derive(Parser, Debug)]
#[command(name = "paddle-voyage", version, about)]
struct Cli {
    /// Simulation configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Number of consecutive departure days, overriding the configuration
    #[arg(long)]
    days: Option<usize>,

    /// Output directory, overriding the configuration
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let cli = Cli::parse();

    let mut config = SimulationConfig::load(&cli.config)?;
    if let Some(days) = cli.days {
        config.departure_days = days;
    }
    if let Some(output) = cli.output {
        config.output_dir = output;
    }
    config.validate()?;

    let speed = PolarTable::load_from_csv(&config.speed_polar)?;
    let leeway = PolarTable::load_from_csv(&config.leeway_polar)?;
    speed.warn_on_non_monotonic("speed");
    let performance = Arc::new(PerformanceModel::new(speed, leeway));

    let (earliest, latest) = config.data_window();
    let env = load_environment(&config.datasets, config.bbox, earliest, latest)?;

    let launch = snap_to_water(&env, &config.launching_site, earliest);
    let landing = snap_to_water(&env, &config.landing_site, earliest);

    let route = match &config.route {
        Some(route_config) => match plan_route(&env, earliest, &launch, &landing, route_config) {
            Ok(route) => Some(route),
            Err(e @ SimulationError::NoRouteFound { .. }) => {
                warn!("{e}; sailing without a route");
                None
            }
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let departures: Vec<_> = config
        .departure_dates()
        .into_iter()
        .map(|date| start_of_day(date, &launch, config.twilight))
        .collect();

    let plan = VoyagePlan {
        craft: config.craft.clone(),
        launch,
        landing,
        performance,
        route,
        land_radar: config.land_radar,
        navigation_sigma: config.navigation_error_sigma,
        seed: config.seed,
        voyage: config.voyage_config(earliest),
    };

    let aggregates_path = config.output_dir.join("aggregates.csv");
    let mut arrivals = 0;
    let total = departures.len();
    for result in run_departures(&env, &plan, &departures) {
        let outcome = result?;
        let date = outcome.start_time.format("%Y-%m-%d");
        write_geojson(&outcome, &config.output_dir.join(format!("{}_{date}.json", config.craft)))?;
        append_to_csv(&aggregates_path, &AggregateRecord::from_outcome(&outcome, config.success_radius_km))?;
        if outcome.state == VoyageState::Arrived {
            arrivals += 1;
        }
    }

    info!("{arrivals} of {total} voyages reached the landing site");
    Ok(())
}
