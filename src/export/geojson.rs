use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde_json::{Value, json};

use crate::engine::models::Coordinate;
use crate::engine::voyage::VoyageOutcome;
use crate::export::ExportError;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// GeoJSON positions are [lon, lat]
fn position(coord: &Coordinate) -> Value {
    json!([coord.lon, coord.lat])
}

/// FeatureCollection holding the track as a LineString and the voyage record
/// as its properties.
pub fn voyage_feature_collection(outcome: &VoyageOutcome) -> Value {
    let vessel = &outcome.vessel;
    let log = &outcome.log;

    let winds: Vec<Value> = log
        .winds
        .iter()
        .map(|w| w.map_or(Value::Null, |w| json!([w.speed, w.direction])))
        .collect();
    let currents: Vec<Value> = log
        .currents
        .iter()
        .map(|c| c.map_or(Value::Null, |c| json!([c.u, c.v])))
        .collect();
    let route: Option<Vec<Value>> = vessel
        .suggested_route
        .as_ref()
        .map(|route| route.iter().map(position).collect());

    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": vessel.trajectory.iter().map(position).collect::<Vec<_>>(),
            },
            "properties": {
                "craft": vessel.craft,
                "start_date": outcome.start_time.format(TIME_FORMAT).to_string(),
                "stop_date": outcome.end_time.format(TIME_FORMAT).to_string(),
                "timestep_min": outcome.config.step_minutes,
                "distance_km": vessel.distance_km,
                "duration_h": outcome.duration_hours(),
                "mean_speed_kmh": outcome.mean_speed_kmh(),
                "mean_speed_ms": outcome.mean_speed_ms(),
                "nominal_bearings": vessel.nominal_bearings,
                "modified_bearings": vessel.modified_bearings,
                "launching_site": position(&outcome.launch),
                "landing_site": position(&vessel.target),
                "night_stops": outcome.config.stop_at_night,
                "twilight_convention": outcome.config.twilight.as_str(),
                "route": route,
                "trip_winds": winds,
                "trip_currents": currents,
                "trip_waves": log.waves,
                "stop_times": log.stops.iter().map(|s| s.time.format(TIME_FORMAT).to_string()).collect::<Vec<_>>(),
                "stop_coords": log.stops.iter().map(|s| position(&s.position)).collect::<Vec<_>>(),
                "hit_land": vessel.has_hit_land,
                "is_completed": outcome.is_completed(),
                "state": outcome.state.as_str(),
            }
        }]
    })
}

pub fn write_geojson(outcome: &VoyageOutcome, path: &Path) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    serde_json::to_writer_pretty(&mut writer, &voyage_feature_collection(outcome))
        .map_err(|source| ExportError::Json { path: path.to_path_buf(), source })?;
    writer.flush().map_err(io_error)?;
    info!("Wrote {}", path.display());
    Ok(())
}
