//! Monthly gridded datasets on disk.
//!
//! Each month is one JSON document at `<root>/<year>/month_<month>.json`,
//! optionally xz-compressed as `month_<month>.json.xz`:
//!
//! ```json
//! {
//!   "latitudes": [57.0, 57.1],
//!   "longitudes": [8.0, 8.1, 8.2],
//!   "times": ["1995-03-01T00:00:00Z"],
//!   "variables": { "uo": [0.1, 0.2, null, 0.1, 0.0, null] }
//! }
//! ```
//!
//! Variables are flattened `[time][lat][lon]`; `null` marks undefined cells.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::engine::environment::GriddedEnvironment;
use crate::engine::field::{FieldError, GriddedField};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dataset {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("no data file for {year}-{month:02} under {}", .root.display())]
    MissingMonth { root: PathBuf, year: i32, month: u32 },
    #[error("no data under {} between {earliest} and {latest} inside the bounding box", .root.display())]
    NoData {
        root: PathBuf,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

/// Geographic area to keep from the datasets (signed longitudes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn is_valid(&self) -> bool {
        self.min_lat < self.max_lat && self.min_lon < self.max_lon
    }
}

/// Dataset roots of the three sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPaths {
    pub winds: PathBuf,
    pub currents: PathBuf,
    #[serde(default)]
    pub waves: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct FieldDocument {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    times: Vec<DateTime<Utc>>,
    variables: HashMap<String, Vec<Option<f32>>>,
}

fn is_xz(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "xz")
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DatasetError + '_ {
    move |source| DatasetError::Io { path: path.to_path_buf(), source }
}

/// Reads one month file, plain or xz-compressed.
pub fn read_field_file(path: &Path) -> Result<GriddedField, DatasetError> {
    info!("Loading dataset {}", path.display());
    let file = File::open(path).map_err(io_error(path))?;
    let reader: Box<dyn Read> = if is_xz(path) {
        Box::new(XzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let document: FieldDocument = serde_json::from_reader(reader)
        .map_err(|source| DatasetError::Json { path: path.to_path_buf(), source })?;
    let variables = document
        .variables
        .into_iter()
        .map(|(name, values)| (name, values.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect()))
        .collect();

    Ok(GriddedField::new(document.latitudes, document.longitudes, document.times, variables)?)
}

/// Writes a field in the month-file layout, compressing when the path ends in `.xz`.
pub fn write_field_file(path: &Path, field: &GriddedField) -> Result<(), DatasetError> {
    let document = FieldDocument {
        latitudes: field.latitudes().to_vec(),
        longitudes: field.longitudes().to_vec(),
        times: field.times().to_vec(),
        variables: field
            .variable_names()
            .filter_map(|name| {
                let values = field.values(name)?;
                let values = values.iter().map(|v| if v.is_nan() { None } else { Some(*v) }).collect();
                Some((name.to_string(), values))
            })
            .collect(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(path))?;
    }
    let file = BufWriter::new(File::create(path).map_err(io_error(path))?);
    let json_error = |source| DatasetError::Json { path: path.to_path_buf(), source };
    if is_xz(path) {
        let mut encoder = XzEncoder::new(file, 6);
        serde_json::to_writer(&mut encoder, &document).map_err(json_error)?;
        encoder.finish().and_then(|mut inner| inner.flush()).map_err(io_error(path))
    } else {
        let mut writer = file;
        serde_json::to_writer(&mut writer, &document).map_err(json_error)?;
        writer.flush().map_err(io_error(path))
    }
}

/// Loads the months overlapping a time window from one dataset root.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    root: PathBuf,
    bbox: BoundingBox,
}

impl DatasetLoader {
    pub fn new(root: impl Into<PathBuf>, bbox: BoundingBox) -> Self {
        Self { root: root.into(), bbox }
    }

    pub fn month_path(&self, year: i32, month: u32) -> PathBuf {
        self.root.join(year.to_string()).join(format!("month_{month}.json"))
    }

    /// Plain file if present, otherwise its `.xz` sibling.
    fn locate(&self, year: i32, month: u32) -> Option<PathBuf> {
        let plain = self.month_path(year, month);
        if plain.is_file() {
            return Some(plain);
        }
        let compressed = plain.with_extension("json.xz");
        compressed.is_file().then_some(compressed)
    }

    /// Columns inside the bounding box, whatever the longitude convention.
    fn columns(&self, field: &GriddedField) -> Vec<usize> {
        (0..field.longitudes().len())
            .filter(|&col| {
                let lon = field.cell_coordinate(0, col).lon;
                (self.bbox.min_lon..=self.bbox.max_lon).contains(&lon)
            })
            .collect()
    }

    fn crop(
        &self,
        field: &GriddedField,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
    ) -> Result<Option<GriddedField>, DatasetError> {
        let rows = field.lat_range(self.bbox.min_lat, self.bbox.max_lat);
        let cols = self.columns(field);
        let times = field.time_range(earliest, latest);
        if rows.is_empty() || cols.is_empty() || times.is_empty() {
            return Ok(None);
        }
        Ok(Some(field.select(rows, &cols, times)?))
    }

    /// Every month overlapping `[earliest, latest]`, cropped and stitched in
    /// time order. The first month must exist; later missing months are
    /// skipped so that the voyage runs out of data instead of failing.
    pub fn load_window(&self, earliest: DateTime<Utc>, latest: DateTime<Utc>) -> Result<GriddedField, DatasetError> {
        let mut parts = Vec::new();
        for (index, (year, month)) in months_between(earliest, latest).into_iter().enumerate() {
            let Some(path) = self.locate(year, month) else {
                if index == 0 {
                    return Err(DatasetError::MissingMonth { root: self.root.clone(), year, month });
                }
                warn!("No data for {year}-{month:02} under {}, skipping", self.root.display());
                continue;
            };
            if let Some(part) = self.crop(&read_field_file(&path)?, earliest, latest)? {
                parts.push(part);
            }
        }

        if parts.is_empty() {
            return Err(DatasetError::NoData { root: self.root.clone(), earliest, latest });
        }
        let field = GriddedField::concat_time(parts)?;
        let (height, width) = field.shape();
        info!(
            "Loaded {}x{} cells and {} time slices from {}",
            height,
            width,
            field.times().len(),
            self.root.display()
        );
        Ok(field)
    }
}

/// (year, month) pairs from the month of `earliest` to the month of `latest`.
pub fn months_between(earliest: DateTime<Utc>, latest: DateTime<Utc>) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (earliest.year(), earliest.month());
    while (year, month) <= (latest.year(), latest.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

/// Winds, currents and optional waves for a time window.
pub fn load_environment(
    paths: &DatasetPaths,
    bbox: BoundingBox,
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
) -> Result<GriddedEnvironment, DatasetError> {
    let winds = DatasetLoader::new(&paths.winds, bbox).load_window(earliest, latest)?;
    let currents = DatasetLoader::new(&paths.currents, bbox).load_window(earliest, latest)?;
    let waves = match &paths.waves {
        Some(root) => Some(DatasetLoader::new(root, bbox).load_window(earliest, latest)?),
        None => None,
    };
    Ok(GriddedEnvironment::new(winds, currents, waves))
}
