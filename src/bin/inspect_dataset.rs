use std::path::PathBuf;

use clap::Parser;

use paddle_voyage::parsers::dataset::read_field_file;

/// Prints the layout of a monthly dataset file
#[derive(Parser, Debug)]
#[command(name = "inspect_dataset", version, about)]
struct Cli {
    /// Month file (.json or .json.xz)
    path: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    let cli = Cli::parse();

    let field = read_field_file(&cli.path)?;
    let (height, width) = field.shape();
    let lats = field.latitudes();
    let lons = field.longitudes();
    let times = field.times();

    println!("{}", cli.path.display());
    println!("Grid: {height} x {width} ({:?} longitudes)", field.convention());
    if let (Some(first), Some(last)) = (lats.first(), lats.last()) {
        println!("Latitudes: {first} .. {last}");
    }
    if let (Some(first), Some(last)) = (lons.first(), lons.last()) {
        println!("Longitudes: {first} .. {last}");
    }
    if let (Some(first), Some(last)) = (times.first(), times.last()) {
        println!("Times: {} slices, {first} .. {last}", times.len());
    }

    let mut names: Vec<&str> = field.variable_names().collect();
    names.sort_unstable();
    println!("Variables:");
    for name in names {
        let values = field.values(name).unwrap_or_default();
        let undefined = values.iter().filter(|v| v.is_nan()).count();
        let fraction = if values.is_empty() { 0.0 } else { undefined as f64 / values.len() as f64 };
        println!(" - {name}: {:.1}% undefined", fraction * 100.0);
    }

    Ok(())
}
