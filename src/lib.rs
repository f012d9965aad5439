pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod parsers;

pub use error::SimulationError;
