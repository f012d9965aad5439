pub mod batch;
pub mod environment;
pub mod ephemeris;
pub mod field;
pub mod geodesy;
pub mod mask;
pub mod models;
pub mod physics;
pub mod router;
pub mod vessel;
pub mod voyage;
