pub mod dataset;
pub mod polars;
