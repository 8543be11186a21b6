//! I/O adapters for feature preparation.
//!
//! Everything here is a thin boundary around the core cleaning and
//! enrichment engines:
//!
//! - **dataset**: CSV and parquet loading into DataFrames
//! - **json**: flattening JSON-object columns into structured sub-columns
//! - **export**: header-less CSV export of aligned feature matrices

pub mod dataset;
pub mod export;
pub mod json;

pub use dataset::{read_csv_file, read_parquet_dir, read_parquet_file};
pub use export::write_feature_csv;
pub use json::flatten_json_column;
