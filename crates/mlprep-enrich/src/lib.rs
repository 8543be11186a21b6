//! Star-schema enrichment for ML feature preparation.
//!
//! A [`StarSchema`] holds a registry of secondary tables and derived-column
//! calculations, cleans everything through one owned
//! [`mlprep_clean::TableCleaner`], and answers: given a base fact table,
//! what is its fully joined, cleaned feature representation, and how much
//! can it grow.

pub mod join;
pub mod schema;

pub use schema::{Calculation, Enriched, RegisteredTable, StarSchema, TableOptions};
