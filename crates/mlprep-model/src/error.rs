//! Error types for data-preparation operations.

use thiserror::Error;

/// Errors surfaced by cleaning and enrichment operations.
///
/// None of these are retried anywhere: every operation is a deterministic
/// transformation over in-memory data, so a failure is always a caller or
/// configuration problem.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Invalid static configuration, e.g. an unknown impute strategy.
    #[error("config error: {0}")]
    Config(String),

    /// A declared join key or required column is absent from a table.
    #[error("schema error: {0}")]
    Schema(String),

    /// A non-core join changed the base row count. This signals a
    /// key-uniqueness violation and must never be tolerated silently:
    /// tolerating it would corrupt row-to-label alignment.
    #[error("join with '{table}' changed base row count: {before} -> {after}")]
    JoinIntegrity {
        table: String,
        before: usize,
        after: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}

pub type Result<T> = std::result::Result<T, PrepError>;
