//! Shared model types for ML data preparation.
//!
//! This crate provides the pieces every other crate in the workspace builds on:
//!
//! - **error**: the `PrepError` taxonomy and `Result` alias
//! - **state**: persisted fit-state documents for transformers and the
//!   star-schema enricher, the sole mechanism for training/inference parity

pub mod error;
pub mod state;

pub use error::{PrepError, Result};
pub use state::{
    CategoricalMethod, EnricherState, ImputeStrategy, NumericStats, TransformerState,
};
