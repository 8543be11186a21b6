//! Stateful column cleaning for ML feature preparation.
//!
//! This crate converts raw table columns into model-ready numeric form with
//! reproducible statistics:
//!
//! - **transformer**: per-column transformers in two phases, a spec
//!   (hyperparameters) and a fitted form (frozen statistics or vocabulary)
//! - **cleaner**: the [`TableCleaner`] registry orchestrating fit,
//!   transform, noise injection, splitting and column alignment
//!
//! A cleaner fitted during training serializes to a small JSON document and
//! reconstructs for inference with byte-identical cleaning behavior.

pub mod cleaner;
pub mod transformer;

pub use cleaner::TableCleaner;
pub use transformer::{
    CategoricalOptions, CategoricalSpec, FittedCategorical, FittedNumerical, FittedTransformer,
    NumericalOptions, NumericalSpec, Transformer, TransformerSpec,
};

// Re-export the model vocabulary so callers need only this crate.
pub use mlprep_model::{CategoricalMethod, ImputeStrategy, NumericStats, TransformerState};
