//! Ordered transformer registry and table-level cleaning operations.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use mlprep_model::{CategoricalMethod, Result, TransformerState};

use crate::transformer::{
    CategoricalOptions, CategoricalSpec, FittedTransformer, Mutation, NumericalOptions,
    NumericalSpec, Transformer, TransformerSpec,
};

/// An ordered registry of column transformers.
///
/// Registration order is the output column order: [`TableCleaner::align`]
/// and [`TableCleaner::transform`] both emit columns in exactly the order
/// the transformers were registered, which is the feature-matrix layout
/// contract downstream trainers depend on.
///
/// Fitting is explicit and one-way: [`TableCleaner::fit`] freezes every
/// still-unfitted transformer whose source column is present, and no other
/// operation mutates fit state. `transform` takes `&self` and is safe for
/// concurrent use once the cleaner is frozen.
#[derive(Debug, Clone, Default)]
pub struct TableCleaner {
    transformers: Vec<Transformer>,
}

impl TableCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered transformers, in registration order.
    pub fn transformers(&self) -> &[Transformer] {
        &self.transformers
    }

    /// Append a numerical transformer. Does not inspect data.
    pub fn register_numerical(&mut self, name: impl Into<String>, options: NumericalOptions) {
        self.transformers
            .push(Transformer::Spec(TransformerSpec::Numerical(NumericalSpec {
                name: name.into(),
                impute: options.impute,
                clip: options.clip,
                mutate_perc: options.mutate_perc,
                mutate_value: options.mutate_value,
            })));
    }

    /// Append a label-encoding transformer. Does not inspect data.
    pub fn register_label(&mut self, name: impl Into<String>, options: CategoricalOptions) {
        self.register_categorical(name.into(), CategoricalMethod::Label, options);
    }

    /// Append a one-hot transformer. Does not inspect data.
    pub fn register_one_hot(&mut self, name: impl Into<String>, options: CategoricalOptions) {
        self.register_categorical(name.into(), CategoricalMethod::OneHot, options);
    }

    fn register_categorical(
        &mut self,
        name: String,
        method: CategoricalMethod,
        options: CategoricalOptions,
    ) {
        let spec = CategoricalSpec {
            name,
            method,
            mutate_perc: options.mutate_perc,
            mutate_value: options.mutate_value,
        };
        // A caller-provided vocabulary freezes the transformer immediately.
        let transformer = if options.categories.is_empty() {
            Transformer::Spec(TransformerSpec::Categorical(spec))
        } else {
            Transformer::Fitted(FittedTransformer::Categorical(spec.freeze(options.categories)))
        };
        self.transformers.push(transformer);
    }

    /// Bulk registration from plain name lists, with default options.
    pub fn register(&mut self, numericals: &[&str], labels: &[&str], one_hots: &[&str]) {
        for name in numericals {
            self.register_numerical(*name, NumericalOptions::default());
        }
        for name in labels {
            self.register_label(*name, CategoricalOptions::default());
        }
        for name in one_hots {
            self.register_one_hot(*name, CategoricalOptions::default());
        }
    }

    /// Every output feature name, in registration order.
    pub fn all_features(&self) -> Vec<String> {
        self.transformers
            .iter()
            .flat_map(Transformer::features)
            .collect()
    }

    /// Names of transformers that have not been fitted yet.
    pub fn unfitted(&self) -> Vec<&str> {
        self.transformers
            .iter()
            .filter(|t| !t.is_fitted())
            .map(Transformer::name)
            .collect()
    }

    /// Fit every still-unfitted transformer whose source column is present.
    ///
    /// Already-fitted transformers keep their frozen state, so repeated
    /// calls are error-free no-ops for them. This is the only operation
    /// that crosses the spec -> fitted edge.
    pub fn fit(&mut self, df: &DataFrame) -> Result<()> {
        for entry in &mut self.transformers {
            let Transformer::Spec(spec) = entry else {
                continue;
            };
            let Ok(column) = df.column(spec.name()) else {
                continue;
            };
            let fitted = spec.clone().fit(column)?;
            *entry = Transformer::Fitted(fitted);
        }
        Ok(())
    }

    /// Clean every registered column present in `df` into a new table, in
    /// registration order. The label column, when requested, is returned
    /// raw from the input table; labels are never cleaned.
    pub fn transform(
        &self,
        df: &DataFrame,
        label: Option<&str>,
    ) -> Result<(DataFrame, Option<Column>)> {
        self.transform_with_options(df, label, true)
    }

    /// [`TableCleaner::transform`] with control over the missing-column
    /// warning; the enricher cleans partial tables routinely and disables
    /// it.
    pub fn transform_with_options(
        &self,
        df: &DataFrame,
        label: Option<&str>,
        warn_missing: bool,
    ) -> Result<(DataFrame, Option<Column>)> {
        let mut columns = Vec::new();
        for entry in &self.transformers {
            let Ok(column) = df.column(entry.name()) else {
                if warn_missing {
                    warn!(column = entry.name(), "column is missing from table, skipping");
                }
                continue;
            };
            match entry {
                Transformer::Fitted(fitted) => columns.extend(fitted.clean(column)?),
                Transformer::Spec(_) => {
                    warn!(column = entry.name(), "transformer is not fitted, skipping");
                }
            }
        }
        let cleaned = DataFrame::new(columns)?;
        let label_column = match label {
            Some(name) => Some(df.column(name)?.clone()),
            None => None,
        };
        Ok((cleaned, label_column))
    }

    /// Fit, then transform. This is the training path: it is the only call
    /// sequence guaranteed to perform statistic/vocabulary discovery, and
    /// every later `transform` reuses the frozen state.
    pub fn fit_transform(
        &mut self,
        df: &DataFrame,
        label: Option<&str>,
    ) -> Result<(DataFrame, Option<Column>)> {
        self.fit(df)?;
        self.transform(df, label)
    }

    /// Replace values with each transformer's sentinel at its configured
    /// rate, one independent draw per row per column. One-hot columns are
    /// exempt. Without a seed every call draws fresh entropy, so repeated
    /// calls differ: this is training-time noise injection, not a
    /// deterministic transform.
    pub fn mutate(&self, df: &DataFrame, seed: Option<u64>) -> Result<DataFrame> {
        let mut rng = seeded_rng(seed);
        let mut df = df.clone();
        for entry in &self.transformers {
            let Some(mutation) = entry.mutation() else {
                continue;
            };
            let replaced = match mutation {
                Mutation::Numerical { perc, value } => {
                    let casted = df.column(entry.name())?.cast(&DataType::Float64)?;
                    let ca = casted.f64()?;
                    let mut values: Vec<Option<f64>> = Vec::with_capacity(ca.len());
                    for opt in ca.into_iter() {
                        if rng.gen_range(0.0..1.0) <= perc {
                            values.push(Some(value));
                        } else {
                            values.push(opt);
                        }
                    }
                    Column::new(entry.name().into(), values)
                }
                Mutation::Label { perc, value } => {
                    let casted = df.column(entry.name())?.cast(&DataType::UInt32)?;
                    let ca = casted.u32()?;
                    let mut values: Vec<Option<u32>> = Vec::with_capacity(ca.len());
                    for opt in ca.into_iter() {
                        if rng.gen_range(0.0..1.0) <= perc {
                            values.push(Some(value));
                        } else {
                            values.push(opt);
                        }
                    }
                    Column::new(entry.name().into(), values)
                }
            };
            df.with_column(replaced)?;
        }
        Ok(df)
    }

    /// Partition rows with one shared uniform draw per row: a row goes to
    /// the first output when its draw exceeds `perc`. Sibling tables that
    /// must split consistently have to share one mask, see
    /// [`TableCleaner::split_xy`].
    pub fn split(
        &self,
        df: &DataFrame,
        perc: f64,
        seed: Option<u64>,
    ) -> Result<(DataFrame, DataFrame)> {
        let mask = random_mask(df.height(), perc, &mut seeded_rng(seed));
        let inverted = !&mask;
        Ok((df.filter(&mask)?, df.filter(&inverted)?))
    }

    /// Split a feature table and its label column with one shared mask, so
    /// row-to-label alignment survives the split.
    pub fn split_xy(
        &self,
        x: &DataFrame,
        y: &Column,
        perc: f64,
        seed: Option<u64>,
    ) -> Result<(DataFrame, Column, DataFrame, Column)> {
        let mask = random_mask(x.height(), perc, &mut seeded_rng(seed));
        let inverted = !&mask;
        let y = y.as_materialized_series();
        Ok((
            x.filter(&mask)?,
            y.filter(&mask)?.into(),
            x.filter(&inverted)?,
            y.filter(&inverted)?.into(),
        ))
    }

    /// Second-pass null filling with frozen statistics, for tables where a
    /// join has reintroduced nulls: numerical columns take the impute
    /// value, label columns take 0. One-hot columns are exempt and
    /// unfitted transformers are skipped.
    pub fn fill_nans(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();
        for entry in &self.transformers {
            let Transformer::Fitted(fitted) = entry else {
                continue;
            };
            match fitted {
                FittedTransformer::Numerical(num) => {
                    let casted = df.column(num.name())?.cast(&DataType::Float64)?;
                    let ca = casted.f64()?;
                    let impute = num.value();
                    let values: Vec<f64> =
                        ca.into_iter().map(|opt| opt.unwrap_or(impute)).collect();
                    df.with_column(Column::new(num.name().into(), values))?;
                }
                FittedTransformer::Categorical(cat) => {
                    if cat.method() == CategoricalMethod::OneHot {
                        continue;
                    }
                    let casted = df.column(cat.name())?.cast(&DataType::UInt32)?;
                    let ca = casted.u32()?;
                    let values: Vec<u32> = ca.into_iter().map(|opt| opt.unwrap_or(0)).collect();
                    df.with_column(Column::new(cat.name().into(), values))?;
                }
            }
        }
        Ok(df)
    }

    /// Select columns in exactly [`TableCleaner::all_features`] order,
    /// regardless of the input column order.
    pub fn align(&self, df: &DataFrame) -> Result<DataFrame> {
        Ok(df.select(self.all_features())?)
    }

    /// Serialize one descriptor per transformer, in registration order.
    pub fn to_state(&self) -> Vec<TransformerState> {
        self.transformers.iter().map(Transformer::to_state).collect()
    }

    /// Restore a cleaner from serialized descriptors.
    pub fn from_state(state: Vec<TransformerState>) -> Self {
        Self {
            transformers: state.into_iter().map(Transformer::from_state).collect(),
        }
    }

    /// Write the serialized state as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_state())?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Restore a cleaner from a JSON state file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let state: Vec<TransformerState> = serde_json::from_str(&contents)?;
        Ok(Self::from_state(state))
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn random_mask(height: usize, perc: f64, rng: &mut StdRng) -> BooleanChunked {
    let mask: Vec<bool> = (0..height).map(|_| rng.gen_range(0.0..1.0) > perc).collect();
    BooleanChunked::from_slice("mask".into(), &mask)
}
