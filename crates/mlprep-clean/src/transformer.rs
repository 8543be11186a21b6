//! Column transformers in two phases: specs and fitted forms.
//!
//! A spec carries only hyperparameters. Fitting a spec against a column
//! produces the fitted form with frozen statistics (numerical) or a frozen
//! vocabulary (categorical); `clean` is only available on the fitted form
//! and takes `&self`, so a fitted transformer can never drift between
//! training and inference.

use std::collections::{HashMap, HashSet};

use polars::prelude::*;

use mlprep_model::{CategoricalMethod, ImputeStrategy, NumericStats, Result, TransformerState};

/// Registration options for a numerical transformer.
#[derive(Debug, Clone)]
pub struct NumericalOptions {
    /// Which stored statistic replaces missing values.
    pub impute: ImputeStrategy,
    /// Clamp cleaned values to the measured `[min, max]`.
    pub clip: bool,
    /// Probability that `mutate` replaces a value.
    pub mutate_perc: f64,
    /// Sentinel written by `mutate`.
    pub mutate_value: f64,
}

impl Default for NumericalOptions {
    fn default() -> Self {
        Self {
            impute: ImputeStrategy::Mean,
            clip: true,
            mutate_perc: 0.1,
            mutate_value: -1.0,
        }
    }
}

/// Registration options for a categorical transformer.
#[derive(Debug, Clone)]
pub struct CategoricalOptions {
    /// Pre-frozen vocabulary. Leave empty to derive it from data on fit.
    pub categories: Vec<String>,
    /// Probability that `mutate` replaces a value.
    pub mutate_perc: f64,
    /// Code written by `mutate` (0 is the reserved unknown bucket).
    pub mutate_value: u32,
}

impl Default for CategoricalOptions {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            mutate_perc: 0.1,
            mutate_value: 0,
        }
    }
}

/// Hyperparameters of a numerical column, before any data has been seen.
#[derive(Debug, Clone)]
pub struct NumericalSpec {
    pub name: String,
    pub impute: ImputeStrategy,
    pub clip: bool,
    pub mutate_perc: f64,
    pub mutate_value: f64,
}

impl NumericalSpec {
    /// Measure mean and extrema from a column, freezing this spec.
    ///
    /// Missing values are ignored; an all-null column freezes to zeros.
    pub fn fit(self, column: &Column) -> Result<FittedNumerical> {
        let casted = column.cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        let stats = NumericStats {
            min: ca.min().unwrap_or(0.0),
            mean: ca.mean().unwrap_or(0.0),
            max: ca.max().unwrap_or(0.0),
        };
        Ok(FittedNumerical { spec: self, stats })
    }
}

/// Hyperparameters of a categorical column.
#[derive(Debug, Clone)]
pub struct CategoricalSpec {
    pub name: String,
    pub method: CategoricalMethod,
    pub mutate_perc: f64,
    pub mutate_value: u32,
}

impl CategoricalSpec {
    /// Derive the vocabulary from a column in first-seen order.
    ///
    /// Label encoding keeps every distinct non-null value; one-hot encoding
    /// additionally drops empty strings, which would produce unusable
    /// feature names.
    pub fn fit(self, column: &Column) -> Result<FittedCategorical> {
        let casted = column.cast(&DataType::String)?;
        let ca = casted.str()?;
        let mut seen = HashSet::new();
        let mut categories = Vec::new();
        for value in ca.into_iter().flatten() {
            if self.method == CategoricalMethod::OneHot && value.is_empty() {
                continue;
            }
            if !seen.contains(value) {
                seen.insert(value.to_string());
                categories.push(value.to_string());
            }
        }
        Ok(FittedCategorical { spec: self, categories })
    }

    /// Freeze with a caller-provided vocabulary, without seeing data.
    pub fn freeze(self, categories: Vec<String>) -> FittedCategorical {
        FittedCategorical { spec: self, categories }
    }
}

/// A numerical transformer with frozen statistics.
#[derive(Debug, Clone)]
pub struct FittedNumerical {
    pub spec: NumericalSpec,
    pub stats: NumericStats,
}

impl FittedNumerical {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The impute value selected by the configured strategy.
    pub fn value(&self) -> f64 {
        self.stats.value(self.spec.impute)
    }

    /// Cast to f64, impute missing values with the stored statistic, clamp
    /// to the stored bounds when clipping is enabled, and round to five
    /// fractional digits for reproducibility across floating
    /// implementations.
    pub fn clean(&self, column: &Column) -> Result<Column> {
        let casted = column.cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        let impute = self.value();
        let mut values = Vec::with_capacity(ca.len());
        for opt in ca.into_iter() {
            let mut v = opt.unwrap_or(impute);
            if self.spec.clip {
                if v < self.stats.min {
                    v = self.stats.min;
                }
                if v > self.stats.max {
                    v = self.stats.max;
                }
            }
            values.push(round5(v));
        }
        Ok(Column::new(self.spec.name.as_str().into(), values))
    }
}

/// A categorical transformer with a frozen vocabulary.
///
/// Unseen values at transform time map to the reserved unknown bucket:
/// code 0 for label encoding, an all-false row for one-hot. The vocabulary
/// never grows after freezing, so an unseen category at inference time can
/// never change the output schema.
#[derive(Debug, Clone)]
pub struct FittedCategorical {
    pub spec: CategoricalSpec,
    pub categories: Vec<String>,
}

impl FittedCategorical {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn method(&self) -> CategoricalMethod {
        self.spec.method
    }

    /// Output feature names: one per category for one-hot, the column name
    /// otherwise.
    pub fn features(&self) -> Vec<String> {
        match self.spec.method {
            CategoricalMethod::Label => vec![self.spec.name.clone()],
            CategoricalMethod::OneHot => self
                .categories
                .iter()
                .map(|category| format!("{}_{}", self.spec.name, category))
                .collect(),
        }
    }

    /// Encode a column against the frozen vocabulary.
    pub fn clean(&self, column: &Column) -> Result<Vec<Column>> {
        let casted = column.cast(&DataType::String)?;
        let ca = casted.str()?;
        match self.spec.method {
            CategoricalMethod::Label => {
                let index: HashMap<&str, u32> = self
                    .categories
                    .iter()
                    .enumerate()
                    .map(|(i, category)| (category.as_str(), i as u32 + 1))
                    .collect();
                let mut values = Vec::with_capacity(ca.len());
                for opt in ca.into_iter() {
                    values.push(opt.and_then(|v| index.get(v).copied()).unwrap_or(0));
                }
                Ok(vec![Column::new(self.spec.name.as_str().into(), values)])
            }
            CategoricalMethod::OneHot => {
                let mut columns = Vec::with_capacity(self.categories.len());
                for category in &self.categories {
                    let mut values = Vec::with_capacity(ca.len());
                    for opt in ca.into_iter() {
                        values.push(opt == Some(category.as_str()));
                    }
                    columns.push(Column::new(
                        format!("{}_{}", self.spec.name, category).into(),
                        values,
                    ));
                }
                Ok(columns)
            }
        }
    }
}

/// Tagged union over the two spec kinds.
#[derive(Debug, Clone)]
pub enum TransformerSpec {
    Numerical(NumericalSpec),
    Categorical(CategoricalSpec),
}

impl TransformerSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Numerical(spec) => &spec.name,
            Self::Categorical(spec) => &spec.name,
        }
    }

    /// Fit against a column, producing the frozen form.
    pub fn fit(self, column: &Column) -> Result<FittedTransformer> {
        match self {
            Self::Numerical(spec) => Ok(FittedTransformer::Numerical(spec.fit(column)?)),
            Self::Categorical(spec) => Ok(FittedTransformer::Categorical(spec.fit(column)?)),
        }
    }
}

/// Tagged union over the two fitted kinds.
#[derive(Debug, Clone)]
pub enum FittedTransformer {
    Numerical(FittedNumerical),
    Categorical(FittedCategorical),
}

impl FittedTransformer {
    pub fn name(&self) -> &str {
        match self {
            Self::Numerical(fitted) => fitted.name(),
            Self::Categorical(fitted) => fitted.name(),
        }
    }

    pub fn features(&self) -> Vec<String> {
        match self {
            Self::Numerical(fitted) => vec![fitted.spec.name.clone()],
            Self::Categorical(fitted) => fitted.features(),
        }
    }

    /// Clean a column into one or more named output columns.
    pub fn clean(&self, column: &Column) -> Result<Vec<Column>> {
        match self {
            Self::Numerical(fitted) => Ok(vec![fitted.clean(column)?]),
            Self::Categorical(fitted) => fitted.clean(column),
        }
    }
}

/// Noise-injection parameters of a transformer, by column kind.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Mutation {
    Numerical { perc: f64, value: f64 },
    Label { perc: f64, value: u32 },
}

/// One cleaner registry entry.
///
/// The `Spec -> Fitted` edge is one-way and is crossed only by
/// [`crate::TableCleaner::fit`].
#[derive(Debug, Clone)]
pub enum Transformer {
    Spec(TransformerSpec),
    Fitted(FittedTransformer),
}

impl Transformer {
    pub fn name(&self) -> &str {
        match self {
            Self::Spec(spec) => spec.name(),
            Self::Fitted(fitted) => fitted.name(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, Self::Fitted(_))
    }

    /// Output feature names. An unfitted one-hot transformer has no
    /// vocabulary yet and contributes nothing.
    pub fn features(&self) -> Vec<String> {
        match self {
            Self::Fitted(fitted) => fitted.features(),
            Self::Spec(TransformerSpec::Numerical(spec)) => vec![spec.name.clone()],
            Self::Spec(TransformerSpec::Categorical(spec)) => match spec.method {
                CategoricalMethod::Label => vec![spec.name.clone()],
                CategoricalMethod::OneHot => Vec::new(),
            },
        }
    }

    /// Mutation parameters; `None` for one-hot transformers, which are
    /// exempt from noise injection.
    pub(crate) fn mutation(&self) -> Option<Mutation> {
        match self {
            Self::Spec(TransformerSpec::Numerical(spec)) => Some(Mutation::Numerical {
                perc: spec.mutate_perc,
                value: spec.mutate_value,
            }),
            Self::Fitted(FittedTransformer::Numerical(fitted)) => Some(Mutation::Numerical {
                perc: fitted.spec.mutate_perc,
                value: fitted.spec.mutate_value,
            }),
            Self::Spec(TransformerSpec::Categorical(spec)) => match spec.method {
                CategoricalMethod::Label => Some(Mutation::Label {
                    perc: spec.mutate_perc,
                    value: spec.mutate_value,
                }),
                CategoricalMethod::OneHot => None,
            },
            Self::Fitted(FittedTransformer::Categorical(fitted)) => match fitted.spec.method {
                CategoricalMethod::Label => Some(Mutation::Label {
                    perc: fitted.spec.mutate_perc,
                    value: fitted.spec.mutate_value,
                }),
                CategoricalMethod::OneHot => None,
            },
        }
    }

    /// Serialize into a state document entry.
    pub fn to_state(&self) -> TransformerState {
        match self {
            Self::Spec(TransformerSpec::Numerical(spec)) => TransformerState::Numerical {
                name: spec.name.clone(),
                impute: spec.impute,
                clip: spec.clip,
                v_min: None,
                v_mean: None,
                v_max: None,
                mutate_perc: spec.mutate_perc,
                mutate_value: spec.mutate_value,
            },
            Self::Fitted(FittedTransformer::Numerical(fitted)) => TransformerState::Numerical {
                name: fitted.spec.name.clone(),
                impute: fitted.spec.impute,
                clip: fitted.spec.clip,
                v_min: Some(fitted.stats.min),
                v_mean: Some(fitted.stats.mean),
                v_max: Some(fitted.stats.max),
                mutate_perc: fitted.spec.mutate_perc,
                mutate_value: fitted.spec.mutate_value,
            },
            Self::Spec(TransformerSpec::Categorical(spec)) => TransformerState::Categorical {
                name: spec.name.clone(),
                method: spec.method,
                categories: Vec::new(),
                mutate_perc: spec.mutate_perc,
                mutate_value: spec.mutate_value,
            },
            Self::Fitted(FittedTransformer::Categorical(fitted)) => TransformerState::Categorical {
                name: fitted.spec.name.clone(),
                method: fitted.spec.method,
                categories: fitted.categories.clone(),
                mutate_perc: fitted.spec.mutate_perc,
                mutate_value: fitted.spec.mutate_value,
            },
        }
    }

    /// Restore from a state document entry. Absent statistics or an empty
    /// vocabulary restore the unfitted form.
    pub fn from_state(state: TransformerState) -> Self {
        match state {
            TransformerState::Numerical {
                name,
                impute,
                clip,
                v_min,
                v_mean,
                v_max,
                mutate_perc,
                mutate_value,
            } => {
                let spec = NumericalSpec { name, impute, clip, mutate_perc, mutate_value };
                match (v_min, v_mean, v_max) {
                    (Some(min), Some(mean), Some(max)) => {
                        Self::Fitted(FittedTransformer::Numerical(FittedNumerical {
                            spec,
                            stats: NumericStats { min, mean, max },
                        }))
                    }
                    _ => Self::Spec(TransformerSpec::Numerical(spec)),
                }
            }
            TransformerState::Categorical {
                name,
                method,
                categories,
                mutate_perc,
                mutate_value,
            } => {
                let spec = CategoricalSpec { name, method, mutate_perc, mutate_value };
                if categories.is_empty() {
                    Self::Spec(TransformerSpec::Categorical(spec))
                } else {
                    Self::Fitted(FittedTransformer::Categorical(spec.freeze(categories)))
                }
            }
        }
    }
}

/// Round to five fractional digits.
pub(crate) fn round5(v: f64) -> f64 {
    (v * 100_000.0).round() / 100_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[Option<f64>]) -> Column {
        Series::new("speed".into(), values).into()
    }

    #[test]
    fn numerical_fit_ignores_missing_values() {
        let spec = NumericalSpec {
            name: "speed".to_string(),
            impute: ImputeStrategy::Mean,
            clip: true,
            mutate_perc: 0.0,
            mutate_value: -1.0,
        };
        let fitted = spec
            .fit(&column(&[Some(380.0), Some(370.0), None, Some(26.0), Some(24.0)]))
            .unwrap();
        assert_eq!(fitted.stats.min, 24.0);
        assert_eq!(fitted.stats.max, 380.0);
        assert_eq!(fitted.stats.mean, 200.0);
    }

    #[test]
    fn numerical_clean_imputes_and_clips_with_stored_bounds() {
        let spec = NumericalSpec {
            name: "speed".to_string(),
            impute: ImputeStrategy::Min,
            clip: true,
            mutate_perc: 0.0,
            mutate_value: -1.0,
        };
        let fitted = spec
            .fit(&column(&[Some(380.0), Some(26.0), Some(24.0)]))
            .unwrap();

        // 500 exceeds the frozen max, -3 undercuts the frozen min, the null
        // takes the min because of the impute strategy.
        let cleaned = fitted
            .clean(&column(&[Some(500.0), None, Some(-3.0)]))
            .unwrap();
        let ca = cleaned.f64().unwrap();
        assert_eq!(ca.get(0), Some(380.0));
        assert_eq!(ca.get(1), Some(24.0));
        assert_eq!(ca.get(2), Some(24.0));
    }

    #[test]
    fn numerical_clean_rounds_to_five_digits() {
        let spec = NumericalSpec {
            name: "speed".to_string(),
            impute: ImputeStrategy::Mean,
            clip: false,
            mutate_perc: 0.0,
            mutate_value: -1.0,
        };
        let fitted = spec.fit(&column(&[Some(0.1234567), Some(1.0)])).unwrap();
        let cleaned = fitted.clean(&column(&[Some(0.1234567)])).unwrap();
        assert_eq!(cleaned.f64().unwrap().get(0), Some(0.12346));
    }

    #[test]
    fn label_maps_unseen_values_to_zero() {
        let spec = CategoricalSpec {
            name: "animal".to_string(),
            method: CategoricalMethod::Label,
            mutate_perc: 0.0,
            mutate_value: 0,
        };
        let fitted = spec.freeze(vec!["Falcon".to_string(), "Parrot".to_string()]);
        let input: Column = Series::new(
            "animal".into(),
            &[Some("Falcon"), Some("Goose"), Some("Parrot"), None],
        )
        .into();
        let cleaned = fitted.clean(&input).unwrap();
        let ca = cleaned[0].u32().unwrap();
        assert_eq!(ca.get(0), Some(1));
        assert_eq!(ca.get(1), Some(0));
        assert_eq!(ca.get(2), Some(2));
        assert_eq!(ca.get(3), Some(0));
    }

    #[test]
    fn one_hot_unseen_value_produces_all_false_row() {
        let spec = CategoricalSpec {
            name: "color".to_string(),
            method: CategoricalMethod::OneHot,
            mutate_perc: 0.0,
            mutate_value: 0,
        };
        let fitted = spec.freeze(vec!["red".to_string(), "blue".to_string()]);
        let input: Column = Series::new("color".into(), &["red", "green"]).into();
        let cleaned = fitted.clean(&input).unwrap();
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].name().as_str(), "color_red");
        assert_eq!(cleaned[1].name().as_str(), "color_blue");
        assert_eq!(cleaned[0].bool().unwrap().get(1), Some(false));
        assert_eq!(cleaned[1].bool().unwrap().get(1), Some(false));
    }

    #[test]
    fn one_hot_fit_derives_vocabulary_in_first_seen_order() {
        let spec = CategoricalSpec {
            name: "color".to_string(),
            method: CategoricalMethod::OneHot,
            mutate_perc: 0.0,
            mutate_value: 0,
        };
        let input: Column =
            Series::new("color".into(), &[Some("blue"), Some(""), Some("red"), None, Some("blue")])
                .into();
        let fitted = spec.fit(&input).unwrap();
        // Empty strings and nulls never become categories.
        assert_eq!(fitted.categories, vec!["blue", "red"]);
    }

    #[test]
    fn label_fit_keeps_first_seen_order() {
        let spec = CategoricalSpec {
            name: "animal".to_string(),
            method: CategoricalMethod::Label,
            mutate_perc: 0.0,
            mutate_value: 0,
        };
        let input: Column =
            Series::new("animal".into(), &["Parrot", "Falcon", "Parrot", "Goose"]).into();
        let fitted = spec.fit(&input).unwrap();
        assert_eq!(fitted.categories, vec!["Parrot", "Falcon", "Goose"]);
    }

    #[test]
    fn integer_labels_are_encoded_via_string_cast() {
        let spec = CategoricalSpec {
            name: "group_key".to_string(),
            method: CategoricalMethod::Label,
            mutate_perc: 0.0,
            mutate_value: 0,
        };
        let input: Column = Series::new("group_key".into(), &[10i64, 20, 10]).into();
        let fitted = spec.fit(&input).unwrap();
        assert_eq!(fitted.categories, vec!["10", "20"]);
        let cleaned = fitted.clean(&input).unwrap();
        let ca = cleaned[0].u32().unwrap();
        assert_eq!(ca.get(2), Some(1));
    }
}
