//! Persisted fit-state documents.
//!
//! A cleaner fitted during training is reconstructed byte-identically for
//! inference from these documents, without re-seeing any training data. The
//! documents carry only small metadata (statistics and vocabularies), never
//! row data.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PrepError;

/// Which stored statistic replaces missing numerical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    Mean,
    Min,
    Max,
}

impl ImputeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl FromStr for ImputeStrategy {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(PrepError::Config(format!(
                "'{other}' is not a valid impute strategy (expected mean, min or max)"
            ))),
        }
    }
}

/// How a categorical column is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalMethod {
    /// Integer codes: `1 + vocabulary index`, with `0` reserved for
    /// unseen/missing values.
    Label,
    /// One boolean column per vocabulary entry.
    OneHot,
}

impl FromStr for CategoricalMethod {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "label" => Ok(Self::Label),
            "one_hot" => Ok(Self::OneHot),
            other => Err(PrepError::Config(format!(
                "'{other}' is not a valid categorical method (expected label or one_hot)"
            ))),
        }
    }
}

/// Frozen statistics of a fitted numerical transformer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl NumericStats {
    /// Resolve an impute strategy to the stored scalar it selects.
    pub fn value(&self, strategy: ImputeStrategy) -> f64 {
        match strategy {
            ImputeStrategy::Mean => self.mean,
            ImputeStrategy::Min => self.min,
            ImputeStrategy::Max => self.max,
        }
    }
}

/// One transformer descriptor inside a serialized cleaner.
///
/// The `v_*` statistics are nullable: `null` means the transformer was
/// registered but never fitted. An empty `categories` list means the same
/// for categorical transformers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformerState {
    Numerical {
        name: String,
        impute: ImputeStrategy,
        clip: bool,
        #[serde(default)]
        v_min: Option<f64>,
        #[serde(default)]
        v_mean: Option<f64>,
        #[serde(default)]
        v_max: Option<f64>,
        #[serde(default)]
        mutate_perc: f64,
        #[serde(default = "default_numerical_sentinel")]
        mutate_value: f64,
    },
    Categorical {
        name: String,
        method: CategoricalMethod,
        categories: Vec<String>,
        #[serde(default)]
        mutate_perc: f64,
        #[serde(default)]
        mutate_value: u32,
    },
}

fn default_numerical_sentinel() -> f64 {
    -1.0
}

impl TransformerState {
    /// Name of the source column this descriptor belongs to.
    pub fn name(&self) -> &str {
        match self {
            Self::Numerical { name, .. } | Self::Categorical { name, .. } => name,
        }
    }
}

/// Serialized star-schema enricher.
///
/// Sufficient to reconstruct an enricher whose cleaning behavior exactly
/// matches training. Registered tables and calculations reference live data
/// and are deliberately absent: they must be re-registered after
/// deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnricherState {
    pub numericals: Vec<String>,
    pub categoricals: Vec<String>,
    pub one_hots: Vec<String>,
    pub label: String,
    pub weight: Option<String>,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    pub cleaner: Vec<TransformerState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impute_strategy_parses_known_values() {
        assert_eq!("mean".parse::<ImputeStrategy>().unwrap(), ImputeStrategy::Mean);
        assert_eq!("min".parse::<ImputeStrategy>().unwrap(), ImputeStrategy::Min);
        assert_eq!("max".parse::<ImputeStrategy>().unwrap(), ImputeStrategy::Max);
    }

    #[test]
    fn impute_strategy_rejects_unknown_value() {
        let err = "median".parse::<ImputeStrategy>().unwrap_err();
        assert!(err.to_string().contains("not a valid impute strategy"));
    }

    #[test]
    fn numeric_stats_resolve_strategy() {
        let stats = NumericStats { min: 1.0, mean: 2.5, max: 9.0 };
        assert_eq!(stats.value(ImputeStrategy::Mean), 2.5);
        assert_eq!(stats.value(ImputeStrategy::Min), 1.0);
        assert_eq!(stats.value(ImputeStrategy::Max), 9.0);
    }

    #[test]
    fn numerical_state_round_trips() {
        let state = TransformerState::Numerical {
            name: "price".to_string(),
            impute: ImputeStrategy::Mean,
            clip: true,
            v_min: Some(1.0),
            v_mean: Some(2.0),
            v_max: Some(3.0),
            mutate_perc: 0.1,
            mutate_value: -1.0,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"type\":\"numerical\""));
        assert!(json.contains("\"v_mean\":2.0"));

        let back: TransformerState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "price");
    }

    #[test]
    fn categorical_state_defaults_mutation_fields() {
        let json = r#"{"name":"color","type":"categorical","method":"one_hot","categories":["red","blue"]}"#;
        let state: TransformerState = serde_json::from_str(json).unwrap();
        match state {
            TransformerState::Categorical { method, categories, mutate_perc, mutate_value, .. } => {
                assert_eq!(method, CategoricalMethod::OneHot);
                assert_eq!(categories, vec!["red", "blue"]);
                assert_eq!(mutate_perc, 0.0);
                assert_eq!(mutate_value, 0);
            }
            TransformerState::Numerical { .. } => panic!("expected categorical state"),
        }
    }

    #[test]
    fn enricher_state_round_trips() {
        let state = EnricherState {
            numericals: vec!["price".to_string()],
            categoricals: vec!["group".to_string()],
            one_hots: vec!["color".to_string()],
            label: "sales".to_string(),
            weight: None,
            config: BTreeMap::new(),
            cleaner: Vec::new(),
        };
        let json = serde_json::to_string_pretty(&state).unwrap();
        let back: EnricherState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.label, "sales");
        assert_eq!(back.numericals, vec!["price"]);
        assert!(back.weight.is_none());
    }
}
