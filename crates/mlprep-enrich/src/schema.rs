//! The star-schema enricher.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use polars::prelude::*;
use tracing::debug;

use mlprep_clean::TableCleaner;
use mlprep_ingest::flatten_json_column;
use mlprep_model::{EnricherState, PrepError, Result};

use crate::join::{CROSS_JOIN_KEY, ensure_cross_join_key, join_on};

/// Suffix marking cleaned sibling columns inside registered tables and the
/// enriched output. Everything without it is context.
pub const CLEAN_SUFFIX: &str = "_c";

/// Registration options for a secondary table.
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    /// Join keys; each must exist as a column of the table.
    pub keys: Vec<String>,
    /// Context columns retained verbatim alongside keys and cleaned
    /// columns.
    pub contexts: Vec<String>,
    /// Core tables join with inner semantics and may cross-join when no
    /// key overlaps; non-core tables must never grow or shrink the base.
    pub core: bool,
    /// Columns holding JSON-object strings, flattened before cleaning.
    pub json_columns: Vec<String>,
}

/// One registered secondary table, already cleaned and trimmed.
///
/// Mutated in place only when a cross join appends the synthetic key
/// column; nothing is ever removed after registration.
#[derive(Debug, Clone)]
pub struct RegisteredTable {
    pub name: String,
    pub table: DataFrame,
    pub keys: Vec<String>,
    pub contexts: Vec<String>,
    pub core: bool,
}

/// A derived-column calculation applied on every enrichment run.
#[derive(Clone)]
pub struct Calculation {
    pub name: String,
    pub func: Arc<dyn Fn(&DataFrame) -> Result<Column> + Send + Sync>,
}

impl fmt::Debug for Calculation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calculation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Result of an enrichment run.
#[derive(Debug, Clone)]
pub struct Enriched {
    /// Raw context columns: keys and passthrough columns, including label
    /// and weight.
    pub context: DataFrame,
    /// Cleaned feature matrix, columns in `all_features()` order with the
    /// cleaned-suffix marker stripped.
    pub features: DataFrame,
    /// Raw label column.
    pub label: Column,
    /// Raw weight column, when configured.
    pub weight: Option<Column>,
}

/// Registry of secondary tables and calculations around one owned
/// [`TableCleaner`].
///
/// Tables are cleaned once at registration; `enrich` joins them onto a base
/// fact table in registration order, applies calculations, and splits the
/// result into context, features, label and weight.
#[derive(Debug, Clone)]
pub struct StarSchema {
    numericals: Vec<String>,
    categoricals: Vec<String>,
    one_hots: Vec<String>,
    label: String,
    weight: Option<String>,
    config: BTreeMap<String, serde_json::Value>,
    tables: Vec<RegisteredTable>,
    calculations: Vec<Calculation>,
    cleaner: TableCleaner,
}

impl StarSchema {
    /// Create an enricher whose owned cleaner is registered from the four
    /// feature-name lists.
    pub fn new(
        numericals: Vec<String>,
        categoricals: Vec<String>,
        one_hots: Vec<String>,
        label: impl Into<String>,
        weight: Option<String>,
    ) -> Self {
        let mut cleaner = TableCleaner::new();
        cleaner.register(
            &numericals.iter().map(String::as_str).collect::<Vec<_>>(),
            &categoricals.iter().map(String::as_str).collect::<Vec<_>>(),
            &one_hots.iter().map(String::as_str).collect::<Vec<_>>(),
        );
        Self {
            numericals,
            categoricals,
            one_hots,
            label: label.into(),
            weight,
            config: BTreeMap::new(),
            tables: Vec::new(),
            calculations: Vec::new(),
            cleaner,
        }
    }

    /// Attach free-form configuration carried through serialization.
    pub fn with_config(mut self, config: BTreeMap<String, serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    /// The owned cleaner, for alignment and state inspection.
    pub fn cleaner(&self) -> &TableCleaner {
        &self.cleaner
    }

    /// Registered tables, in registration order.
    pub fn tables(&self) -> &[RegisteredTable] {
        &self.tables
    }

    /// Register a secondary table: flatten declared JSON columns, clean
    /// every column the owned cleaner knows, trim to keys, contexts and
    /// cleaned columns, and store the record. Re-registering a name
    /// replaces the prior entry in place.
    pub fn register_table(
        &mut self,
        name: impl Into<String>,
        table: DataFrame,
        options: TableOptions,
    ) -> Result<()> {
        let name = name.into();
        for key in &options.keys {
            if table.column(key).is_err() {
                return Err(PrepError::Schema(format!(
                    "join key '{key}' is missing from table '{name}'"
                )));
            }
        }

        let mut table = table;
        for column in &options.json_columns {
            table = flatten_json_column(&table, column, true)?;
        }
        let table = self.clean_table(table, &options.keys, &options.contexts)?;

        let record = RegisteredTable {
            name: name.clone(),
            table,
            keys: options.keys,
            contexts: options.contexts,
            core: options.core,
        };
        match self.tables.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = record,
            None => self.tables.push(record),
        }
        Ok(())
    }

    /// Register a derived-column calculation. Re-registering a name
    /// replaces the prior entry in place.
    pub fn register_calculation(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&DataFrame) -> Result<Column> + Send + Sync + 'static,
    ) {
        let record = Calculation {
            name: name.into(),
            func: Arc::new(func),
        };
        match self.calculations.iter_mut().find(|c| c.name == record.name) {
            Some(existing) => *existing = record,
            None => self.calculations.push(record),
        }
    }

    /// Clean every known column, appending outputs as suffixed siblings so
    /// raw and cleaned forms coexist, then trim to keys, contexts and
    /// cleaned columns.
    fn clean_table(
        &mut self,
        mut table: DataFrame,
        keys: &[String],
        contexts: &[String],
    ) -> Result<DataFrame> {
        self.cleaner.fit(&table)?;
        let (clean, _) = self.cleaner.transform_with_options(&table, None, false)?;
        for column in clean.get_columns() {
            let suffixed = column
                .as_materialized_series()
                .clone()
                .with_name(format!("{}{CLEAN_SUFFIX}", column.name()).into());
            table.with_column(suffixed)?;
        }
        let selection: Vec<String> = table
            .get_columns()
            .iter()
            .map(|c| c.name().to_string())
            .filter(|n| keys.contains(n) || contexts.contains(n) || n.ends_with(CLEAN_SUFFIX))
            .collect();
        Ok(table.select(selection)?)
    }

    /// Join every registered table onto `base` in registration order, apply
    /// calculations, and partition the result.
    ///
    /// Non-core tables never change the base row count: the left join is
    /// followed by a mandatory post-condition check, and a violation means
    /// a non-core table had multiple matches per key.
    pub fn enrich(&mut self, base: &DataFrame) -> Result<Enriched> {
        let mut base = base.clone();

        for record in &mut self.tables {
            let before = base.height();
            let overlap: Vec<String> = record
                .keys
                .iter()
                .filter(|key| base.column(key).is_ok())
                .cloned()
                .collect();

            if overlap.is_empty() && !record.core {
                debug!(table = record.name.as_str(), "no overlapping keys, skipping non-core table");
                continue;
            }

            let (joined, how) = if overlap.is_empty() {
                // Deliberate cross join: broadcast the table onto every base
                // row via a constant synthetic key on both sides.
                ensure_cross_join_key(&mut base)?;
                ensure_cross_join_key(&mut record.table)?;
                let keys = vec![CROSS_JOIN_KEY.to_string()];
                let joined = join_on(&base, &record.table, &keys, JoinType::Inner)?;
                (joined.drop(CROSS_JOIN_KEY)?, "cross")
            } else if record.core {
                (join_on(&base, &record.table, &overlap, JoinType::Inner)?, "inner")
            } else {
                (join_on(&base, &record.table, &overlap, JoinType::Left)?, "left")
            };
            base = joined;
            debug!(
                table = record.name.as_str(),
                join = how,
                rows = base.height(),
                "joined table"
            );

            if !record.core && base.height() != before {
                return Err(PrepError::JoinIntegrity {
                    table: record.name.clone(),
                    before,
                    after: base.height(),
                });
            }
        }

        for calc in &self.calculations {
            let raw = (calc.func)(&base)?
                .as_materialized_series()
                .clone()
                .with_name(calc.name.as_str().into());
            base.with_column(raw)?;

            let single = base.select([calc.name.as_str()])?;
            self.cleaner.fit(&single)?;
            let (clean, _) = self.cleaner.transform_with_options(&single, None, false)?;
            for column in clean.get_columns() {
                let suffixed = column
                    .as_materialized_series()
                    .clone()
                    .with_name(format!("{}{CLEAN_SUFFIX}", column.name()).into());
                base.with_column(suffixed)?;
            }
        }

        let feature_names = self.cleaner.all_features();
        let mut features =
            base.select(feature_names.iter().map(|f| format!("{f}{CLEAN_SUFFIX}")))?;
        for name in &feature_names {
            features.rename(&format!("{name}{CLEAN_SUFFIX}"), name.as_str().into())?;
        }

        let context_names: Vec<String> = base
            .get_columns()
            .iter()
            .map(|c| c.name().to_string())
            .filter(|n| !n.ends_with(CLEAN_SUFFIX))
            .collect();
        let context = base.select(context_names)?;

        let label = base
            .column(self.label.as_str())
            .map_err(|_| {
                PrepError::Schema(format!(
                    "label column '{}' is missing from the enriched table",
                    self.label
                ))
            })?
            .clone();
        let weight = match &self.weight {
            Some(name) => Some(
                base.column(name.as_str())
                    .map_err(|_| {
                        PrepError::Schema(format!(
                            "weight column '{name}' is missing from the enriched table"
                        ))
                    })?
                    .clone(),
            ),
            None => None,
        };

        Ok(Enriched { context, features, label, weight })
    }

    /// Predict the maximum row multiplication factor of a future `enrich`
    /// call without executing any join: the product of row counts of every
    /// core table whose keys do not currently overlap the base columns.
    pub fn growth_rate(&self, base: &DataFrame) -> u64 {
        let mut rate: u64 = 1;
        for record in &self.tables {
            if !record.core {
                continue;
            }
            let overlaps = record.keys.iter().any(|key| base.column(key).is_ok());
            if !overlaps {
                rate *= record.table.height() as u64;
            }
        }
        rate
    }

    /// Serialize feature lists, label, weight, config and cleaner state.
    ///
    /// Registered tables and calculations reference live data and must be
    /// re-registered after [`StarSchema::from_state`].
    pub fn to_state(&self) -> EnricherState {
        EnricherState {
            numericals: self.numericals.clone(),
            categoricals: self.categoricals.clone(),
            one_hots: self.one_hots.clone(),
            label: self.label.clone(),
            weight: self.weight.clone(),
            config: self.config.clone(),
            cleaner: self.cleaner.to_state(),
        }
    }

    /// Reconstruct an enricher whose cleaning behavior exactly matches the
    /// serialized one.
    pub fn from_state(state: EnricherState) -> Self {
        let mut schema = Self::new(
            state.numericals,
            state.categoricals,
            state.one_hots,
            state.label,
            state.weight,
        );
        schema.config = state.config;
        schema.cleaner = TableCleaner::from_state(state.cleaner);
        schema
    }

    /// Write the serialized state as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_state())?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Restore an enricher from a JSON state file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let state: EnricherState = serde_json::from_str(&contents)?;
        Ok(Self::from_state(state))
    }
}
