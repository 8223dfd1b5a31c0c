use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;

use polars::prelude::DataType;
use serde::{Deserialize, Serialize};

use crate::deflator::GapPolicy;
use crate::error::Result;
use crate::growth::LagMode;
use crate::schema::{flow, price_index, source, trade};

/// Target type for a canonical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    String,
    /// Low-cardinality labels (partner, flow, region). Stored as UTF-8.
    Category,
}

impl ColumnType {
    pub fn data_type(self) -> DataType {
        match self {
            ColumnType::Int => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::String | ColumnType::Category => DataType::String,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Float)
    }

    /// Inverse of [`ColumnType::data_type`], used when reading snapshot manifests.
    pub fn from_data_type(dtype: &DataType) -> Self {
        match dtype {
            DataType::Float32 | DataType::Float64 => ColumnType::Float,
            dt if dt.is_integer() => ColumnType::Int,
            _ => ColumnType::String,
        }
    }
}

pub fn default_column_map() -> BTreeMap<String, String> {
    [
        (source::PERIOD, trade::YEAR),
        (source::REPORTER, trade::FLOW),
        (source::COMMODITY, trade::COMMODITY_CODE),
        (source::PARTNER, trade::PARTNER),
        (source::FOB_VALUE, trade::VALUE),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

pub fn default_dtypes() -> BTreeMap<String, ColumnType> {
    [
        (trade::YEAR, ColumnType::Int),
        (trade::PARTNER, ColumnType::Category),
        (trade::FLOW, ColumnType::Category),
        (trade::COMMODITY_CODE, ColumnType::Category),
        (trade::VALUE, ColumnType::Float),
    ]
    .into_iter()
    .map(|(name, ty)| (name.to_string(), ty))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Last year of the pre-agreement window.
    pub cutoff_year: i64,
    pub reference_country: String,
    pub index_country_column: String,
    pub index_first_year: i64,
    pub index_last_year: i64,
    pub join_gap_policy: GapPolicy,
    pub lag: usize,
    pub lag_mode: LagMode,
    pub commodity_codes: Vec<String>,
    pub partners: Vec<String>,
    /// Flow codes kept before any totals are built. Empty keeps every flow.
    pub flows: Vec<String>,
    /// Source column name → canonical column name.
    pub columns: BTreeMap<String, String>,
    /// Canonical column name → target type.
    pub dtypes: BTreeMap<String, ColumnType>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cutoff_year: 2011,
            reference_country: "USA".to_string(),
            index_country_column: price_index::COUNTRY_CODE.to_string(),
            index_first_year: 2001,
            index_last_year: 2022,
            join_gap_policy: GapPolicy::Keep,
            lag: 1,
            lag_mode: LagMode::Positional,
            commodity_codes: Vec::new(),
            partners: Vec::new(),
            flows: vec![flow::IMPORT.to_string(), flow::EXPORT.to_string()],
            columns: default_column_map(),
            dtypes: default_dtypes(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn index_years(&self) -> RangeInclusive<i64> {
        self.index_first_year..=self.index_last_year
    }

    fn validate(&self) -> Result<()> {
        use crate::error::TradeError;

        if self.index_first_year > self.index_last_year {
            return Err(TradeError::Config(format!(
                "index_first_year ({}) is after index_last_year ({})",
                self.index_first_year, self.index_last_year
            )));
        }
        if self.reference_country.trim().is_empty() {
            return Err(TradeError::Config("reference_country is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.columns.get("fobvalue").map(String::as_str), Some("Value"));
        assert_eq!(config.index_years(), 2001..=2022);
        assert_eq!(config.flows, vec!["M", "X"]);
    }

    #[test]
    fn overrides_are_applied() {
        let text = r#"
            cutoff_year = 2015
            reference_country = "CHE"
            join_gap_policy = "fail"
            lag_mode = "calendar"
            lag = 2
            partners = ["Switzerland", "Peru"]
            flows = ["X"]

            [dtypes]
            Year = "int"
            Value = "float"
        "#;
        let config = PipelineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.cutoff_year, 2015);
        assert_eq!(config.reference_country, "CHE");
        assert_eq!(config.join_gap_policy, GapPolicy::Fail);
        assert_eq!(config.lag_mode, LagMode::Calendar);
        assert_eq!(config.lag, 2);
        assert_eq!(config.flows, vec!["X"]);
        assert_eq!(config.dtypes.len(), 2);
        // untouched sections keep their defaults
        assert_eq!(config.columns, default_column_map());
    }

    #[test]
    fn inverted_index_years_rejected() {
        let text = "index_first_year = 2022\nindex_last_year = 2001\n";
        assert!(PipelineConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let config = PipelineConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn category_is_stored_as_string() {
        assert_eq!(ColumnType::Category.data_type(), DataType::String);
        assert!(ColumnType::Int.is_numeric());
        assert_eq!(ColumnType::from_data_type(&DataType::Int64), ColumnType::Int);
    }
}
