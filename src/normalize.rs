use std::collections::BTreeMap;
use std::str::FromStr;

use polars::prelude::*;
use tracing::debug;

use crate::config::{default_column_map, default_dtypes, ColumnType};
use crate::error::{Result, TradeError};
use crate::frame::{cast_expr, require_rows};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Rename only.
    Columns,
    /// Type coercion only.
    Dtypes,
    /// Rename, then coerce.
    All,
}

impl FromStr for NormalizeMode {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "cols" | "columns" => Ok(Self::Columns),
            "dtypes" => Ok(Self::Dtypes),
            other => Err(TradeError::InvalidArgument(format!(
                "normalize mode '{other}' not valid. Try: dtypes, cols, all"
            ))),
        }
    }
}

/// Normalize a raw table. `None` maps fall back to the built-in defaults.
pub fn normalize(
    df: &DataFrame,
    mode: NormalizeMode,
    columns: Option<&BTreeMap<String, String>>,
    dtypes: Option<&BTreeMap<String, ColumnType>>,
) -> Result<DataFrame> {
    require_rows(df, "normalize")?;

    let default_columns;
    let columns = match columns {
        Some(map) if !map.is_empty() => map,
        _ => {
            default_columns = default_column_map();
            &default_columns
        }
    };
    let default_types;
    let dtypes = match dtypes {
        Some(map) if !map.is_empty() => map,
        _ => {
            default_types = default_dtypes();
            &default_types
        }
    };

    match mode {
        NormalizeMode::Columns => rename_columns(df, columns),
        NormalizeMode::Dtypes => coerce_types(df, dtypes),
        NormalizeMode::All => coerce_types(&rename_columns(df, columns)?, dtypes),
    }
}

/// Rename every mapped source column present in `df`. Unmapped and absent
/// columns are left alone, so applying the same map twice is a no-op.
pub fn rename_columns(df: &DataFrame, map: &BTreeMap<String, String>) -> Result<DataFrame> {
    let present: Vec<(&str, &str)> = map
        .iter()
        .filter(|(from, to)| from != to && df.column(from).is_ok())
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .collect();

    if present.is_empty() {
        return Ok(df.clone());
    }

    let (old, new): (Vec<&str>, Vec<&str>) = present.into_iter().unzip();
    debug!(renamed = old.len(), "renaming source columns");
    Ok(df.clone().lazy().rename(old, new, true).collect()?)
}

/// Cast each declared column to its target type. Every declared column must
/// exist; a value that cannot be converted fails the whole table.
pub fn coerce_types(df: &DataFrame, dtypes: &BTreeMap<String, ColumnType>) -> Result<DataFrame> {
    let schema = df.schema();
    let mut casts = Vec::with_capacity(dtypes.len());
    for (name, ty) in dtypes {
        let current = schema
            .get(name.as_str())
            .ok_or_else(|| TradeError::MissingColumn(name.clone()))?;
        casts.push(cast_expr(name, current, &ty.data_type()));
    }

    df.clone()
        .lazy()
        .with_columns(casts)
        .collect()
        .map_err(|e| TradeError::InvalidData(format!("type coercion failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::trade;

    fn raw() -> DataFrame {
        df!(
            "refPeriodId" => ["2011", " 2022 "],
            "reporterDesc" => ["M", "X"],
            "isOriginalClassification" => ["710812", "2709"],
            "partnerISO" => ["Switzerland", "Peru"],
            "fobvalue" => ["100.5", "300"],
            "extra" => ["a", "b"]
        )
        .unwrap()
    }

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names_str()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn all_mode_renames_and_coerces() {
        let df = normalize(&raw(), NormalizeMode::All, None, None).unwrap();
        assert_eq!(
            names(&df),
            vec!["Year", "Flow", "CommodityCode", "Partner", "Value", "extra"]
        );
        assert_eq!(df.column(trade::YEAR).unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column(trade::VALUE).unwrap().dtype(), &DataType::Float64);
        let years: Vec<i64> = df
            .column(trade::YEAR)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(years, vec![2011, 2022]);
    }

    #[test]
    fn rename_is_idempotent() {
        let map = default_column_map();
        let once = rename_columns(&raw(), &map).unwrap();
        let twice = rename_columns(&once, &map).unwrap();
        assert_eq!(names(&once), names(&twice));
    }

    #[test]
    fn recoercion_is_a_no_op() {
        let once = normalize(&raw(), NormalizeMode::All, None, None).unwrap();
        let twice = normalize(&once, NormalizeMode::Dtypes, None, None).unwrap();
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn input_table_is_untouched() {
        let input = raw();
        let _ = normalize(&input, NormalizeMode::All, None, None).unwrap();
        assert_eq!(input.column("fobvalue").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn unknown_mode_is_invalid_argument() {
        assert!(matches!(
            "everything".parse::<NormalizeMode>(),
            Err(TradeError::InvalidArgument(_))
        ));
        assert_eq!("cols".parse::<NormalizeMode>().unwrap(), NormalizeMode::Columns);
    }

    #[test]
    fn dtypes_mode_requires_declared_columns() {
        // source names are still in place, so "Year" is absent
        let err = normalize(&raw(), NormalizeMode::Dtypes, None, None).unwrap_err();
        assert!(matches!(err, TradeError::MissingColumn(_)));
    }

    #[test]
    fn bad_number_fails_the_whole_table() {
        let mut bad = raw();
        bad.replace("fobvalue", Series::new("fobvalue".into(), ["1.0", "n/a"]))
            .unwrap();
        let err = normalize(&bad, NormalizeMode::All, None, None).unwrap_err();
        assert!(matches!(err, TradeError::InvalidData(_)));
    }

    #[test]
    fn empty_input_is_rejected() {
        let empty = raw().head(Some(0));
        assert!(matches!(
            normalize(&empty, NormalizeMode::All, None, None),
            Err(TradeError::MissingData(_))
        ));
    }
}
