use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TradeError};
use crate::frame::{require_columns, require_integer, require_rows};
use crate::schema::{price_index, trade};

const ROW_ORDER: &str = "__row_order";

/// What to do with rows whose year has no index value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Keep the row with a null `RealValue`.
    #[default]
    Keep,
    /// Remove the row.
    Drop,
    /// Fail the whole table with [`TradeError::JoinGap`].
    Fail,
}

impl FromStr for GapPolicy {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keep" => Ok(Self::Keep),
            "drop" => Ok(Self::Drop),
            "fail" => Ok(Self::Fail),
            other => Err(TradeError::InvalidArgument(format!(
                "gap policy '{other}' not valid. Try: keep, drop, fail"
            ))),
        }
    }
}

/// Long-format price index for one economy: `Year` (i64), `Index` (f64, base 100).
#[derive(Debug, Clone)]
pub struct PriceIndex {
    frame: DataFrame,
}

impl PriceIndex {
    /// Reshape the wide index table (one row per country, one column per
    /// year) into one row per year for `country`.
    ///
    /// Year columns missing from the table, or holding no value, are left
    /// out so the deflation join reports them as gaps.
    pub fn from_wide(
        wide: &DataFrame,
        country_column: &str,
        country: &str,
        years: RangeInclusive<i64>,
    ) -> Result<Self> {
        require_columns(wide, &[country_column])?;

        let row = wide
            .clone()
            .lazy()
            .filter(
                col(country_column)
                    .cast(DataType::String)
                    .str()
                    .strip_chars(lit(" \t\r\n"))
                    .eq(lit(country)),
            )
            .collect()?;

        match row.height() {
            0 => {
                return Err(TradeError::MissingData(format!(
                    "no price index row for country '{country}'"
                )))
            }
            1 => {}
            n => {
                return Err(TradeError::InvalidData(format!(
                    "{n} price index rows for country '{country}'"
                )))
            }
        }

        let schema = row.schema();
        let mut present_years = Vec::new();
        let mut casts = Vec::new();
        for year in years {
            let name = year.to_string();
            if let Some(dtype) = schema.get(name.as_str()) {
                present_years.push(year);
                // unparsable cells become nulls, i.e. gaps
                let value = if dtype == &DataType::String {
                    col(name.as_str()).str().strip_chars(lit(" \t\r\n"))
                } else {
                    col(name.as_str())
                };
                casts.push(value.cast(DataType::Float64));
            }
        }
        let numeric = row.lazy().select(casts).collect()?;

        let mut pairs = Vec::with_capacity(present_years.len());
        for (year, column) in present_years.into_iter().zip(numeric.get_columns()) {
            if let Some(index) = column.f64()?.get(0) {
                pairs.push((year, index));
            }
        }
        debug!(country, years = pairs.len(), "loaded price index");
        Self::from_pairs(&pairs)
    }

    pub fn from_pairs(pairs: &[(i64, f64)]) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for &(year, index) in pairs {
            if !seen.insert(year) {
                return Err(TradeError::InvalidData(format!(
                    "duplicate price index year {year}"
                )));
            }
            if !(index.is_finite() && index > 0.0) {
                return Err(TradeError::InvalidData(format!(
                    "price index for {year} must be positive, got {index}"
                )));
            }
        }

        let years: Vec<i64> = pairs.iter().map(|p| p.0).collect();
        let values: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let frame = DataFrame::new(vec![
            Column::new(price_index::YEAR.into(), &years),
            Column::new(price_index::INDEX.into(), &values),
        ])?;
        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn get(&self, year: i64) -> Option<f64> {
        let years = self.frame.column(price_index::YEAR).ok()?.i64().ok()?;
        let values = self.frame.column(price_index::INDEX).ok()?.f64().ok()?;
        years
            .into_iter()
            .position(|y| y == Some(year))
            .and_then(|i| values.get(i))
    }
}

/// Observability record for one deflation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeflationReport {
    pub input_rows: usize,
    pub output_rows: usize,
    /// Rows whose year had no index value (before the gap policy ran).
    pub unmatched_rows: usize,
    pub unmatched_years: Vec<i64>,
}

impl DeflationReport {
    pub fn has_gaps(&self) -> bool {
        self.unmatched_rows > 0
    }
}

#[derive(Debug, Clone)]
pub struct Deflated {
    pub frame: DataFrame,
    pub report: DeflationReport,
}

/// Replace the nominal `value_column` by `RealValue = value / (Index / 100)`,
/// joined on `Year`.
///
/// Row order is preserved. `Index` and the nominal column are dropped.
pub fn deflate(
    df: &DataFrame,
    index: &PriceIndex,
    value_column: &str,
    policy: GapPolicy,
) -> Result<Deflated> {
    require_rows(df, "deflate")?;
    require_columns(df, &[trade::YEAR, value_column])?;
    require_integer(df, trade::YEAR)?;

    let joined = df
        .clone()
        .lazy()
        .with_row_index(ROW_ORDER, None)
        .with_column(col(trade::YEAR).cast(DataType::Int64))
        .join(
            index.frame().clone().lazy(),
            [col(trade::YEAR)],
            [col(price_index::YEAR)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([ROW_ORDER], SortMultipleOptions::default())
        .with_column(
            (col(value_column).cast(DataType::Float64)
                / (col(price_index::INDEX) / lit(100.0)))
            .alias(trade::REAL_VALUE),
        )
        .collect()?;

    let gaps = joined
        .clone()
        .lazy()
        .filter(col(price_index::INDEX).is_null())
        .select([col(trade::YEAR)])
        .collect()?;
    let unmatched_years: Vec<i64> = gaps
        .column(trade::YEAR)?
        .i64()?
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let unmatched_rows = gaps.height();

    if unmatched_rows > 0 {
        warn!(
            rows = unmatched_rows,
            years = ?unmatched_years,
            ?policy,
            "price index join left rows without an index"
        );
    }

    let kept = match policy {
        GapPolicy::Fail if unmatched_rows > 0 => {
            return Err(TradeError::JoinGap {
                rows: unmatched_rows,
                years: unmatched_years,
            })
        }
        GapPolicy::Drop => joined
            .lazy()
            .filter(col(price_index::INDEX).is_not_null())
            .collect()?,
        _ => joined,
    };

    // input columns in their order, nominal value replaced by RealValue at the end
    let mut output: Vec<Expr> = df
        .get_column_names_str()
        .into_iter()
        .filter(|c| *c != value_column && *c != trade::REAL_VALUE)
        .map(col)
        .collect();
    output.push(col(trade::REAL_VALUE));
    let frame = kept.lazy().select(output).collect()?;

    let report = DeflationReport {
        input_rows: df.height(),
        output_rows: frame.height(),
        unmatched_rows,
        unmatched_years,
    };
    Ok(Deflated { frame, report })
}
