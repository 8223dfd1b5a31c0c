use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregation::group_sum;
use crate::error::{Result, TradeError};
use crate::frame::{require_columns, require_integer, require_rows};
use crate::schema::trade;

const ROW_ORDER: &str = "__row_order";
const PREVIOUS: &str = "__previous";

/// How the lag selects the comparison row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LagMode {
    /// N rows back within the group. Calendar-correct only for gapless years.
    #[default]
    Positional,
    /// The row for `Year - N` within the group; 0 when that year is absent.
    Calendar,
}

impl FromStr for LagMode {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "positional" => Ok(Self::Positional),
            "calendar" => Ok(Self::Calendar),
            other => Err(TradeError::InvalidArgument(format!(
                "lag mode '{other}' not valid. Try: positional, calendar"
            ))),
        }
    }
}

fn key_exprs(keys: &[&str]) -> Vec<Expr> {
    keys.iter().map(|k| col(*k)).collect()
}

fn within_groups(expr: Expr, keys: &[&str]) -> Expr {
    if keys.is_empty() {
        expr
    } else {
        expr.over(key_exprs(keys))
    }
}

fn growth_expr(current: Expr, previous: Expr) -> Expr {
    when(previous.clone().is_null().or(previous.clone().eq(lit(0.0))))
        .then(lit(0.0))
        .otherwise((current - previous.clone()) / previous * lit(100.0))
        .fill_nan(lit(0.0))
        .fill_null(lit(0.0))
        .alias(trade::GROWTH_RATE)
}

/// Append `GrowthRate = (current - previous) / previous * 100` to a series
/// keyed by `keys` + `Year`. Undefined rates (no predecessor, zero, null or
/// NaN operands) are 0.
///
/// Output rows line up one-to-one with input rows. In positional mode each
/// group's rows must already be in ascending year order.
pub fn growth_rate(
    df: &DataFrame,
    keys: &[&str],
    value: &str,
    lag: usize,
    mode: LagMode,
) -> Result<DataFrame> {
    require_rows(df, "growth rate")?;
    require_columns(df, keys)?;
    require_columns(df, &[trade::YEAR, value])?;
    require_integer(df, trade::YEAR)?;
    if lag == 0 {
        return Err(TradeError::InvalidArgument("lag must be at least 1".into()));
    }
    if keys.contains(&trade::YEAR) {
        return Err(TradeError::InvalidArgument(
            "group keys must not include Year".into(),
        ));
    }

    debug!(?keys, lag, ?mode, rows = df.height(), "computing growth rates");
    let current = col(value).cast(DataType::Float64);
    match mode {
        LagMode::Positional => {
            check_year_order(df, keys)?;
            let previous = within_groups(current.clone().shift(lit(lag as i64)), keys);
            Ok(df
                .clone()
                .lazy()
                .with_column(growth_expr(current, previous))
                .collect()?)
        }
        LagMode::Calendar => calendar_growth(df, keys, value, lag, current),
    }
}

fn check_year_order(df: &DataFrame, keys: &[&str]) -> Result<()> {
    let step = col(trade::YEAR) - within_groups(col(trade::YEAR).shift(lit(1)), keys);
    let bad = df
        .clone()
        .lazy()
        .select([step.lt_eq(lit(0)).sum().cast(DataType::Int64).alias("bad")])
        .collect()?;
    let bad = bad.column("bad")?.i64()?.get(0).unwrap_or(0);
    if bad > 0 {
        return Err(TradeError::InvalidData(format!(
            "{bad} rows out of year order; sort each group by Year with one row per year"
        )));
    }
    Ok(())
}

fn calendar_growth(
    df: &DataFrame,
    keys: &[&str],
    value: &str,
    lag: usize,
    current: Expr,
) -> Result<DataFrame> {
    let mut previous_cols = key_exprs(keys);
    previous_cols.push((col(trade::YEAR).cast(DataType::Int64) + lit(lag as i64)).alias(trade::YEAR));
    previous_cols.push(col(value).cast(DataType::Float64).alias(PREVIOUS));
    let previous = df.clone().lazy().select(previous_cols);

    let mut join_keys = key_exprs(keys);
    join_keys.push(col(trade::YEAR));

    let joined = df
        .clone()
        .lazy()
        .with_row_index(ROW_ORDER, None)
        .with_column(col(trade::YEAR).cast(DataType::Int64))
        .join(
            previous,
            join_keys.clone(),
            join_keys,
            JoinArgs::new(JoinType::Left),
        )
        .sort([ROW_ORDER], SortMultipleOptions::default())
        .with_column(growth_expr(current, col(PREVIOUS)))
        .collect()?;

    if joined.height() != df.height() {
        return Err(TradeError::InvalidData(
            "calendar lag needs one row per key and year; aggregate first".into(),
        ));
    }

    let output: Vec<Expr> = joined
        .get_column_names_str()
        .iter()
        .filter(|c| ![ROW_ORDER, PREVIOUS].contains(*c))
        .map(|c| col(*c))
        .collect();
    Ok(joined.lazy().select(output).collect()?)
}

fn yearly_series(df: &DataFrame, keys: &[&str], value: &str) -> Result<DataFrame> {
    let mut group_keys = keys.to_vec();
    group_keys.push(trade::YEAR);
    group_sum(df, &group_keys, value)
}

/// Growth between two years for each group: sums `value` by `keys` + `Year`,
/// keeps `from_year` and `to_year`, and compares them. The `from_year` rows
/// carry 0.
pub fn total_growth(
    df: &DataFrame,
    keys: &[&str],
    value: &str,
    from_year: i64,
    to_year: i64,
) -> Result<DataFrame> {
    if to_year <= from_year {
        return Err(TradeError::InvalidArgument(format!(
            "to_year ({to_year}) must be after from_year ({from_year})"
        )));
    }
    let series = yearly_series(df, keys, value)?
        .lazy()
        .filter(
            col(trade::YEAR)
                .eq(lit(from_year))
                .or(col(trade::YEAR).eq(lit(to_year))),
        )
        .collect()?;
    growth_rate(
        &series,
        keys,
        value,
        (to_year - from_year) as usize,
        LagMode::Calendar,
    )
}

/// Mean period-over-period growth per group, zero-filled leading periods
/// included.
pub fn average_growth(
    df: &DataFrame,
    keys: &[&str],
    value: &str,
    lag: usize,
    mode: LagMode,
) -> Result<DataFrame> {
    if keys.is_empty() {
        return Err(TradeError::InvalidArgument(
            "average growth needs at least one group key".into(),
        ));
    }
    let series = yearly_series(df, keys, value)?;
    let rates = growth_rate(&series, keys, value, lag, mode)?;
    Ok(rates
        .lazy()
        .group_by(key_exprs(keys))
        .agg([col(trade::GROWTH_RATE)
            .mean()
            .alias(trade::AVERAGE_GROWTH_RATE)])
        .sort(keys.to_vec(), SortMultipleOptions::default())
        .collect()?)
}
