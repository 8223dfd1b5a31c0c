use polars::prelude::*;

use crate::error::{Result, TradeError};

pub(crate) fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(TradeError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Reject an empty table before a stage runs.
pub(crate) fn require_rows(df: &DataFrame, stage: &str) -> Result<()> {
    if df.height() == 0 {
        return Err(TradeError::MissingData(format!(
            "{stage}: input table has no rows"
        )));
    }
    Ok(())
}

pub(crate) fn require_integer(df: &DataFrame, column: &str) -> Result<()> {
    let dtype = df.column(column)?.dtype();
    if !dtype.is_integer() {
        return Err(TradeError::InvalidData(format!(
            "column '{column}' must be an integer column, found {dtype}; coerce types first"
        )));
    }
    Ok(())
}

/// Cast `column` to `target`, trimming whitespace first when the source is text.
pub(crate) fn cast_expr(column: &str, current: &DataType, target: &DataType) -> Expr {
    if current == target {
        col(column)
    } else if current == &DataType::String && (target.is_integer() || target.is_float()) {
        col(column)
            .str()
            .strip_chars(lit(" \t\r\n"))
            .strict_cast(target.clone())
    } else {
        col(column).strict_cast(target.clone())
    }
}

/// Literal string set for `is_in` membership tests.
pub(crate) fn string_set(name: &str, values: &[String]) -> Expr {
    lit(Series::new(name.into(), values))
}

/// Non-null values of a column, rendered as strings.
pub(crate) fn column_strings(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let as_str = df.column(column)?.cast(&DataType::String)?;
    Ok(as_str
        .str()?
        .into_iter()
        .flatten()
        .map(|s| s.to_string())
        .collect())
}
