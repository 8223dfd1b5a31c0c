use std::str::FromStr;

use polars::prelude::*;
use tracing::debug;

use crate::error::{Result, TradeError};
use crate::filter::{filter_rows, Period};
use crate::frame::{column_strings, require_columns, require_rows};

/// Reduction applied to each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Mean,
    Min,
    Max,
    Count,
}

impl FromStr for AggFunc {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(Self::Sum),
            "mean" | "avg" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "count" => Ok(Self::Count),
            other => Err(TradeError::InvalidArgument(format!(
                "Invalid aggfunc: '{other}'. Must be one of sum, mean, min, max, count"
            ))),
        }
    }
}

impl AggFunc {
    pub fn apply(self, expr: Expr) -> Expr {
        match self {
            AggFunc::Sum => expr.sum(),
            AggFunc::Mean => expr.mean(),
            AggFunc::Min => expr.min(),
            AggFunc::Max => expr.max(),
            AggFunc::Count => expr.count(),
        }
    }
}

/// Sum `value` over every observed combination of `keys`.
///
/// Only combinations present in the data produce a row; the result is
/// sorted by `keys` so the key tuple is unique and ordered.
pub fn group_sum(df: &DataFrame, keys: &[&str], value: &str) -> Result<DataFrame> {
    group_agg(df, keys, value, AggFunc::Sum)
}

pub fn group_agg(df: &DataFrame, keys: &[&str], value: &str, func: AggFunc) -> Result<DataFrame> {
    require_rows(df, "aggregate")?;
    if keys.is_empty() {
        return Err(TradeError::InvalidArgument(
            "at least one grouping key is required".into(),
        ));
    }
    require_columns(df, keys)?;
    require_columns(df, &[value])?;

    let out = df
        .clone()
        .lazy()
        .group_by(keys.iter().map(|k| col(*k)).collect::<Vec<_>>())
        .agg([func.apply(col(value)).alias(value)])
        .sort(keys.to_vec(), SortMultipleOptions::default())
        .collect()?;

    debug!(?keys, ?func, rows_in = df.height(), groups = out.height(), "aggregated");
    Ok(out)
}

/// Spreadsheet-style pivot: one row per observed `index` tuple, one column
/// per observed label of `columns`, cells reduced with `func`.
///
/// Cells with no contributing rows are null.
pub fn pivot_table(
    df: &DataFrame,
    index: &[&str],
    columns: &str,
    values: &str,
    func: AggFunc,
) -> Result<DataFrame> {
    require_rows(df, "pivot")?;
    if index.is_empty() {
        return Err(TradeError::InvalidArgument(
            "pivot needs at least one index column".into(),
        ));
    }
    require_columns(df, index)?;
    require_columns(df, &[columns, values])?;

    let mut labels = column_strings(df, columns)?;
    labels.sort();
    labels.dedup();

    let label_col = col(columns).cast(DataType::String);
    let cells: Vec<Expr> = labels
        .iter()
        .map(|label| {
            let mask = label_col.clone().eq(lit(label.as_str()));
            when(mask.clone().sum().gt(lit(0)))
                .then(func.apply(col(values).filter(mask)))
                .otherwise(lit(NULL))
                .alias(label.as_str())
        })
        .collect();

    Ok(df
        .clone()
        .lazy()
        .group_by(index.iter().map(|k| col(*k)).collect::<Vec<_>>())
        .agg(cells)
        .sort(index.to_vec(), SortMultipleOptions::default())
        .collect()?)
}

/// Pivot the pre-agreement and post-agreement windows separately.
///
/// A window without rows gives an empty table holding only the index columns.
pub fn pivot_by_period(
    df: &DataFrame,
    index: &[&str],
    columns: &str,
    values: &str,
    func: AggFunc,
    cutoff_year: i64,
) -> Result<(DataFrame, DataFrame)> {
    require_rows(df, "pivot")?;
    require_columns(df, index)?;
    require_columns(df, &[columns, values])?;

    let window = |period: Period| -> Result<DataFrame> {
        let rows = filter_rows(df, period, &[], cutoff_year)?;
        if rows.height() == 0 {
            debug!(?period, "empty pivot window");
            return Ok(rows.select(index.iter().copied())?);
        }
        pivot_table(&rows, index, columns, values, func)
    };
    Ok((window(Period::Pre)?, window(Period::Post)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trades() -> DataFrame {
        df!(
            "Year" => [2011i64, 2011, 2011, 2012, 2012],
            "Partner" => ["Peru", "Peru", "Norway", "Peru", "Norway"],
            "CommodityCode" => ["7108", "7108", "2709", "7108", "7108"],
            "Value" => [10.0, 5.0, 7.0, 1.5, 2.5]
        )
        .unwrap()
    }

    fn total(df: &DataFrame, column: &str) -> f64 {
        df.column(column).unwrap().f64().unwrap().sum().unwrap()
    }

    #[test]
    fn grouping_conserves_the_total() {
        let df = trades();
        for keys in [
            vec!["Year"],
            vec!["Partner"],
            vec!["Year", "Partner"],
            vec!["Partner", "CommodityCode", "Year"],
        ] {
            let out = group_sum(&df, &keys, "Value").unwrap();
            assert!((total(&out, "Value") - total(&df, "Value")).abs() < 1e-9);
        }
    }

    #[test]
    fn key_tuples_are_unique_and_sorted() {
        let out = group_sum(&trades(), &["Year", "Partner"], "Value").unwrap();
        assert_eq!(out.height(), 4);
        assert_eq!(
            column_strings(&out, "Partner").unwrap(),
            vec!["Norway", "Peru", "Norway", "Peru"]
        );
        let values: Vec<f64> = out
            .column("Value")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(values, vec![7.0, 15.0, 2.5, 1.5]);
    }

    #[test]
    fn absent_combinations_are_omitted() {
        let out = group_sum(&trades(), &["Partner", "CommodityCode"], "Value").unwrap();
        // Peru never traded 2709
        assert_eq!(out.height(), 3);
    }

    #[test]
    fn keys_are_required() {
        assert!(matches!(
            group_sum(&trades(), &[], "Value"),
            Err(TradeError::InvalidArgument(_))
        ));
        assert!(matches!(
            group_sum(&trades(), &["Flow"], "Value"),
            Err(TradeError::MissingColumn(_))
        ));
    }

    #[test]
    fn pivot_spreads_labels_into_columns() {
        let out = pivot_table(&trades(), &["Partner"], "Year", "Value", AggFunc::Sum).unwrap();
        let names: Vec<&str> = out
            .get_column_names()
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(names, vec!["Partner", "2011", "2012"]);
        let y2011: Vec<Option<f64>> = out.column("2011").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(y2011, vec![Some(7.0), Some(15.0)]);
    }

    #[test]
    fn pivot_cells_without_rows_are_null() {
        let out =
            pivot_table(&trades(), &["Partner"], "CommodityCode", "Value", AggFunc::Mean).unwrap();
        let col2709: Vec<Option<f64>> =
            out.column("2709").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(col2709, vec![Some(7.0), None]);
    }

    #[test]
    fn pivot_by_period_splits_at_cutoff() {
        let (pre, post) =
            pivot_by_period(&trades(), &["Partner"], "CommodityCode", "Value", AggFunc::Sum, 2011)
                .unwrap();
        assert_eq!(pre.width(), 3);
        assert_eq!(post.width(), 2);
        assert!((total(&post, "7108") - 4.0).abs() < 1e-9);
    }

    #[test]
    fn empty_window_pivots_to_an_empty_table() {
        let df = df!(
            "Year" => [2010i64, 2011],
            "Partner" => ["Peru", "Norway"],
            "CommodityCode" => ["7108", "2709"],
            "Value" => [1.0, 2.0]
        )
        .unwrap();
        let (pre, post) =
            pivot_by_period(&df, &["Partner"], "CommodityCode", "Value", AggFunc::Sum, 2011)
                .unwrap();
        assert_eq!(pre.height(), 2);
        assert_eq!(post.height(), 0);
        assert_eq!(post.get_column_names_str(), vec!["Partner"]);
    }

    #[test]
    fn aggfunc_tags() {
        assert_eq!("avg".parse::<AggFunc>().unwrap(), AggFunc::Mean);
        assert!("median".parse::<AggFunc>().is_err());
    }
}
