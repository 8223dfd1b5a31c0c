use polars::prelude::*;
use tracing::debug;

use crate::error::{Result, TradeError};
use crate::frame::{column_strings, require_columns, require_rows};

/// Exclusive value band: `lower < total < upper`. Bounds are in the units of
/// the data; nothing is rescaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdBand {
    pub lower: f64,
    pub upper: f64,
}

impl ThresholdBand {
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if lower.is_nan() || upper.is_nan() || lower >= upper {
            return Err(TradeError::InvalidArgument(format!(
                "threshold band ({lower}, {upper}) is empty"
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower < value && value < self.upper
    }
}

/// Totals of `value` per `key`, largest first. Ties keep ascending key order.
pub fn ranked_totals(df: &DataFrame, key: &str, value: &str) -> Result<DataFrame> {
    require_rows(df, "rank")?;
    require_columns(df, &[key, value])?;
    Ok(df
        .clone()
        .lazy()
        .group_by([col(key)])
        .agg([col(value).cast(DataType::Float64).sum().alias(value)])
        .sort(
            [value, key],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false])
                .with_maintain_order(true),
        )
        .collect()?)
}

/// Members whose total lies inside `band`, largest first, followed by each
/// sentinel not already selected.
pub fn control_group(
    df: &DataFrame,
    key: &str,
    value: &str,
    band: ThresholdBand,
    sentinels: &[String],
) -> Result<Vec<String>> {
    let totals = ranked_totals(df, key, value)?;
    let in_band = totals
        .lazy()
        .filter(
            col(value)
                .gt(lit(band.lower))
                .and(col(value).lt(lit(band.upper))),
        )
        .collect()?;

    let mut members = column_strings(&in_band, key)?;
    let selected = members.len();
    for sentinel in sentinels {
        if !members.contains(sentinel) {
            members.push(sentinel.clone());
        }
    }
    debug!(selected, total = members.len(), "built control group");
    Ok(members)
}

/// The `k` keys with the largest totals.
pub fn top_k(df: &DataFrame, key: &str, value: &str, k: usize) -> Result<Vec<String>> {
    let totals = ranked_totals(df, key, value)?;
    column_strings(&totals.head(Some(k)), key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals() -> DataFrame {
        df!(
            "Partner" => ["China", "Peru", "Aruba", "Peru", "Spain", "USA", "Chile"],
            "Value" => [50.0, 20.0, 1.0, 25.0, 45.0, 900.0, 45.0]
        )
        .unwrap()
    }

    #[test]
    fn band_is_exclusive_and_sentinels_are_appended() {
        let band = ThresholdBand::new(10.0, 50.0).unwrap();
        let sentinels = vec!["Norway".to_string(), "Peru".to_string(), "World".to_string()];
        let group = control_group(&totals(), "Partner", "Value", band, &sentinels).unwrap();
        // Peru sums to 45 and ties with Chile and Spain; China sits on the
        // upper bound and is left out
        assert_eq!(group, vec!["Chile", "Peru", "Spain", "Norway", "World"]);
    }

    #[test]
    fn top_k_orders_descending_with_stable_ties() {
        let top = top_k(&totals(), "Partner", "Value", 4).unwrap();
        assert_eq!(top, vec!["USA", "China", "Chile", "Peru"]);
        assert_eq!(top_k(&totals(), "Partner", "Value", 50).unwrap().len(), 6);
    }

    #[test]
    fn empty_band_is_rejected() {
        assert!(ThresholdBand::new(5.0, 5.0).is_err());
        assert!(ThresholdBand::new(8.9e8, 67e9).unwrap().contains(1e9));
    }
}
