use polars::prelude::*;

use crate::error::Result;
use crate::frame::{require_columns, require_rows};

/// Add `alias = ln(1 + column)` for magnitude comparison across partners.
pub fn log1p(df: &DataFrame, column: &str, alias: &str) -> Result<DataFrame> {
    require_rows(df, "log transform")?;
    require_columns(df, &[column])?;
    Ok(df
        .clone()
        .lazy()
        .with_column(col(column).cast(DataType::Float64).log1p().alias(alias))
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::trade;

    #[test]
    fn adds_log_column_and_keeps_source() {
        let df = df!("RealValue" => [0.0, std::f64::consts::E - 1.0]).unwrap();
        let out = log1p(&df, trade::REAL_VALUE, trade::LOG_REAL_VALUE).unwrap();
        assert_eq!(out.width(), 2);
        let logs: Vec<f64> = out
            .column(trade::LOG_REAL_VALUE)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(logs[0].abs() < 1e-12);
        assert!((logs[1] - 1.0).abs() < 1e-12);
    }
}
