use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::frame::{require_columns, require_rows, string_set};
use crate::schema::trade;

/// Length of the coarse commodity heading.
pub const PREFIX_LEN: usize = 4;

/// First [`PREFIX_LEN`] characters of `code`. Shorter codes come back whole.
pub fn truncate_code(code: &str) -> &str {
    match code.char_indices().nth(PREFIX_LEN) {
        Some((end, _)) => &code[..end],
        None => code,
    }
}

/// Replace `CommodityCode` with its 4-character prefix, stringifying numeric
/// codes first. Codes are not left-padded.
pub fn truncate_codes(df: &DataFrame) -> Result<DataFrame> {
    require_rows(df, "truncate codes")?;
    require_columns(df, &[trade::COMMODITY_CODE])?;

    let dtype = df.column(trade::COMMODITY_CODE)?.dtype();
    let as_text = if dtype.is_float() {
        col(trade::COMMODITY_CODE)
            .cast(DataType::Int64)
            .cast(DataType::String)
    } else {
        col(trade::COMMODITY_CODE).cast(DataType::String)
    };

    Ok(df
        .clone()
        .lazy()
        .with_column(
            as_text
                .str()
                .slice(lit(0i64), lit(PREFIX_LEN as u64))
                .alias(trade::COMMODITY_CODE),
        )
        .collect()?)
}

/// Keep only rows whose code is in `codes`. An empty list keeps every row.
pub fn retain_codes(df: &DataFrame, codes: &[String]) -> Result<DataFrame> {
    require_rows(df, "retain codes")?;
    require_columns(df, &[trade::COMMODITY_CODE])?;
    if codes.is_empty() {
        info!("no commodity code list supplied, keeping all codes");
        return Ok(df.clone());
    }
    Ok(df
        .clone()
        .lazy()
        .filter(
            col(trade::COMMODITY_CODE)
                .cast(DataType::String)
                .is_in(string_set("codes", codes), false),
        )
        .collect()?)
}
