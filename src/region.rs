use polars::prelude::*;

use crate::error::Result;
use crate::frame::{require_columns, require_rows};
use crate::schema::{partner, region, trade};

/// Region of a single partner name.
pub fn region_of(partner_name: &str) -> &'static str {
    if partner_name == partner::WORLD {
        region::WORLD
    } else if region::EFTA_MEMBERS.contains(&partner_name) {
        region::EFTA
    } else {
        region::NO_EFTA
    }
}

/// Expression computing the region column from the partner column.
/// Null partners fall through to `NO EFTA`.
pub fn region_expr() -> Expr {
    let efta = lit(Series::new("efta".into(), region::EFTA_MEMBERS.as_slice()));
    when(col(trade::PARTNER).eq(lit(partner::WORLD)))
        .then(lit(region::WORLD))
        .when(col(trade::PARTNER).is_in(efta, false))
        .then(lit(region::EFTA))
        .otherwise(lit(region::NO_EFTA))
        .alias(trade::REGION)
}

/// Add (or recompute) the `Region` column.
pub fn classify_region(df: &DataFrame) -> Result<DataFrame> {
    require_rows(df, "classify region")?;
    require_columns(df, &[trade::PARTNER])?;
    Ok(df.clone().lazy().with_column(region_expr()).collect()?)
}
