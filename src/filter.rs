use std::str::FromStr;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{Result, TradeError};
use crate::frame::{require_columns, require_integer, require_rows, string_set};
use crate::schema::{partner, trade};

/// Time window relative to the agreement cutoff year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    All,
    /// `Year <= cutoff`
    Pre,
    /// `Year >= cutoff + 1`
    Post,
}

impl FromStr for Period {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            other => Err(TradeError::InvalidArgument(format!(
                "period '{other}' not valid. Try: all, pre, post"
            ))),
        }
    }
}

impl Period {
    pub fn predicate(self, cutoff_year: i64) -> Option<Expr> {
        match self {
            Period::All => None,
            Period::Pre => Some(col(trade::YEAR).lt_eq(lit(cutoff_year))),
            Period::Post => Some(col(trade::YEAR).gt_eq(lit(cutoff_year + 1))),
        }
    }
}

/// Which rows to keep with respect to the "World" aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnerScope {
    All,
    /// Bilateral partners only; the aggregate row is dropped.
    PartnersOnly,
    WorldOnly,
}

impl FromStr for PartnerScope {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "partners" => Ok(Self::PartnersOnly),
            "world" => Ok(Self::WorldOnly),
            other => Err(TradeError::InvalidArgument(format!(
                "partner scope '{other}' not valid. Try: all, partners, world"
            ))),
        }
    }
}

/// Keep rows inside `period` whose partner is in `partners`.
///
/// An empty partner list keeps every partner.
pub fn filter_rows(
    df: &DataFrame,
    period: Period,
    partners: &[String],
    cutoff_year: i64,
) -> Result<DataFrame> {
    require_rows(df, "filter")?;

    let mut lazy = df.clone().lazy();

    if let Some(predicate) = period.predicate(cutoff_year) {
        require_columns(df, &[trade::YEAR])?;
        require_integer(df, trade::YEAR)?;
        lazy = lazy.filter(predicate);
    }

    if partners.is_empty() {
        info!("no partner list supplied, keeping all partners");
    } else {
        require_columns(df, &[trade::PARTNER])?;
        lazy = lazy.filter(col(trade::PARTNER).is_in(string_set("partners", partners), false));
    }

    let out = lazy.collect()?;
    debug!(
        ?period,
        cutoff_year,
        rows_in = df.height(),
        rows_out = out.height(),
        "filtered rows"
    );
    Ok(out)
}

/// Same as [`filter_rows`], with the period given as a tag.
/// The tag is parsed before any row is touched.
pub fn filter_by_tag(
    df: &DataFrame,
    period: &str,
    partners: &[String],
    cutoff_year: i64,
) -> Result<DataFrame> {
    let period = period.parse::<Period>()?;
    filter_rows(df, period, partners, cutoff_year)
}

/// Drop every row whose partner is in `partners`.
pub fn exclude_partners(df: &DataFrame, partners: &[String]) -> Result<DataFrame> {
    require_rows(df, "exclude partners")?;
    require_columns(df, &[trade::PARTNER])?;
    if partners.is_empty() {
        return Ok(df.clone());
    }
    Ok(df
        .clone()
        .lazy()
        .filter(
            col(trade::PARTNER)
                .is_in(string_set("excluded", partners), false)
                .not(),
        )
        .collect()?)
}

/// Keep rows whose `Flow` is one of `flows`. An empty list keeps every row.
pub fn filter_flows(df: &DataFrame, flows: &[String]) -> Result<DataFrame> {
    require_rows(df, "flow filter")?;
    require_columns(df, &[trade::FLOW])?;
    if flows.is_empty() {
        return Ok(df.clone());
    }
    let out = df
        .clone()
        .lazy()
        .filter(
            col(trade::FLOW)
                .cast(DataType::String)
                .is_in(string_set("flows", flows), false),
        )
        .collect()?;
    debug!(
        ?flows,
        rows_in = df.height(),
        rows_out = out.height(),
        "filtered flows"
    );
    Ok(out)
}

pub fn filter_scope(df: &DataFrame, scope: PartnerScope) -> Result<DataFrame> {
    require_rows(df, "partner scope")?;
    require_columns(df, &[trade::PARTNER])?;
    let is_world = col(trade::PARTNER).eq(lit(partner::WORLD));
    let lazy = df.clone().lazy();
    let out = match scope {
        PartnerScope::All => return Ok(df.clone()),
        PartnerScope::PartnersOnly => lazy.filter(is_world.not()),
        PartnerScope::WorldOnly => lazy.filter(is_world),
    };
    Ok(out.collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataFrame {
        df!(
            "Year" => [2009i64, 2011, 2012, 2015, 2022, 2011],
            "Partner" => ["Switzerland", "Peru", "Switzerland", "World", "Peru", "Norway"],
            "Value" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        )
        .unwrap()
    }

    fn years(df: &DataFrame) -> Vec<i64> {
        df.column("Year")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    fn partners(df: &DataFrame) -> Vec<String> {
        crate::frame::column_strings(df, "Partner").unwrap()
    }

    #[test]
    fn pre_and_post_partition_the_table() {
        let df = table();
        let allow = vec!["Switzerland".to_string(), "Peru".to_string()];
        let both = filter_rows(&df, Period::All, &allow, 2011).unwrap();
        let pre = filter_rows(&df, Period::Pre, &allow, 2011).unwrap();
        let post = filter_rows(&df, Period::Post, &allow, 2011).unwrap();

        assert_eq!(years(&pre), vec![2009, 2011]);
        assert_eq!(years(&post), vec![2012, 2022]);
        assert_eq!(pre.height() + post.height(), both.height());

        let union = pre.vstack(&post).unwrap();
        let sorted = |d: &DataFrame| {
            d.sort(["Year", "Partner"], SortMultipleOptions::default())
                .unwrap()
        };
        assert!(sorted(&union).equals(&sorted(&both)));
    }

    #[test]
    fn empty_partner_list_keeps_everyone() {
        let out = filter_rows(&table(), Period::All, &[], 2011).unwrap();
        assert_eq!(out.height(), 6);
    }

    #[test]
    fn partner_list_is_a_set_membership_test() {
        let allow = vec!["Norway".to_string(), "Atlantis".to_string()];
        let out = filter_rows(&table(), Period::All, &allow, 2011).unwrap();
        assert_eq!(partners(&out), vec!["Norway"]);
    }

    #[test]
    fn unknown_period_tag_is_rejected() {
        let err = filter_by_tag(&table(), "2011", &[], 2011).unwrap_err();
        assert!(matches!(err, TradeError::InvalidArgument(_)));
        assert_eq!(
            filter_by_tag(&table(), "post", &[], 2011).unwrap().height(),
            3
        );
    }

    #[test]
    fn string_year_needs_coercion() {
        let df = df!("Year" => ["2011"], "Partner" => ["Peru"]).unwrap();
        assert!(matches!(
            filter_rows(&df, Period::Pre, &[], 2011),
            Err(TradeError::InvalidData(_))
        ));
    }

    #[test]
    fn flow_filter_drops_reporter_descriptions() {
        let df = df!(
            "Year" => [2011i64, 2011, 2012, 2012],
            "Flow" => ["M", "Re-exports", "X", "Imports"],
            "Partner" => ["Peru", "Peru", "Norway", "World"]
        )
        .unwrap();
        let out = filter_flows(&df, &["M".to_string(), "X".to_string()]).unwrap();
        assert_eq!(partners(&out), vec!["Peru", "Norway"]);
        assert_eq!(filter_flows(&df, &[]).unwrap().height(), 4);
        assert!(matches!(
            filter_flows(&table(), &["M".to_string()]),
            Err(TradeError::MissingColumn(_))
        ));
    }

    #[test]
    fn exclusion_and_scope() {
        let df = table();
        let out = exclude_partners(&df, &["Peru".to_string(), "World".to_string()]).unwrap();
        assert_eq!(partners(&out), vec!["Switzerland", "Switzerland", "Norway"]);

        let world = filter_scope(&df, PartnerScope::WorldOnly).unwrap();
        assert_eq!(years(&world), vec![2015]);
        let bilateral = filter_scope(&df, PartnerScope::PartnersOnly).unwrap();
        assert_eq!(bilateral.height(), 5);
        assert!("galaxy".parse::<PartnerScope>().is_err());
    }
}
