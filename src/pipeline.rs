use std::path::Path;

use polars::prelude::*;
use tracing::{info, info_span};

use crate::aggregation::group_sum;
use crate::commodity::{retain_codes, truncate_codes};
use crate::config::PipelineConfig;
use crate::deflator::{deflate, Deflated, PriceIndex};
use crate::error::{Result, TradeError};
use crate::filter::{filter_flows, filter_rows, filter_scope, PartnerScope, Period};
use crate::growth::growth_rate;
use crate::io::read_price_index;
use crate::normalize::{normalize, NormalizeMode};
use crate::region::classify_region;
use crate::schema::trade;
use crate::selection::{control_group, top_k, ThresholdBand};

pub struct TradePipeline {
    config: PipelineConfig,
    price_index: Option<PriceIndex>,
}

impl TradePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            price_index: None,
        }
    }

    pub fn with_price_index(mut self, index: PriceIndex) -> Self {
        self.price_index = Some(index);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn price_index(&self) -> Option<&PriceIndex> {
        self.price_index.as_ref()
    }

    /// Reshape an already-loaded wide index table for the configured country.
    pub fn set_price_index_table(&mut self, wide: &DataFrame) -> Result<&PriceIndex> {
        let index = PriceIndex::from_wide(
            wide,
            &self.config.index_country_column,
            &self.config.reference_country,
            self.config.index_years(),
        )?;
        Ok(self.price_index.insert(index))
    }

    pub fn load_price_index(&mut self, path: impl AsRef<Path>) -> Result<&PriceIndex> {
        let wide = read_price_index(path)?;
        self.set_price_index_table(&wide)
    }

    /// Rename and coerce a raw trade table with the configured maps.
    pub fn normalize(&self, raw: &DataFrame) -> Result<DataFrame> {
        normalize(
            raw,
            NormalizeMode::All,
            Some(&self.config.columns),
            Some(&self.config.dtypes),
        )
    }

    /// Build the analysis table: normalized, flows and codes filtered,
    /// partners filtered, region attached, values deflated.
    pub fn main_table(&self, raw: &DataFrame) -> Result<Deflated> {
        let span = info_span!("main_table", rows = raw.height());
        let _guard = span.enter();

        let index = self
            .price_index
            .as_ref()
            .ok_or_else(|| TradeError::MissingData("price index not loaded".into()))?;

        let df = self.normalize(raw)?;
        let df = filter_flows(&df, &self.config.flows)?;
        let df = truncate_codes(&df)?;
        let df = retain_codes(&df, &self.config.commodity_codes)?;
        let df = filter_rows(&df, Period::All, &self.config.partners, self.config.cutoff_year)?;
        let df = classify_region(&df)?;
        let deflated = deflate(&df, index, trade::VALUE, self.config.join_gap_policy)?;

        info!(
            rows = deflated.frame.height(),
            join_gaps = deflated.report.unmatched_rows,
            "main table ready"
        );
        Ok(deflated)
    }

    /// Partners whose pre-agreement total falls inside `band`, plus `sentinels`.
    pub fn control_group(
        &self,
        normalized: &DataFrame,
        band: ThresholdBand,
        sentinels: &[String],
    ) -> Result<Vec<String>> {
        let df = filter_flows(normalized, &self.config.flows)?;
        let pre = filter_rows(&df, Period::Pre, &[], self.config.cutoff_year)?;
        control_group(&pre, trade::PARTNER, trade::VALUE, band, sentinels)
    }

    /// Top `k` 4-digit codes by pre-agreement value for partners in `region`,
    /// ignoring the World aggregate.
    pub fn top_codes(&self, normalized: &DataFrame, region: &str, k: usize) -> Result<Vec<String>> {
        let df = filter_flows(normalized, &self.config.flows)?;
        let df = filter_scope(&df, PartnerScope::PartnersOnly)?;
        let df = truncate_codes(&df)?;
        let df = filter_rows(&df, Period::Pre, &[], self.config.cutoff_year)?;
        let df = classify_region(&df)?
            .lazy()
            .filter(col(trade::REGION).eq(lit(region)))
            .collect()?;
        top_k(&df, trade::COMMODITY_CODE, trade::VALUE, k)
    }

    /// `value` summed by `keys` + `Year`, with the configured growth rate.
    pub fn growth_table(&self, df: &DataFrame, keys: &[&str], value: &str) -> Result<DataFrame> {
        let mut group_keys = keys.to_vec();
        group_keys.push(trade::YEAR);
        let series = group_sum(df, &group_keys, value)?;
        growth_rate(&series, keys, value, self.config.lag, self.config.lag_mode)
    }
}
