use std::path::PathBuf;

use polars::prelude::*;
use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;

use crate::aggregation::{group_sum, pivot_table, AggFunc};
use crate::commodity::truncate_codes;
use crate::config::PipelineConfig;
use crate::deflator::DeflationReport;
use crate::error::TradeError;
use crate::filter::{filter_by_tag, filter_flows};
use crate::growth::{growth_rate, LagMode};
use crate::io::{self, TextEncoding};
use crate::normalize::{normalize, NormalizeMode};
use crate::pipeline::TradePipeline;
use crate::region::classify_region;
use crate::schema::*;
use crate::selection::ThresholdBand;
use crate::transform;

fn encoding(latin1: bool) -> TextEncoding {
    if latin1 {
        TextEncoding::Latin1
    } else {
        TextEncoding::Utf8
    }
}

fn str_refs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

#[pyclass]
pub struct TradeModel {
    base_path: PathBuf,
    pipeline: TradePipeline,
    trade: Option<DataFrame>,
    last_report: Option<DeflationReport>,
}

#[pymethods]
impl TradeModel {
    /// `config` is a TOML file relative to `base_path`.
    #[new]
    #[pyo3(signature = (base_path, config=None))]
    fn new(base_path: String, config: Option<&str>) -> PyResult<Self> {
        let base_path = PathBuf::from(base_path);
        let config = match config {
            Some(file) => PipelineConfig::load(base_path.join(file))?,
            None => PipelineConfig::default(),
        };
        Ok(Self {
            base_path,
            pipeline: TradePipeline::new(config),
            trade: None,
            last_report: None,
        })
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load one raw trade CSV (all columns as strings).
    #[pyo3(signature = (filename, latin1=true))]
    fn load_trade(&mut self, filename: &str, latin1: bool) -> PyResult<PyDataFrame> {
        let df = io::read_trade_csv(self.base_path.join(filename), encoding(latin1))?;
        self.trade = Some(df.clone());
        self.last_report = None;
        Ok(PyDataFrame(df))
    }

    /// Load and stack every CSV in a directory, keeping the mapped source columns.
    #[pyo3(signature = (dirname, latin1=true))]
    fn load_trade_dir(&mut self, dirname: &str, latin1: bool) -> PyResult<PyDataFrame> {
        let columns: Vec<String> = self.pipeline.config().columns.keys().cloned().collect();
        let df = io::read_trade_dir(self.base_path.join(dirname), encoding(latin1), &columns)?;
        self.trade = Some(df.clone());
        self.last_report = None;
        Ok(PyDataFrame(df))
    }

    /// Load the wide price-index CSV and keep the reference country's series.
    #[pyo3(signature = (filename=None))]
    fn load_price_index(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let fname = filename.unwrap_or("cpi.csv");
        let index = self.pipeline.load_price_index(self.base_path.join(fname))?;
        Ok(PyDataFrame(index.frame().clone()))
    }

    // ── Pipeline ────────────────────────────────────────────────────────────

    fn main_table(&mut self) -> PyResult<PyDataFrame> {
        let raw = self.loaded_trade()?;
        let deflated = self.pipeline.main_table(raw)?;
        self.last_report = Some(deflated.report);
        Ok(PyDataFrame(deflated.frame))
    }

    /// `(rows, years)` without an index in the last `main_table` run.
    #[getter]
    fn join_gaps(&self) -> Option<(usize, Vec<i64>)> {
        self.last_report
            .as_ref()
            .map(|r| (r.unmatched_rows, r.unmatched_years.clone()))
    }

    #[pyo3(signature = (lower, upper, sentinels=None))]
    fn control_group(
        &self,
        lower: f64,
        upper: f64,
        sentinels: Option<Vec<String>>,
    ) -> PyResult<Vec<String>> {
        let sentinels = sentinels.unwrap_or_else(|| {
            vec![
                "Norway".to_string(),
                "Iceland".to_string(),
                partner::WORLD.to_string(),
            ]
        });
        let normalized = self.pipeline.normalize(self.loaded_trade()?)?;
        let band = ThresholdBand::new(lower, upper)?;
        Ok(self.pipeline.control_group(&normalized, band, &sentinels)?)
    }

    #[pyo3(signature = (region=region::EFTA, k=5))]
    fn top_codes(&self, region: &str, k: usize) -> PyResult<Vec<String>> {
        let normalized = self.pipeline.normalize(self.loaded_trade()?)?;
        Ok(self.pipeline.top_codes(&normalized, region, k)?)
    }

    #[pyo3(signature = (df, keys, value=trade::REAL_VALUE))]
    fn growth_table(&self, df: PyDataFrame, keys: Vec<String>, value: &str) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.pipeline.growth_table(
            &df.0,
            &str_refs(&keys),
            value,
        )?))
    }

    // ── Snapshots ───────────────────────────────────────────────────────────

    /// Write a snapshot CSV plus manifest; returns the snapshot id.
    fn write_snapshot(&self, df: PyDataFrame, filename: &str) -> PyResult<String> {
        let manifest = io::write_snapshot(&df.0, self.base_path.join(filename))?;
        Ok(manifest.snapshot_id.to_string())
    }

    fn read_snapshot(&self, filename: &str) -> PyResult<PyDataFrame> {
        let (df, _) = io::read_snapshot(self.base_path.join(filename))?;
        Ok(PyDataFrame(df))
    }

    // ── Stage helpers ───────────────────────────────────────────────────────

    #[staticmethod]
    #[pyo3(signature = (df, mode="all"))]
    fn normalize(df: PyDataFrame, mode: &str) -> PyResult<PyDataFrame> {
        let mode: NormalizeMode = mode.parse()?;
        Ok(PyDataFrame(normalize(&df.0, mode, None, None)?))
    }

    #[staticmethod]
    #[pyo3(signature = (df, period="all", partners=None, cutoff_year=2011))]
    fn filter_rows(
        df: PyDataFrame,
        period: &str,
        partners: Option<Vec<String>>,
        cutoff_year: i64,
    ) -> PyResult<PyDataFrame> {
        let partners = partners.unwrap_or_default();
        Ok(PyDataFrame(filter_by_tag(&df.0, period, &partners, cutoff_year)?))
    }

    #[staticmethod]
    fn filter_flows(df: PyDataFrame, flows: Vec<String>) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(filter_flows(&df.0, &flows)?))
    }

    #[staticmethod]
    fn classify_region(df: PyDataFrame) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(classify_region(&df.0)?))
    }

    #[staticmethod]
    fn truncate_codes(df: PyDataFrame) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(truncate_codes(&df.0)?))
    }

    #[staticmethod]
    #[pyo3(signature = (df, keys, value=trade::REAL_VALUE))]
    fn group_sum(df: PyDataFrame, keys: Vec<String>, value: &str) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(group_sum(&df.0, &str_refs(&keys), value)?))
    }

    #[staticmethod]
    #[pyo3(signature = (df, keys, value=trade::REAL_VALUE, lag=1, mode="positional"))]
    fn growth_rate(
        df: PyDataFrame,
        keys: Vec<String>,
        value: &str,
        lag: usize,
        mode: &str,
    ) -> PyResult<PyDataFrame> {
        let mode: LagMode = mode.parse()?;
        Ok(PyDataFrame(growth_rate(&df.0, &str_refs(&keys), value, lag, mode)?))
    }

    #[staticmethod]
    #[pyo3(signature = (df, index, columns, values=trade::REAL_VALUE, aggfunc="sum"))]
    fn pivot_table(
        df: PyDataFrame,
        index: Vec<String>,
        columns: &str,
        values: &str,
        aggfunc: &str,
    ) -> PyResult<PyDataFrame> {
        let func: AggFunc = aggfunc.parse()?;
        Ok(PyDataFrame(pivot_table(
            &df.0,
            &str_refs(&index),
            columns,
            values,
            func,
        )?))
    }

    #[staticmethod]
    #[pyo3(signature = (df, column=trade::REAL_VALUE, alias=trade::LOG_REAL_VALUE))]
    fn log1p(df: PyDataFrame, column: &str, alias: &str) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(transform::log1p(&df.0, column, alias)?))
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn trade_df(&self) -> PyResult<Option<PyDataFrame>> {
        Ok(self.trade.clone().map(PyDataFrame))
    }

    #[getter]
    fn price_index_df(&self) -> PyResult<Option<PyDataFrame>> {
        Ok(self
            .pipeline
            .price_index()
            .map(|index| PyDataFrame(index.frame().clone())))
    }
}

impl TradeModel {
    fn loaded_trade(&self) -> PyResult<&DataFrame> {
        self.trade
            .as_ref()
            .ok_or_else(|| TradeError::MissingData("trade data not loaded".into()).into())
    }
}
