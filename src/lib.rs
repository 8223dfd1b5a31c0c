pub mod aggregation;
pub mod commodity;
pub mod config;
pub mod deflator;
pub mod error;
pub mod filter;
mod frame;
pub mod growth;
pub mod io;
pub mod normalize;
pub mod pipeline;
pub mod region;
pub mod schema;
pub mod selection;
pub mod transform;

#[cfg(feature = "python")]
mod model;

pub use config::{ColumnType, PipelineConfig};
pub use deflator::{deflate, Deflated, DeflationReport, GapPolicy, PriceIndex};
pub use error::{Result, TradeError};
pub use filter::{PartnerScope, Period};
pub use growth::LagMode;
pub use pipeline::TradePipeline;

#[cfg(feature = "python")]
mod python {
    use pyo3::prelude::*;
    use pyo3::types::PyModule;

    use crate::model::TradeModel;
    use crate::schema;

    /// Export schema constants as Python submodules
    fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // Source
        let source = PyModule::new(m.py(), "source")?;
        source.add("PERIOD", schema::source::PERIOD)?;
        source.add("REPORTER", schema::source::REPORTER)?;
        source.add("COMMODITY", schema::source::COMMODITY)?;
        source.add("PARTNER", schema::source::PARTNER)?;
        source.add("FOB_VALUE", schema::source::FOB_VALUE)?;
        m.add_submodule(&source)?;

        // Trade
        let trade = PyModule::new(m.py(), "trade")?;
        trade.add("YEAR", schema::trade::YEAR)?;
        trade.add("FLOW", schema::trade::FLOW)?;
        trade.add("COMMODITY_CODE", schema::trade::COMMODITY_CODE)?;
        trade.add("PARTNER", schema::trade::PARTNER)?;
        trade.add("VALUE", schema::trade::VALUE)?;
        trade.add("REAL_VALUE", schema::trade::REAL_VALUE)?;
        trade.add("LOG_REAL_VALUE", schema::trade::LOG_REAL_VALUE)?;
        trade.add("REGION", schema::trade::REGION)?;
        trade.add("GROWTH_RATE", schema::trade::GROWTH_RATE)?;
        trade.add("AVERAGE_GROWTH_RATE", schema::trade::AVERAGE_GROWTH_RATE)?;
        m.add_submodule(&trade)?;

        // Price index
        let price_index = PyModule::new(m.py(), "price_index")?;
        price_index.add("COUNTRY_CODE", schema::price_index::COUNTRY_CODE)?;
        price_index.add("YEAR", schema::price_index::YEAR)?;
        price_index.add("INDEX", schema::price_index::INDEX)?;
        m.add_submodule(&price_index)?;

        // Region
        let region = PyModule::new(m.py(), "region")?;
        region.add("EFTA", schema::region::EFTA)?;
        region.add("WORLD", schema::region::WORLD)?;
        region.add("NO_EFTA", schema::region::NO_EFTA)?;
        region.add("EFTA_MEMBERS", schema::region::EFTA_MEMBERS.to_vec())?;
        m.add_submodule(&region)?;

        // Flow
        let flow = PyModule::new(m.py(), "flow")?;
        flow.add("IMPORT", schema::flow::IMPORT)?;
        flow.add("EXPORT", schema::flow::EXPORT)?;
        m.add_submodule(&flow)?;

        Ok(())
    }

    #[pymodule]
    #[pyo3(name = "_core")]
    fn tradeflow(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_class::<TradeModel>()?;
        add_schema_exports(m)?;
        Ok(())
    }
}
