/// Column-name constants for the trade pipeline.
/// Single source of truth - exported to Python via PyO3.

// ── Raw source columns ──────────────────────────────────────────────────────
pub mod source {
    pub const PERIOD: &str = "refPeriodId";
    pub const REPORTER: &str = "reporterDesc";
    pub const COMMODITY: &str = "isOriginalClassification";
    pub const PARTNER: &str = "partnerISO";
    pub const FOB_VALUE: &str = "fobvalue";

    pub const ALL: [&str; 5] = [PERIOD, REPORTER, COMMODITY, PARTNER, FOB_VALUE];
}

// ── Canonical trade columns ─────────────────────────────────────────────────
pub mod trade {
    pub const YEAR: &str = "Year";
    pub const FLOW: &str = "Flow";
    pub const COMMODITY_CODE: &str = "CommodityCode";
    pub const PARTNER: &str = "Partner";
    pub const VALUE: &str = "Value";
    pub const REAL_VALUE: &str = "RealValue";
    pub const LOG_REAL_VALUE: &str = "LogRealValue";
    pub const REGION: &str = "Region";
    pub const GROWTH_RATE: &str = "GrowthRate";
    pub const AVERAGE_GROWTH_RATE: &str = "AverageGrowthRate";
}

// ── Price index columns ─────────────────────────────────────────────────────
pub mod price_index {
    pub const COUNTRY_CODE: &str = "Country Code";
    pub const YEAR: &str = "Year";
    pub const INDEX: &str = "Index";
}

// ── Region values ───────────────────────────────────────────────────────────
pub mod region {
    pub const EFTA: &str = "EFTA";
    pub const WORLD: &str = "World";
    pub const NO_EFTA: &str = "NO EFTA";

    pub const EFTA_MEMBERS: [&str; 3] = ["Switzerland", "Norway", "Iceland"];
}

// ── Partner sentinels ───────────────────────────────────────────────────────
pub mod partner {
    /// Global aggregate row reported alongside the bilateral partners.
    pub const WORLD: &str = "World";
}

// ── Flow values ─────────────────────────────────────────────────────────────
pub mod flow {
    pub const IMPORT: &str = "M";
    pub const EXPORT: &str = "X";
}
