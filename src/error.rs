use thiserror::Error;

pub type Result<T> = std::result::Result<T, TradeError>;

#[derive(Error, Debug)]
pub enum TradeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("{rows} rows have no price index (years: {years:?})")]
    JoinGap { rows: usize, years: Vec<i64> },

    #[error("Config: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for TradeError {
    fn from(err: toml::de::Error) -> Self {
        TradeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TradeError {
    fn from(err: toml::ser::Error) -> Self {
        TradeError::Config(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<TradeError> for pyo3::PyErr {
    fn from(err: TradeError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyRuntimeError, PyValueError};
        match err {
            TradeError::InvalidArgument(_) | TradeError::Config(_) => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}
