use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoringError {
    /// Structurally invalid parameter set, raised before any sampling work.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stratum cannot provide the peptides its plan asks for.
    #[error("Insufficient data: {0}")]
    DataSufficiency(String),

    /// Inconsistent input tables (bad spans, unknown columns, negative weights).
    #[error("Data error: {0}")]
    Data(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ScoringResult<T> = Result<T, ScoringError>;

pub fn config_err(msg: impl Into<String>) -> ScoringError {
    ScoringError::Config(msg.into())
}

pub fn data_err(msg: impl Into<String>) -> ScoringError {
    ScoringError::Data(msg.into())
}
