use thiserror::Error;

use crate::rounding::RoundingError;

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inconsistent classification metadata or run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw data that cannot be aggregated without corrupting published figures
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Rounding error: {0}")]
    Rounding(#[from] RoundingError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
