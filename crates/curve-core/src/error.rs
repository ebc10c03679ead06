use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("No overlapping dates between {long} and {short}")]
    NoOverlap { long: String, short: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
