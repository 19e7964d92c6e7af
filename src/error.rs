use thiserror::Error;

/// Control-point warner error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WarnError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Control point store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Alert sink failed: {0}")]
    Sink(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, WarnError>;

impl From<std::io::Error> for WarnError {
    fn from(e: std::io::Error) -> Self {
        WarnError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for WarnError {
    fn from(e: serde_json::Error) -> Self {
        WarnError::Dataset(e.to_string())
    }
}
