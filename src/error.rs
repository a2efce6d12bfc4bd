use thiserror::Error;

/// Main error type for the allocation lab
#[derive(Error, Debug)]
pub enum TradelabError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Numerical domain errors
    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Market data errors
    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Serialization errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TradelabError
pub type Result<T> = std::result::Result<T, TradelabError>;

impl TradelabError {
    pub(crate) fn transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        TradelabError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Check that a vector has the expected length
    pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(TradelabError::DimensionMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}
