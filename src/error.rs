use thiserror::Error;

/// Failures surfaced by the optimization pipeline. Every variant names the
/// stage that failed so the caller can decide whether to restart the run.
#[derive(Error, Debug)]
pub enum GasScopeError {
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Gas price feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("History store error: {0}")]
    HistoryStore(String),

    #[error("Insufficient history: {available} valid prices < {required} required")]
    InsufficientHistory { available: usize, required: usize },

    #[error("Forecast failed: {0}")]
    ForecastFailed(String),

    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Optimization cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u64 },
}

impl GasScopeError {
    /// Short machine-readable stage name, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            GasScopeError::ConfigurationMissing(_) | GasScopeError::InvalidConfiguration(_) => {
                "CONFIG"
            }
            GasScopeError::FeedUnavailable(_) => "FEED",
            GasScopeError::HistoryStore(_) => "HISTORY",
            GasScopeError::InsufficientHistory { .. } | GasScopeError::ForecastFailed(_) => {
                "FORECAST"
            }
            GasScopeError::ChainUnavailable(_) => "CHAIN",
            GasScopeError::SubmissionFailed(_) => "SUBMISSION",
            GasScopeError::Cancelled { .. } => "CANCELLED",
        }
    }
}

impl From<csv::Error> for GasScopeError {
    fn from(err: csv::Error) -> Self {
        GasScopeError::HistoryStore(err.to_string())
    }
}

pub type Result<T, E = GasScopeError> = std::result::Result<T, E>;
