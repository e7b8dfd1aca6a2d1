use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while building a deal or running its waterfalls.
///
/// Every variant is fatal: construction errors reject the deal outright and
/// period errors abort the run before any entity state for that period is
/// committed. The engine is deterministic, so nothing here is retryable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WaterfallError {
    /// Invalid static configuration (fee type, frequency code, repayment
    /// structure, waterfall layout, entity references).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Principal weights failed to sum to 1.0 within tolerance, which means
    /// the prior-period balance snapshot is inconsistent.
    #[error("allocation error: principal weights sum to {total}, expected 1.0")]
    Allocation { total: Decimal },

    /// A recognized but unsupported feature was requested.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A per-period input record failed validation.
    #[error("invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl WaterfallError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<serde_json::Error> for WaterfallError {
    fn from(e: serde_json::Error) -> Self {
        WaterfallError::Serialization(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type EngineResult<T> = Result<T, WaterfallError>;
