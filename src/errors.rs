use thiserror::Error;

/// Unified error type for the distribution and reconciliation engine.
///
/// Configuration errors (percentages, missing accounts) abort distribution
/// and require operator intervention; they are never retried automatically.
/// Detection non-matches are not errors and are expressed through
/// [`crate::core::detector::Detection::NotSavings`] instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Bucket account percentages must sum to 100, got {total}")]
    PercentagesNotHundred { total: f64 },

    #[error("Clearing account '{name}' not found in bucket book")]
    ClearingAccountNotFound { name: String },

    #[error("No bucket accounts match suffix '{suffix}'")]
    NoBucketsForSuffix { suffix: String },

    #[error("Override bucket accounts not found: {names}")]
    OverrideAccountsMissing { names: String },

    #[error("Invalid transaction amount '{value}'")]
    InvalidAmount { value: String },

    #[error("Ledger platform error: {message}")]
    Ledger { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
