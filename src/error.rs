use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("Checkpoint Error: {0}")]
    Checkpoint(String),
}

pub type BfResult<T> = Result<T, BankForgeError>;

/// Raised by a scoring oracle when a point (or pair) cannot be evaluated.
/// This is a per-proposal outcome, not a run error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationFailure {
    #[error("Unphysical point: {0}")]
    Unphysical(String),

    #[error("Degenerate pair: {0}")]
    Degenerate(String),
}
