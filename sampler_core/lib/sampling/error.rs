use thiserror::Error;

/// Errors raised while shaping scores or picking a token
#[derive(Error, Debug)]
pub enum SamplingError {
    #[error("Invalid sampling parameter: {0}")]
    InvalidParameter(String),

    #[error("No valid candidate: every position is excluded")]
    NoValidCandidate,

    #[error("Sampling failed, no token drawn: {0}")]
    SamplingFailure(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Could not load sampling config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SamplingError>;
