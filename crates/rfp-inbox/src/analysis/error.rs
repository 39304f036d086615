//! Analysis error types.

use thiserror::Error;

/// Transport-level failures talking to the reasoning provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// HTTP 401/403 from the provider.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited")]
    RateLimited,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timeout")]
    Timeout,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures surfaced by analysis and comparison.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// No reasoning provider is configured.
    #[error("Analysis is unavailable: no reasoning provider is configured")]
    Unavailable,

    /// The provider call failed or its output did not have the expected shape.
    #[error("Analysis failed: {0}")]
    Failure(String),

    #[error("At least {required} analyzed proposals are required for comparison, found {found}")]
    InsufficientData { required: usize, found: usize },
}

impl From<ProviderError> for AnalysisError {
    fn from(err: ProviderError) -> Self {
        AnalysisError::Failure(err.to_string())
    }
}
