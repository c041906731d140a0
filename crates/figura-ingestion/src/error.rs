//! Error types for fetching and processing papers.

use figura_common::FiguraError;
use figura_db::DbError;
use thiserror::Error;

/// Why a BioC document could not be turned into a `Paper`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service answered, but the body carries its own error marker.
    #[error("BioC service reported an error for {pmc_id}: {message}")]
    Upstream { pmc_id: String, message: String },

    /// Network failure or non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed BioC XML: {0}")]
    Parse(String),
}

impl FetchError {
    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

impl From<FiguraError> for FetchError {
    fn from(e: FiguraError) -> Self {
        FetchError::Transport(e.to_string())
    }
}

impl From<quick_xml::Error> for FetchError {
    fn from(e: quick_xml::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}

/// Failure of one identifier in the pipeline.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Could not resolve a PMC ID for {0}")]
    Resolution(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] DbError),
}

impl ProcessError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessError::Resolution(_) => false,
            ProcessError::Fetch(e) => e.is_retryable(),
            ProcessError::Persistence(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProcessError::from(FetchError::Transport("timeout".into())).is_retryable());
        assert!(!ProcessError::from(FetchError::Parse("eof".into())).is_retryable());
        assert!(!ProcessError::from(FetchError::Upstream {
            pmc_id: "PMC1".into(),
            message: "[Error] : No result".into(),
        })
        .is_retryable());
        assert!(!ProcessError::Resolution("123".into()).is_retryable());
        assert!(ProcessError::from(DbError::Io(std::io::Error::other("disk full"))).is_retryable());
    }
}
